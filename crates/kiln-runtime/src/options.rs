//! Per-instance runtime options.

use kiln_events::MappingTable;

/// Knobs a host passes to [`ComponentInstance::mount`](crate::ComponentInstance::mount).
///
/// Usually produced from configuration by
/// [`config_bridge::to_runtime_options`](crate::config_bridge::to_runtime_options).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Collapse update requests made before the scheduled render runs into
    /// one render.
    pub coalesce_updates: bool,
    /// Native-to-semantic mapping table handed to the event router.
    pub table: MappingTable,
}

impl RuntimeOptions {
    /// Replace the mapping table.
    #[must_use]
    pub fn with_table(mut self, table: MappingTable) -> Self {
        self.table = table;
        self
    }

    /// Enable or disable update coalescing.
    #[must_use]
    pub fn with_coalesce_updates(mut self, coalesce: bool) -> Self {
        self.coalesce_updates = coalesce;
        self
    }
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            coalesce_updates: true,
            table: MappingTable::builtin(),
        }
    }
}
