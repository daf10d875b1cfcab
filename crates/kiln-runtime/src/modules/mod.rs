//! Built-in modules assembled into every component instance.

pub mod context;
pub mod event;
pub mod expose;
pub mod lifecycle;
pub mod props;
pub mod state;
pub mod trigger;

use kiln_events::MappingTable;
use kiln_modules::ModuleDefinition;

/// Name of the props module.
pub const PROPS: &str = "props";
/// Name of the state module.
pub const STATE: &str = "state";
/// Name of the lifecycle module.
pub const LIFECYCLE: &str = "lifecycle";
/// Name of the event module.
pub const EVENT: &str = "event";
/// Name of the expose module.
pub const EXPOSE: &str = "expose";
/// Name of the context module.
pub const CONTEXT: &str = "context";
/// Name of the `as-trigger` module.
pub const AS_TRIGGER: &str = "as-trigger";

/// Definitions of every built-in module.
pub(crate) fn builtin(table: &MappingTable) -> Vec<ModuleDefinition> {
    vec![
        props::definition(),
        state::definition(),
        lifecycle::definition(),
        event::definition(table.clone()),
        expose::definition(),
        context::definition(),
        trigger::definition(),
    ]
}
