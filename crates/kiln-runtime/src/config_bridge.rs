//! Bridge from `kiln_config::KilnConfig` to runtime and telemetry types.
//!
//! The config crate depends on no other kiln crate; conversion into domain
//! types happens here, once.

use kiln_config::KilnConfig;
use kiln_events::{MappingRule, MappingTable, TargetKind};
use kiln_telemetry::{LogConfig, LogFormat};
use tracing::warn;

use crate::options::RuntimeOptions;

/// Convert config to [`RuntimeOptions`].
#[must_use]
pub fn to_runtime_options(cfg: &KilnConfig) -> RuntimeOptions {
    RuntimeOptions {
        coalesce_updates: cfg.runtime.coalesce_updates,
        table: to_mapping_table(cfg),
    }
}

/// Built-in mapping table with the configured press keys and extra rules.
///
/// Rules with an unknown target are skipped; [`KilnConfig::load`] already
/// rejects them, so this only matters for hand-built configs.
#[must_use]
pub fn to_mapping_table(cfg: &KilnConfig) -> MappingTable {
    let mut table = MappingTable::builtin().with_press_keys(cfg.events.press_keys.iter().cloned());
    for rule in &cfg.events.rules {
        match rule.target.parse::<TargetKind>() {
            Ok(target) => {
                table = table.with_rule(MappingRule::new(&rule.native, &rule.semantic, target));
            },
            Err(reason) => {
                warn!(native = %rule.native, semantic = %rule.semantic, %reason, "Skipping mapping rule");
            },
        }
    }
    table
}

/// Convert config to [`LogConfig`].
#[must_use]
pub fn to_log_config(cfg: &KilnConfig) -> LogConfig {
    let format = match cfg.logging.format.to_ascii_lowercase().as_str() {
        "pretty" => LogFormat::Pretty,
        "json" => LogFormat::Json,
        "full" => LogFormat::Full,
        _ => LogFormat::Compact,
    };

    let mut log_config = LogConfig::new(&cfg.logging.level).with_format(format);
    for directive in &cfg.logging.directives {
        log_config = log_config.with_directive(directive);
    }
    log_config
}
