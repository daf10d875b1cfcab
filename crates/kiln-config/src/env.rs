//! Environment variable fallbacks.
//!
//! Env vars only fill fields that no config file set; a value from the user
//! or workspace file always wins.

use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "KILN_LOG",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "KILN_LOG_FORMAT",
        field_path: "logging.format",
    },
    EnvMapping {
        var_name: "KILN_COALESCE_UPDATES",
        field_path: "runtime.coalesce_updates",
    },
];

/// Names of every environment variable the loader consults.
#[must_use]
pub fn known_env_vars() -> Vec<&'static str> {
    ENV_MAPPINGS.iter().map(|m| m.var_name).collect()
}

/// Apply env fallbacks to fields still at their default.
///
/// Returns the number of variables applied.
pub fn apply_env_fallbacks<S: BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let set_by_file = sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            continue;
        }

        if let Some(val) = env_vars.get(mapping.var_name) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "applying env var fallback"
            );
            set_field_from_string(merged, mapping.field_path, val);
            sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

/// Snapshot of the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

fn set_field_from_string(root: &mut toml::Value, path: &str, val: &str) {
    let value = coerce_to_toml_value(path, val);
    let mut segments = path.split('.').peekable();
    let mut current = root;

    while let Some(segment) = segments.next() {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return;
        }
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}

fn coerce_to_toml_value(path: &str, val: &str) -> toml::Value {
    if path == "runtime.coalesce_updates" {
        match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => return toml::Value::Boolean(true),
            "0" | "false" | "no" | "off" => return toml::Value::Boolean(false),
            _ => {},
        }
    }
    toml::Value::String(val.to_owned())
}
