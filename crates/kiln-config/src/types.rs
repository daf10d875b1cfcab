//! Configuration struct definitions.
//!
//! Every section is `#[serde(default)]`, so a file only needs the keys it
//! changes.

use serde::{Deserialize, Serialize};

/// Top-level kiln configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    /// Component driver settings.
    pub runtime: RuntimeSection,
    /// Event router settings.
    pub events: EventsSection,
    /// Logging settings.
    pub logging: LoggingSection,
}

/// `[runtime]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Collapse update requests made before the scheduled render runs into
    /// one render.
    pub coalesce_updates: bool,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            coalesce_updates: true,
        }
    }
}

/// `[events]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsSection {
    /// Keys whose `keydown` also synthesizes `press.commit` on the root.
    pub press_keys: Vec<String>,
    /// Extra mapping rules appended to the built-in table.
    pub rules: Vec<RuleSection>,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            press_keys: vec!["Enter".to_owned(), " ".to_owned(), "Spacebar".to_owned()],
            rules: Vec::new(),
        }
    }
}

/// One `[[events.rules]]` entry: `native -> semantic@target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSection {
    /// Platform event type, without any channel prefix (`dblclick`).
    pub native: String,
    /// Semantic event type (`press.double`).
    pub semantic: String,
    /// `root` or `global`.
    #[serde(default = "default_target")]
    pub target: String,
}

fn default_target() -> String {
    "root".to_owned()
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Level filter (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// `pretty`, `compact`, `json` or `full`.
    pub format: String,
    /// Per-target overrides (`kiln_events=trace`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
