//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kiln_config::prelude::*;` to import all essential types.

// Config
pub use crate::{EventsSection, KilnConfig, LoggingSection, RuleSection, RuntimeSection};

// Loading
pub use crate::{ConfigError, ConfigLayer, ConfigResult, ResolvedConfig, ShowFormat};
