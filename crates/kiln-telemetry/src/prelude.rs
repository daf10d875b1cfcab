//! Prelude module - commonly used types for convenient import.
//!
//! Use `use kiln_telemetry::prelude::*;` to import all essential types.

// Configuration
pub use crate::{FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget};

// Setup
pub use crate::{setup_default_logging, setup_logging};

// Errors
pub use crate::{TelemetryError, TelemetryResult};
