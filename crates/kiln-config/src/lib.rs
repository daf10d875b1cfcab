#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Kiln Config - Layered TOML configuration for the kiln runtime.
//!
//! # Usage
//!
//! ```rust,no_run
//! use kiln_config::KilnConfig;
//!
//! let resolved = KilnConfig::load(Some(std::path::Path::new("."))).unwrap();
//! println!("coalescing updates: {}", resolved.config.runtime.coalesce_updates);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Workspace** (`{workspace}/.kiln/config.toml`)
//! 2. **User** (`<config dir>/kiln/config.toml`)
//! 3. **Environment variables** (`KILN_*`), fallback only
//! 4. **Embedded defaults** (`defaults.toml`)
//!
//! This crate depends on no other kiln crate. `kiln-runtime::config_bridge`
//! turns a [`KilnConfig`] into runtime options and a log configuration.

/// Environment variable fallbacks.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered merging with source tracking.
pub mod merge;
/// Resolved configuration display.
pub mod show;
/// Configuration struct definitions.
pub mod types;
/// Post-merge validation.
pub mod validate;

pub mod prelude;

pub use error::{ConfigError, ConfigResult};
pub use merge::{ConfigLayer, FieldSources};
pub use show::{ResolvedConfig, ShowFormat};
pub use types::{EventsSection, KilnConfig, LoggingSection, RuleSection, RuntimeSection};

use std::path::Path;

impl KilnConfig {
    /// Load with the full precedence chain and the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a file is malformed or the merged
    /// configuration fails validation.
    pub fn load(workspace_root: Option<&Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, None, &env::collect_env_vars())
    }

    /// Load with an explicit user config directory.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a file is malformed or the merged
    /// configuration fails validation.
    pub fn load_with_config_dir(
        workspace_root: Option<&Path>,
        config_dir: &Path,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, Some(config_dir), &env::collect_env_vars())
    }
}
