//! Layered configuration loading.
//!
//! Precedence, lowest first: embedded defaults, user file
//! (`<config dir>/kiln/config.toml`), workspace file
//! (`{workspace}/.kiln/config.toml`), then environment fallbacks for fields no
//! file set.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::apply_env_fallbacks;
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::show::ResolvedConfig;
use crate::types::KilnConfig;
use crate::validate;

const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum accepted config file size (1 MiB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Name of the per-workspace and per-user config directory.
const APP_DIR: &str = "kiln";

/// Load the layered configuration.
///
/// `config_dir_override` replaces the platform config directory; the user
/// file is then `<override>/kiln/config.toml`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a file is unreadable or malformed, if no
/// config directory can be determined, or if the merged result fails
/// validation.
pub fn load<S: BuildHasher>(
    workspace_root: Option<&Path>,
    config_dir_override: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    let config_dir = match config_dir_override {
        Some(dir) => dir.to_path_buf(),
        None => user_config_dir()?,
    };
    let user_path = config_dir.join(APP_DIR).join("config.toml");
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge_tracking(&mut merged, &overlay, "", &ConfigLayer::User, &mut field_sources);
        loaded_files.push(user_path.display().to_string());
        info!(path = %user_path.display(), "loaded user config");
    }

    if let Some(root) = workspace_root {
        let ws_path = workspace_config_path(root);
        if let Some(overlay) = try_load_file(&ws_path)? {
            deep_merge_tracking(
                &mut merged,
                &overlay,
                "",
                &ConfigLayer::Workspace,
                &mut field_sources,
            );
            loaded_files.push(ws_path.display().to_string());
            info!(path = %ws_path.display(), "loaded workspace config");
        }
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: KilnConfig =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a single file with no layering.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file is missing, unreadable, malformed or
/// invalid.
pub fn load_file(path: &Path) -> ConfigResult<KilnConfig> {
    let value = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;
    let config: KilnConfig = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// `{root}/.kiln/config.toml`
#[must_use]
pub fn workspace_config_path(root: &Path) -> PathBuf {
    root.join(format!(".{APP_DIR}")).join("config.toml")
}

/// Platform config directory (`$XDG_CONFIG_HOME`, `~/Library/Application
/// Support`, `%APPDATA%`).
fn user_config_dir() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.config_dir().to_path_buf())
        .ok_or(ConfigError::NoConfigDir)
}

/// Read and parse a file, returning `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    let len = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if len > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {len} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_load_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load(Some(dir.path()), Some(dir.path()), &no_env()).unwrap();

        assert_eq!(resolved.config, KilnConfig::default());
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.field_sources["runtime.coalesce_updates"],
            ConfigLayer::Defaults
        );
    }

    #[test]
    fn test_workspace_overrides_user() {
        let cfg_dir = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        write(
            &cfg_dir.path().join("kiln/config.toml"),
            "[logging]\nlevel = \"debug\"\nformat = \"json\"\n",
        );
        write(
            &workspace_config_path(ws.path()),
            "[logging]\nlevel = \"trace\"\n\n[[events.rules]]\nnative = \"dblclick\"\nsemantic = \"press.double\"\n",
        );

        let resolved = load(Some(ws.path()), Some(cfg_dir.path()), &no_env()).unwrap();

        assert_eq!(resolved.config.logging.level, "trace");
        assert_eq!(resolved.config.logging.format, "json");
        assert_eq!(resolved.config.events.rules.len(), 1);
        assert_eq!(resolved.loaded_files.len(), 2);
        assert_eq!(resolved.field_sources["logging.level"], ConfigLayer::Workspace);
        assert_eq!(resolved.field_sources["logging.format"], ConfigLayer::User);
    }

    #[test]
    fn test_env_only_fills_unset_fields() {
        let cfg_dir = tempfile::tempdir().unwrap();
        write(
            &cfg_dir.path().join("kiln/config.toml"),
            "[logging]\nlevel = \"warn\"\n",
        );
        let env: HashMap<String, String> = [
            ("KILN_LOG".to_owned(), "trace".to_owned()),
            ("KILN_LOG_FORMAT".to_owned(), "pretty".to_owned()),
        ]
        .into_iter()
        .collect();

        let resolved = load(None, Some(cfg_dir.path()), &env).unwrap();

        assert_eq!(resolved.config.logging.level, "warn");
        assert_eq!(resolved.config.logging.format, "pretty");
        assert_eq!(
            resolved.field_sources["logging.format"],
            ConfigLayer::Environment
        );
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let ws = tempfile::tempdir().unwrap();
        write(&workspace_config_path(ws.path()), "[runtime\n");
        let err = load(Some(ws.path()), Some(ws.path()), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let ws = tempfile::tempdir().unwrap();
        write(
            &workspace_config_path(ws.path()),
            "[runtime]\ncoalesce_updates = \"sometimes\"\n",
        );
        let err = load(Some(ws.path()), Some(ws.path()), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { ref path, .. } if path == "<merged config>"));
    }

    #[test]
    fn test_invalid_merged_config_rejected() {
        let ws = tempfile::tempdir().unwrap();
        write(&workspace_config_path(ws.path()), "[events]\npress_keys = []\n");
        let err = load(Some(ws.path()), Some(ws.path()), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let ws = tempfile::tempdir().unwrap();
        let path = workspace_config_path(ws.path());
        let padding = "#".repeat(usize::try_from(MAX_CONFIG_FILE_SIZE).unwrap().saturating_add(1));
        write(&path, &padding);
        let err = load(Some(ws.path()), Some(ws.path()), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_load_file_single() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiln.toml");
        write(&path, "[runtime]\ncoalesce_updates = false\n");
        let config = load_file(&path).unwrap();
        assert!(!config.runtime.coalesce_updates);
        assert_eq!(config.events.press_keys.len(), 3);

        let missing = load_file(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::ReadError { .. }));
    }
}
