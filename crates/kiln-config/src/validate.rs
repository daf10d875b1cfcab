//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{KilnConfig, RuleSection};

/// Validate a merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &KilnConfig) -> ConfigResult<()> {
    validate_events(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_events(config: &KilnConfig) -> ConfigResult<()> {
    let events = &config.events;

    if events.press_keys.is_empty() {
        return Err(invalid(
            "events.press_keys",
            "at least one press key is required",
        ));
    }
    if events.press_keys.iter().any(String::is_empty) {
        return Err(invalid("events.press_keys", "press keys must not be empty"));
    }

    for (i, rule) in events.rules.iter().enumerate() {
        validate_rule(i, rule)?;
    }
    Ok(())
}

fn validate_rule(index: usize, rule: &RuleSection) -> ConfigResult<()> {
    let field = |name: &str| format!("events.rules[{index}].{name}");

    if rule.native.trim().is_empty() {
        return Err(invalid(field("native"), "native event type must not be empty"));
    }
    if rule.native.starts_with("native:") || rule.native.starts_with("host.") {
        return Err(invalid(
            field("native"),
            format!(
                "'{}' carries a channel prefix; use the bare platform type",
                rule.native
            ),
        ));
    }

    if !is_semantic_name(&rule.semantic) {
        return Err(invalid(
            field("semantic"),
            format!(
                "'{}' is not a dot-separated lowercase name (e.g. press.commit)",
                rule.semantic
            ),
        ));
    }

    if !matches!(rule.target.as_str(), "root" | "global") {
        return Err(invalid(
            field("target"),
            format!("unknown target '{}'; expected root or global", rule.target),
        ));
    }
    Ok(())
}

fn is_semantic_name(name: &str) -> bool {
    name.contains('.')
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        })
}

fn validate_logging(config: &KilnConfig) -> ConfigResult<()> {
    let logging = &config.logging;

    if logging.level.parse::<tracing::Level>().is_err() {
        return Err(invalid(
            "logging.level",
            format!(
                "unknown level '{}'; expected one of: error, warn, info, debug, trace",
                logging.level
            ),
        ));
    }

    if !matches!(
        logging.format.to_ascii_lowercase().as_str(),
        "pretty" | "compact" | "json" | "full"
    ) {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: pretty, compact, json, full",
                logging.format
            ),
        ));
    }
    Ok(())
}
