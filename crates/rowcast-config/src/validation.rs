use std::fmt;

use rowcast_core::{ProjectionConfig, TableConfig, TableMode};

use crate::error::{ConfigError, ConfigResult};
use crate::settings::{ReconnectSection, RowcastConfig};

/// Validate a configuration.
///
/// Only problems that make the process unable to run are errors here.
/// Per-table findings are reported by [`table_issues`].
pub fn validate_config(config: &RowcastConfig) -> ConfigResult<()> {
    validate_reconnect(&config.reconnect)?;
    validate_table_names(config)?;
    Ok(())
}

fn validate_reconnect(reconnect: &ReconnectSection) -> ConfigResult<()> {
    if reconnect.initial_delay_ms == 0 {
        return Err(ConfigError::NonPositiveDelay {
            field: "initial_delay_ms",
            value: 0,
        });
    }
    if reconnect.max_delay_ms < reconnect.initial_delay_ms {
        return Err(ConfigError::MaxDelayBelowInitial {
            initial: reconnect.initial_delay_ms,
            max: reconnect.max_delay_ms,
        });
    }
    if reconnect.multiplier.is_nan() || reconnect.multiplier < 1.0 {
        return Err(ConfigError::InvalidMultiplier(reconnect.multiplier));
    }
    Ok(())
}

fn validate_table_names(config: &RowcastConfig) -> ConfigResult<()> {
    for name in config.table.keys() {
        if name.is_empty() || name.contains('/') {
            return Err(ConfigError::InvalidTableName(name.clone()));
        }
    }
    Ok(())
}

/// How serious a [`ConfigIssue`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A finding about one table's settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub table: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table.{}: {}", self.table, self.message)
    }
}

/// Report per-table problems.
///
/// A table without a key field never projects anything (error). A mode
/// value that is not `row`, `array` or `object` silently resolves to row
/// (warning).
pub fn table_issues(config: &RowcastConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    for (name, section) in &config.table {
        match section.key.as_deref().map(str::trim) {
            None | Some("") => issues.push(ConfigIssue {
                severity: Severity::Error,
                table: name.clone(),
                message: "no key field configured; events for this table are dropped".into(),
            }),
            Some(_) => {}
        }

        if let Some(mode) = section.mode.as_deref() {
            if !TableMode::is_recognized(mode) {
                issues.push(ConfigIssue {
                    severity: Severity::Warning,
                    table: name.clone(),
                    message: format!("unrecognized mode '{}', using row", mode),
                });
            }
        }
    }

    issues
}

/// Convert a validated configuration to the core projection settings.
pub fn to_projection(config: &RowcastConfig) -> ConfigResult<ProjectionConfig> {
    validate_config(config)?;

    let mut projection = ProjectionConfig::new();
    for (name, section) in &config.table {
        let key_field = section
            .key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        projection.insert(
            name.clone(),
            TableConfig {
                key_field,
                mode: TableMode::resolve(section.mode.as_deref()),
            },
        );
    }

    Ok(projection)
}
