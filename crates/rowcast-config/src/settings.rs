use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;

/// Raw configuration as parsed from `rowcast.toml`.
///
/// Table settings use dotted keys:
///
/// ```toml
/// table.orders.key = "id"
/// table.orders.mode = "array"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct RowcastConfig {
    /// Sink transport configuration.
    #[serde(default)]
    pub sink: SinkSection,
    /// Reconnect backoff configuration.
    #[serde(default)]
    pub reconnect: ReconnectSection,
    /// Per-table settings, by table name.
    #[serde(default)]
    pub table: BTreeMap<String, TableSection>,
}

impl RowcastConfig {
    /// Parse a config from a TOML string.
    pub fn parse(toml_str: &str) -> ConfigResult<Self> {
        let config: RowcastConfig = toml::from_str(toml_str)?;
        Ok(config)
    }
}

/// Settings for one source table.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TableSection {
    /// Field of the row image whose value identifies the row.
    pub key: Option<String>,
    /// Projection mode: `row`, `array` or `object`. Anything else means `row`.
    #[serde(alias = "type")]
    pub mode: Option<String>,
}

/// Which topic store transport to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// JSON lines on stdout or a file.
    #[default]
    Jsonl,
    /// In-process store; topics are printed on exit.
    Memory,
}

/// Sink transport configuration.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SinkSection {
    #[serde(default)]
    pub transport: Transport,
    /// Output file for the JSON-lines transport. Stdout when unset.
    pub output: Option<String>,
    /// Identity written into every session-open record.
    pub principal: Option<String>,
}

/// Reconnect backoff configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectSection {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted_tables() {
        let toml = r#"
table.orders.key = "id"
table.orders.mode = "array"
table.users.key = "user_id"
"#;
        let config = RowcastConfig::parse(toml).unwrap();
        assert_eq!(config.table.len(), 2);
        assert_eq!(config.table["orders"].key.as_deref(), Some("id"));
        assert_eq!(config.table["orders"].mode.as_deref(), Some("array"));
        assert_eq!(config.table["users"].mode, None);
        assert_eq!(config.sink.transport, Transport::Jsonl);
        assert_eq!(config.reconnect.initial_delay_ms, 1_000);
    }

    #[test]
    fn test_type_alias_for_mode() {
        let toml = r#"
[table.sessions]
key = "sid"
type = "object"
"#;
        let config = RowcastConfig::parse(toml).unwrap();
        assert_eq!(config.table["sessions"].mode.as_deref(), Some("object"));
    }

    #[test]
    fn test_parse_sink_and_reconnect() {
        let toml = r#"
[sink]
transport = "memory"
principal = "${ROWCAST_PRINCIPAL}"

[reconnect]
initial_delay_ms = 250
multiplier = 1.5
"#;
        let config = RowcastConfig::parse(toml).unwrap();
        assert_eq!(config.sink.transport, Transport::Memory);
        assert_eq!(config.sink.output, None);
        assert_eq!(config.sink.principal.as_deref(), Some("${ROWCAST_PRINCIPAL}"));
        assert_eq!(config.reconnect.initial_delay_ms, 250);
        assert_eq!(config.reconnect.max_delay_ms, 30_000);
        assert_eq!(config.reconnect.multiplier, 1.5);
    }

    #[test]
    fn test_empty_config() {
        let config = RowcastConfig::parse("").unwrap();
        assert!(config.table.is_empty());
    }

    #[test]
    fn test_unknown_transport_is_error() {
        let toml = r#"
[sink]
transport = "carrier-pigeon"
"#;
        assert!(RowcastConfig::parse(toml).is_err());
    }
}
