use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use rowcast_config::{RowcastConfig, Transport};
use rowcast_core::ProjectionConfig;
use rowcast_sink::{JsonLinesConnector, JsonLinesTarget, ReconnectPolicy};

/// Project configuration from rowcast.toml.
#[derive(Debug)]
pub struct ProjectConfig {
    pub path: PathBuf,
    pub raw: RowcastConfig,
}

impl ProjectConfig {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let raw = RowcastConfig::parse(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        rowcast_config::validate_config(&raw)
            .with_context(|| format!("Invalid config: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            raw,
        })
    }

    /// Resolve environment variables in a string.
    /// Supports ${VAR_NAME} syntax; unset variables expand to nothing.
    pub fn resolve_env(&self, s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        let mut rest = s;

        while let Some(start) = rest.find("${") {
            let Some(end) = rest[start..].find('}') else {
                break;
            };
            result.push_str(&rest[..start]);
            let var_name = &rest[start + 2..start + end];
            result.push_str(&std::env::var(var_name).unwrap_or_default());
            rest = &rest[start + end + 1..];
        }

        result.push_str(rest);
        result
    }

    pub fn transport(&self) -> Transport {
        self.raw.sink.transport
    }

    /// Resolved principal for the session-open record.
    pub fn sink_principal(&self) -> Option<String> {
        self.raw
            .sink
            .principal
            .as_deref()
            .map(|p| self.resolve_env(p))
            .filter(|p| !p.is_empty())
    }

    /// Resolved JSON-lines target. Stdout unless an output path is set.
    pub fn sink_target(&self) -> JsonLinesTarget {
        match self.raw.sink.output.as_deref().map(|o| self.resolve_env(o)) {
            Some(path) if !path.is_empty() && path != "-" => JsonLinesTarget::File(path.into()),
            _ => JsonLinesTarget::Stdout,
        }
    }

    pub fn jsonl_connector(&self) -> JsonLinesConnector {
        let connector = JsonLinesConnector::new(self.sink_target());
        match self.sink_principal() {
            Some(principal) => connector.with_principal(principal),
            None => connector,
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let reconnect = &self.raw.reconnect;
        ReconnectPolicy {
            initial_delay: Duration::from_millis(reconnect.initial_delay_ms),
            max_delay: Duration::from_millis(reconnect.max_delay_ms),
            multiplier: reconnect.multiplier,
        }
    }

    /// Per-table projection settings.
    pub fn projection(&self) -> Result<ProjectionConfig> {
        rowcast_config::to_projection(&self.raw)
            .with_context(|| format!("Invalid config: {}", self.path.display()))
    }
}
