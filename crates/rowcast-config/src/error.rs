use thiserror::Error;

/// Errors that can occur when parsing or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("reconnect.{field} must be positive, got {value}")]
    NonPositiveDelay { field: &'static str, value: u64 },

    #[error("reconnect.max_delay_ms ({max}) is smaller than reconnect.initial_delay_ms ({initial})")]
    MaxDelayBelowInitial { initial: u64, max: u64 },

    #[error("reconnect.multiplier must be at least 1.0, got {0}")]
    InvalidMultiplier(f64),

    #[error("table name must not be empty or contain '/': '{0}'")]
    InvalidTableName(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
