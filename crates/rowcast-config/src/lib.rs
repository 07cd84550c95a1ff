mod error;
mod settings;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use settings::{ReconnectSection, RowcastConfig, SinkSection, TableSection, Transport};
pub use validation::{table_issues, to_projection, validate_config, ConfigIssue, Severity};
