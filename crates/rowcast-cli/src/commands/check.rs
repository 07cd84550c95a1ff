use anyhow::Result;
use colored::Colorize;

use rowcast_config::{table_issues, Severity, Transport};
use rowcast_core::TableMode;
use rowcast_sink::JsonLinesTarget;

use crate::config::ProjectConfig;

/// Print how each table is projected and report configuration problems.
///
/// Fails if any table has an error-level issue.
pub fn cmd_check(config: &ProjectConfig) -> Result<()> {
    let projection = config.projection()?;

    println!("\n{} {}", "Config:".bold(), config.path.display());

    match config.transport() {
        Transport::Jsonl => {
            let target = match config.sink_target() {
                JsonLinesTarget::Stdout => "stdout".to_string(),
                JsonLinesTarget::File(path) => path.display().to_string(),
            };
            println!("Sink:   jsonl -> {}", target);
        }
        Transport::Memory => println!("Sink:   memory"),
    }
    let policy = config.reconnect_policy();
    println!(
        "Reconnect: {}ms initial, {}ms max, x{}",
        policy.initial_delay.as_millis(),
        policy.max_delay.as_millis(),
        policy.multiplier
    );

    if config.raw.table.is_empty() {
        println!("\n{}", "No tables configured; every event will be dropped.".yellow());
    } else {
        println!("\n{:<24} {:<8} {:<16} {}", "Table", "Mode", "Key", "Topic");
        println!("{:-<72}", "");
        for name in config.raw.table.keys() {
            let mode = projection.resolve_mode(name);
            let key = projection.key_field(name).unwrap_or("-");
            let topic = match mode {
                TableMode::Row => format!("<db>/{}/<key>", name),
                TableMode::Array | TableMode::Object => format!("<db>/{}", name),
            };
            println!("{:<24} {:<8} {:<16} {}", name, mode.as_str(), key, topic);
        }
    }

    let issues = table_issues(&config.raw);
    let mut errors = 0;
    if !issues.is_empty() {
        println!();
    }
    for issue in &issues {
        match issue.severity {
            Severity::Error => {
                errors += 1;
                println!("{} {}", "error:".red().bold(), issue);
            }
            Severity::Warning => println!("{} {}", "warning:".yellow().bold(), issue),
        }
    }

    if errors > 0 {
        anyhow::bail!("{} table(s) cannot be projected", errors);
    }

    println!("\n{}", "Config OK".green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcast_config::RowcastConfig;
    use std::path::PathBuf;

    fn config_from(toml: &str) -> ProjectConfig {
        ProjectConfig {
            path: PathBuf::from("rowcast.toml"),
            raw: RowcastConfig::parse(toml).unwrap(),
        }
    }

    #[test]
    fn test_check_passes_with_warnings() {
        let config = config_from(
            r#"
table.orders.key = "id"
table.orders.mode = "list"
"#,
        );
        assert!(cmd_check(&config).is_ok());
    }

    #[test]
    fn test_check_fails_without_key() {
        let config = config_from(
            r#"
table.orders.mode = "array"
"#,
        );
        let err = cmd_check(&config).unwrap_err();
        assert!(err.to_string().contains("1 table(s)"));
    }
}
