use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

const CONFIG_TEMPLATE: &str = r#"# Rowcast configuration
# Each table needs a key field. Mode is row (default), array or object.

# One topic per row at <db>/users/<id>
table.users.key = "id"

# One topic at <db>/orders holding every row, in insertion order
table.orders.key = "id"
table.orders.mode = "array"

# One topic at <db>/sessions mapping key to row
# table.sessions.key = "sid"
# table.sessions.mode = "object"

[sink]
# jsonl writes one topic operation per line; memory prints the topics on exit
transport = "jsonl"
# output = "topics.jsonl"
principal = "${ROWCAST_PRINCIPAL}"

[reconnect]
initial_delay_ms = 1000
max_delay_ms = 30000
multiplier = 2.0
"#;

const ENV_EXAMPLE: &str = r#"# Rowcast environment variables
# Copy this file to .env and fill in your values

# Identity written into each topic store session
ROWCAST_PRINCIPAL=

# Optional: change records per batch
# ROWCAST_BATCH_SIZE=100
"#;

/// Write an example config and `.env.example` into `path`. Existing files are kept.
pub fn cmd_init(path: &Path) -> Result<()> {
    println!("Initializing rowcast in {}...\n", path.display());

    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;

    let config_path = path.join("rowcast.toml");
    if !config_path.exists() {
        fs::write(&config_path, CONFIG_TEMPLATE)?;
        info!(path = %config_path.display(), "Created rowcast.toml");
        println!("Created rowcast.toml");
    } else {
        println!("rowcast.toml already exists, skipping");
    }

    let env_example_path = path.join(".env.example");
    if !env_example_path.exists() {
        fs::write(&env_example_path, ENV_EXAMPLE)?;
        println!("Created .env.example");
    } else {
        println!(".env.example already exists, skipping");
    }

    println!("\n{}", "Rowcast initialized!".green().bold());
    println!("\nNext steps:");
    println!("  1. Edit rowcast.toml for your tables");
    println!("  2. Run: rowcast check");
    println!("  3. Run: rowcast run --input changes.jsonl\n");

    Ok(())
}
