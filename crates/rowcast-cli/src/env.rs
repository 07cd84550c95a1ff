use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// Default number of change records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Name of the dotenv file for an environment: `.env` or `.env.{ENV}`.
fn env_file_name(env: Option<&str>) -> String {
    match env {
        Some(name) => format!(".env.{}", name),
        None => ".env".to_string(),
    }
}

/// Load a dotenv file from the current directory or any parent directory.
///
/// Searches from the working directory up to the filesystem root and loads
/// the first match. A missing file is not an error; variables may come from
/// the process environment instead.
pub fn load_dotenv_from_ancestors(env: Option<&str>) -> Result<Option<PathBuf>> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let file_name = env_file_name(env);

    let mut current = cwd.as_path();
    loop {
        let env_path = current.join(&file_name);
        if env_path.exists() {
            dotenvy::from_path(&env_path)
                .with_context(|| format!("Failed to load {} from {}", file_name, env_path.display()))?;
            info!("Loaded {} from {}", file_name, env_path.display());
            return Ok(Some(env_path));
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    debug!(file = %file_name, "No dotenv file found");
    Ok(None)
}

/// Batch size from `ROWCAST_BATCH_SIZE`, or [`DEFAULT_BATCH_SIZE`].
pub fn get_batch_size() -> usize {
    match std::env::var("ROWCAST_BATCH_SIZE") {
        Ok(value) => match value.trim().parse::<usize>() {
            Ok(size) if size > 0 => size,
            _ => {
                warn!(value = %value, "Ignoring invalid ROWCAST_BATCH_SIZE");
                DEFAULT_BATCH_SIZE
            }
        },
        Err(_) => DEFAULT_BATCH_SIZE,
    }
}
