use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod env;
mod runner;
mod source;

use cli::{Cli, Commands};
use config::ProjectConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout may carry topic operations.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rowcast=info")),
        )
        .init();

    env::load_dotenv_from_ancestors(cli.env.as_deref())?;

    match cli.command {
        Commands::Init { path } => commands::cmd_init(&path),
        Commands::Check => {
            let config = ProjectConfig::load(&cli.config)?;
            commands::cmd_check(&config)
        }
        Commands::Run { input, batch_size } => {
            let config = ProjectConfig::load(&cli.config)?;
            commands::cmd_run(config, input.as_deref(), batch_size).await
        }
    }
}
