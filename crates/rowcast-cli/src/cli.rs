use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rowcast")]
#[command(about = "Project CDC change events into live topic trees")]
#[command(version)]
pub struct Cli {
    /// Path to the rowcast.toml config file
    #[arg(short, long, global = true, default_value = "rowcast.toml")]
    pub config: PathBuf,

    /// Environment to load (loads .env.{ENV} instead of .env)
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write an example rowcast.toml
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate the config and show how each table is projected
    Check,

    /// Project change records until end of input or a shutdown signal
    Run {
        /// File of newline-delimited change envelopes (reads stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Records per batch (overrides ROWCAST_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,
    },
}
