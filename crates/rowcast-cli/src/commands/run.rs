use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use rowcast_config::Transport;
use rowcast_core::Router;
use rowcast_sink::{
    shutdown_channel, Connector, MemoryTopicStore, ReconnectPolicy, SessionManager, Shutdown,
};

use crate::config::ProjectConfig;
use crate::env::get_batch_size;
use crate::runner::{run_pipeline, RunSummary};
use crate::source;

pub async fn cmd_run(
    config: ProjectConfig,
    input: Option<&Path>,
    batch_size: Option<usize>,
) -> Result<()> {
    let projection = config.projection()?;
    let batch_size = batch_size.unwrap_or_else(get_batch_size);
    let policy = config.reconnect_policy();

    info!(
        tables = projection.len(),
        batch_size,
        transport = ?config.transport(),
        input = %input.map_or("stdin".to_string(), |p| p.display().to_string()),
        "Starting rowcast"
    );

    let (shutdown_tx, shutdown) = shutdown_channel();
    let signal_handle = tokio::spawn(async move {
        wait_for_signal().await;
        shutdown_tx.shutdown();
    });

    let mut router = Router::new(projection);
    let result = match config.transport() {
        Transport::Jsonl => {
            let connector = config.jsonl_connector();
            drive(connector, policy, shutdown, &mut router, input, batch_size).await
        }
        Transport::Memory => {
            let store = MemoryTopicStore::new();
            let summary =
                drive(store.clone(), policy, shutdown, &mut router, input, batch_size).await;
            print_topics(&store)?;
            summary
        }
    };

    signal_handle.abort();
    let _ = signal_handle.await;

    let summary = result?;
    if summary.interrupted {
        info!(offset = summary.committed_offset, "Shut down on signal");
    }
    Ok(())
}

/// Build a session manager for `connector` and run the pipeline over `input`.
async fn drive<C: Connector>(
    connector: C,
    policy: ReconnectPolicy,
    shutdown: Shutdown,
    router: &mut Router,
    input: Option<&Path>,
    batch_size: usize,
) -> Result<RunSummary> {
    let mut sessions = SessionManager::new(connector, policy, shutdown.clone());

    match input {
        Some(path) => {
            let mut batches = source::open_file(path, batch_size).await?;
            run_pipeline(router, &mut sessions, &mut batches, shutdown).await
        }
        None => {
            let mut batches = source::open_stdin(batch_size);
            run_pipeline(router, &mut sessions, &mut batches, shutdown).await
        }
    }
}

fn print_topics(store: &MemoryTopicStore) -> Result<()> {
    let topics = store.topics();
    let rendered =
        serde_json::to_string_pretty(&topics).context("Failed to render topic tree")?;
    println!("{}", rendered);
    Ok(())
}

/// Resolve on SIGINT (ctrl-c) or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("sigint (ctrl+c) received, shutting down");
        }
        _ = terminate => {
            info!("sigterm received, shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcast_config::RowcastConfig;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_jsonl_to_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("changes.jsonl");
        let output = dir.path().join("topics.jsonl");

        fs::write(
            &input,
            concat!(
                r#"{"payload":{"op":"c","source":{"db":"shop","table":"orders"},"after":{"id":"A"}}}"#,
                "\n",
                "null\n",
                r#"{"payload":{"op":"d","source":{"db":"shop","table":"orders"},"before":{"id":"A"}}}"#,
                "\n",
            ),
        )
        .unwrap();

        let toml = format!(
            "table.orders.key = \"id\"\ntable.orders.mode = \"array\"\n\n[sink]\noutput = \"{}\"\n",
            output.display()
        );
        let config = ProjectConfig {
            path: PathBuf::from("rowcast.toml"),
            raw: RowcastConfig::parse(&toml).unwrap(),
        };

        cmd_run(config, Some(&input), Some(2)).await.unwrap();

        let lines: Vec<serde_json::Value> = fs::read_to_string(&output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let ops: Vec<&str> = lines.iter().map(|l| l["op"].as_str().unwrap()).collect();
        assert_eq!(ops, vec!["session", "create_empty", "patch", "patch"]);
        assert_eq!(lines[3]["patch"][0]["op"], "remove");
        assert_eq!(lines[3]["patch"][0]["path"], "/0");
    }
}
