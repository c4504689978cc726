use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, broadcast};
use tracing::{info, warn};

use super::open_deps;
use crate::core::audit::AuditMessage;
use crate::core::lifecycle::LifecycleManager;
use crate::core::orchestrator::WorkerPool;
use crate::core::terminal::{GuideSection, print_error};

const LOG_FILE: &str = "triage.log";

/// Appends every line from the log tap to `<run_dir>/triage.log`.
fn spawn_log_drain(mut rx: broadcast::Receiver<String>, path: std::path::PathBuf) {
    tokio::spawn(async move {
        let mut file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                warn!("Cannot open log file {}: {}", path.display(), e);
                return;
            }
        };
        loop {
            match rx.recv().await {
                Ok(line) => {
                    if file.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        let _ = file.flush().await;
    });
}

/// Logs every audit message as it is published.
fn spawn_audit_relay(mut rx: broadcast::Receiver<AuditMessage>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => info!(
                    "[{}] event {} round {} from {}",
                    msg.message_type.as_str(),
                    msg.event_id,
                    msg.round_id,
                    msg.message_from
                ),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Audit relay skipped {} message(s)", n)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

pub async fn run_daemon(data_dir: &Path, log_tx: broadcast::Sender<String>) -> Result<()> {
    let run_dir = data_dir.join("run");
    tokio::fs::create_dir_all(&run_dir)
        .await
        .with_context(|| format!("creating {}", run_dir.display()))?;
    spawn_log_drain(log_tx.subscribe(), run_dir.join(LOG_FILE));

    info!("Starting triage daemon (data dir {})", data_dir.display());
    let (config, deps, audit) = open_deps(data_dir).await?;
    spawn_audit_relay(audit.subscribe());

    let store = deps.store.clone();
    let pool = WorkerPool::new(deps, config.polls.clone());
    let worker_count = pool.workers().len();

    let mut lifecycle = LifecycleManager::new();
    lifecycle.attach(Arc::new(Mutex::new(store)));
    lifecycle.attach(Arc::new(Mutex::new(pool)));
    lifecycle.start().await?;

    GuideSection::new("Daemon Started")
        .status("Status", &format!("{}", style("RUNNING").green().bold()))
        .status("Workers", &worker_count.to_string())
        .status("Max rounds", &config.max_round.to_string())
        .status("Narrator", &config.narrator.base_url)
        .blank()
        .text(&format!(
            "Press {} to stop.",
            style("Ctrl+C").bold().yellow()
        ))
        .print();
    println!();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    lifecycle.shutdown().await?;

    GuideSection::new("Daemon Stopped")
        .info("All workers have stopped.")
        .print();
    println!();
    Ok(())
}

pub async fn show_logs(data_dir: &Path, lines: usize) -> Result<()> {
    let log_file = data_dir.join("run").join(LOG_FILE);
    if !log_file.exists() {
        GuideSection::new("Daemon Logs")
            .warn("No daemon log yet.")
            .blank()
            .info(&format!(
                "Run {} to start the orchestrator.",
                style("triage daemon").cyan().bold()
            ))
            .print();
        println!();
        return Ok(());
    }

    let content = match tokio::fs::read_to_string(&log_file).await {
        Ok(c) => c,
        Err(e) => {
            print_error(&format!("Cannot read {}: {}", log_file.display(), e));
            return Ok(());
        }
    };
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    for line in &all[start..] {
        println!("{}", line);
    }
    Ok(())
}
