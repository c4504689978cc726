mod daemon;
mod event;

use anyhow::Result;
use console::style;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, warn};

use crate::core::audit::StoreAuditPublisher;
use crate::core::config::{self, TriageConfig};
use crate::core::narrator::{Narrator, OpenAiNarrator, TimeoutNarrator};
use crate::core::orchestrator::WorkerDeps;
use crate::core::store::EntityStore;
use crate::core::terminal::{self, GuideSection, print_error};

pub(crate) const DB_FILE: &str = "triage.db";

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Service")
        .command("daemon", "Run the round orchestrator until Ctrl+C")
        .command("logs [--lines N]", "Show the tail of the daemon log")
        .print();

    GuideSection::new("Incidents")
        .command(
            "event create",
            "--name <name> --message <text> [--context <json>]",
        )
        .command("inspect <event_id>", "Show status, round work and latest report")
        .command(
            "resolve <event_id>",
            "[--note <text>] Close manually with a final report",
        )
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("triage").green()
    );
}

/// Value of `--flag <value>` anywhere from `start` on.
pub(crate) fn flag_value(args: &[String], start: usize, names: &[&str]) -> Option<String> {
    let mut i = start;
    while i < args.len() {
        if names.contains(&args[i].as_str()) {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

/// Store, narrator and audit wired the way the daemon runs them.
pub(crate) async fn open_deps(
    data_dir: &Path,
) -> Result<(TriageConfig, WorkerDeps, Arc<StoreAuditPublisher>)> {
    let config = TriageConfig::load(data_dir).await?;
    let store = EntityStore::open(data_dir.join(DB_FILE)).await?;

    if config.narrator.api_key.is_empty() {
        warn!("LLM_API_KEY is not set; narrator calls will likely be rejected");
    }
    let narrator: Arc<dyn Narrator> = Arc::new(TimeoutNarrator::new(
        Arc::new(OpenAiNarrator::new(&config.narrator)),
        Duration::from_secs(config.narrator.timeout_secs),
    ));
    let audit = Arc::new(StoreAuditPublisher::new(store.clone()));

    let deps = WorkerDeps {
        store,
        narrator,
        audit: audit.clone(),
        max_round: config.max_round,
    };
    Ok((config, deps, audit))
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let data_dir = config::data_dir();
    let cmd = args.get(1).map(String::as_str).unwrap_or("help");

    let level = if cmd == "daemon" { Level::INFO } else { Level::WARN };
    let log_tx = crate::logging::init(level, false);

    match cmd {
        "daemon" => daemon::run_daemon(&data_dir, log_tx).await,
        "logs" => {
            let lines = flag_value(&args, 2, &["--lines", "-n"])
                .and_then(|v| v.parse().ok())
                .unwrap_or(50);
            daemon::show_logs(&data_dir, lines).await
        }
        "event" => match args.get(2).map(String::as_str) {
            Some("create") => event::create(&data_dir, &args).await,
            _ => {
                print_error("Unknown or missing event command. Expected: create");
                print_help();
                Ok(())
            }
        },
        "inspect" => match args.get(2) {
            Some(id) => event::inspect(&data_dir, id).await,
            None => {
                print_error("Usage: triage inspect <event_id>");
                Ok(())
            }
        },
        "resolve" => match args.get(2) {
            Some(id) if !id.starts_with("--") => {
                let note = flag_value(&args, 3, &["--note"]);
                event::resolve(&data_dir, id, note.as_deref()).await
            }
            _ => {
                print_error("Usage: triage resolve <event_id> [--note <text>]");
                Ok(())
            }
        },
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            print_error(&format!("Unknown command: {}", other));
            print_help();
            Ok(())
        }
    }
}
