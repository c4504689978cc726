use anyhow::Result;
use console::style;
use std::collections::BTreeMap;
use std::path::Path;

use super::{DB_FILE, flag_value, open_deps};
use crate::core::orchestrator::{EventStatus, resolve_event};
use crate::core::store::EntityStore;
use crate::core::terminal::{GuideSection, print_error, print_success, print_warn};

fn count_by<I: IntoIterator<Item = &'static str>>(statuses: I) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for s in statuses {
        *counts.entry(s).or_default() += 1;
    }
    if counts.is_empty() {
        return "none".to_string();
    }
    counts
        .iter()
        .map(|(s, n)| format!("{} {}", n, s))
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn create(data_dir: &Path, args: &[String]) -> Result<()> {
    let name = flag_value(args, 3, &["--name"]);
    let message = flag_value(args, 3, &["--message", "-m"]);
    let context = flag_value(args, 3, &["--context"]);
    let (Some(name), Some(message)) = (name, message) else {
        print_error("Usage: triage event create --name <name> --message <text> [--context <json>]");
        return Ok(());
    };

    let store = EntityStore::open(data_dir.join(DB_FILE)).await?;
    let event = store
        .create_event(&name, &message, context.as_deref())
        .await?;
    println!("Created event {}", event.event_id);
    Ok(())
}

pub async fn inspect(data_dir: &Path, event_id: &str) -> Result<()> {
    let store = EntityStore::open(data_dir.join(DB_FILE)).await?;
    let Some(event) = store.get_event(event_id).await? else {
        print_error(&format!("Event {} not found", event_id));
        return Ok(());
    };
    let round = event.current_round;

    let tasks = store.list_tasks_for_round(event_id, round).await?;
    let commands: Vec<_> = store
        .list_commands_for_event(event_id)
        .await?
        .into_iter()
        .filter(|c| c.round_id == round)
        .collect();
    let executions = store.list_executions_for_round(event_id, round).await?;
    let latest = store.latest_summary(event_id).await?;

    let mut section = GuideSection::new(&format!("Event {}", event.event_id))
        .status("Name", &event.event_name)
        .status("Status", &format!("{}", style(event.status.as_str()).bold()))
        .status("Round", &round.to_string());
    if event.manually_resolved {
        section = section.status("Resolution", "manual");
    }
    section
        .blank()
        .status("Tasks", &count_by(tasks.iter().map(|t| t.task_status.as_str())))
        .status(
            "Commands",
            &count_by(commands.iter().map(|c| c.command_status.as_str())),
        )
        .status(
            "Executions",
            &count_by(executions.iter().map(|e| e.execution_status.as_str())),
        )
        .print();

    match latest {
        Some(summary) => GuideSection::new(&format!("Latest report (round {})", summary.round_id))
            .text(&summary.event_summary)
            .print(),
        None => GuideSection::new("Latest report").text("none yet").print(),
    }
    println!();
    Ok(())
}

pub async fn resolve(data_dir: &Path, event_id: &str, note: Option<&str>) -> Result<()> {
    let (_config, deps, _audit) = open_deps(data_dir).await?;
    match resolve_event(&deps, event_id, note).await {
        Ok(true) => {
            print_success(&format!("Event {} resolved and reported", event_id));
            Ok(())
        }
        Ok(false) => {
            print_error(&format!("Event {} not found", event_id));
            Ok(())
        }
        Err(e) => {
            if let Ok(Some(event)) = deps.store.get_event(event_id).await
                && event.status == EventStatus::ToBeSummarized
            {
                print_warn("The final report will be retried by the running daemon.");
            }
            Err(e)
        }
    }
}
