use anyhow::{Result, bail};
use serde_json::{Map, Value};
use tracing::info;

use super::types::EventStatus;
use super::workers::{WorkerDeps, finish_summarized_event, summarize_event};

/// Merges `note` into the event context object under `resolution_note`.
/// Unparsable, empty or non-object context starts from `{}`.
pub fn merge_resolution_note(context: Option<&str>, note: &str) -> String {
    let mut obj = context
        .filter(|c| !c.trim().is_empty())
        .and_then(|c| serde_json::from_str::<Value>(c).ok())
        .and_then(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_else(Map::new);
    obj.insert("resolution_note".into(), Value::String(note.to_string()));
    Value::Object(obj).to_string()
}

/// Manually closes an incident: `resolved` → `to_be_summarized`, then one
/// synchronous round report, then `completed`.
///
/// Returns `Ok(false)` when the event does not exist. A narrator failure is
/// returned as an error with the event left at `to_be_summarized`, where the
/// event summarizer picks it up again.
pub async fn resolve_event(deps: &WorkerDeps, event_id: &str, note: Option<&str>) -> Result<bool> {
    let store = &deps.store;
    let Some(event) = store.get_event(event_id).await? else {
        return Ok(false);
    };

    match event.status {
        EventStatus::Completed => bail!("event {} is already completed", event_id),
        EventStatus::Resolved => {
            info!("Event {} already resolved, resuming its final report", event_id);
        }
        current => {
            let context = note.map(|n| merge_resolution_note(event.context.as_deref(), n));
            if !store
                .mark_resolved(event_id, current, context.as_deref())
                .await?
            {
                bail!(
                    "event {} changed while resolving (was {}), retry",
                    event_id,
                    current.as_str()
                );
            }
            info!("Event {} manually resolved from {}", event_id, current.as_str());
        }
    }

    if !store
        .transition_event(event_id, EventStatus::Resolved, EventStatus::ToBeSummarized)
        .await?
    {
        bail!("event {} left resolved before its final report", event_id);
    }

    let Some(event) = store.get_event(event_id).await? else {
        return Ok(false);
    };
    if summarize_event(deps, &event).await?.is_none() {
        info!("Final report of event {} was committed elsewhere", event_id);
    }
    finish_summarized_event(deps, event_id).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_merges_into_existing_object() {
        let merged = merge_resolution_note(Some("{\"source\":\"siem\"}"), "false positive");
        let v: Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(v["source"], "siem");
        assert_eq!(v["resolution_note"], "false positive");
    }

    #[test]
    fn unusable_context_starts_fresh() {
        for ctx in [None, Some(""), Some("not json"), Some("[1,2]")] {
            let v: Value = serde_json::from_str(&merge_resolution_note(ctx, "n")).unwrap();
            assert_eq!(v, serde_json::json!({"resolution_note": "n"}));
        }
    }
}
