use serde_json::Value;

/// Typed outcome of reading a narrator round report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDecode {
    /// Structured answer for the right event.
    Parsed { summary: String },
    /// Not JSON (or no `summary`): the raw response is the report.
    FallbackRaw { text: String },
    /// Structured answer naming another (or no) event.
    Mismatch { found: Option<String> },
}

impl ReportDecode {
    /// Text to persist. A mismatch keeps the raw response rather than dropping
    /// the narrator's work.
    pub fn into_summary_text(self, raw: &str) -> String {
        match self {
            ReportDecode::Parsed { summary } => summary.trim().to_string(),
            ReportDecode::FallbackRaw { text } => text.trim().to_string(),
            ReportDecode::Mismatch { .. } => raw.trim().to_string(),
        }
    }
}

/// Drops one leading ```` ```json ```` (or bare ```` ``` ````) fence and a
/// trailing fence.
fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    let text = text.trim_end();
    text.strip_suffix("```").unwrap_or(text).trim()
}

pub fn decode_round_report(raw: &str, expected_event_id: &str) -> ReportDecode {
    let fallback = || ReportDecode::FallbackRaw {
        text: raw.to_string(),
    };

    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(strip_fences(raw)) else {
        return fallback();
    };
    let Some(summary) = obj.get("summary").and_then(Value::as_str) else {
        return fallback();
    };

    let found = obj
        .get("event_id")
        .and_then(Value::as_str)
        .map(str::to_string);
    if found.as_deref() != Some(expected_event_id) {
        return ReportDecode::Mismatch { found };
    }

    ReportDecode::Parsed {
        summary: summary.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_with_matching_id_parses() {
        let raw = "```json\n{\"event_id\": \"e1\", \"summary\": \"host isolated\"}\n```";
        assert_eq!(
            decode_round_report(raw, "e1"),
            ReportDecode::Parsed {
                summary: "host isolated".into()
            }
        );
    }

    #[test]
    fn bare_fence_is_stripped_too() {
        let raw = "```\n{\"event_id\": \"e1\", \"summary\": \"ok\"}\n```\n";
        assert!(matches!(
            decode_round_report(raw, "e1"),
            ReportDecode::Parsed { .. }
        ));
    }

    #[test]
    fn prose_falls_back_to_raw_text() {
        let raw = "Round 1: two hosts scanned, nothing found.";
        assert_eq!(
            decode_round_report(raw, "e1"),
            ReportDecode::FallbackRaw { text: raw.into() }
        );
    }

    #[test]
    fn json_without_summary_falls_back() {
        let raw = "{\"event_id\": \"e1\"}";
        assert!(matches!(
            decode_round_report(raw, "e1"),
            ReportDecode::FallbackRaw { .. }
        ));
    }

    #[test]
    fn other_event_id_is_a_mismatch() {
        let raw = "{\"event_id\": \"e2\", \"summary\": \"wrong incident\"}";
        let decoded = decode_round_report(raw, "e1");
        assert_eq!(
            decoded,
            ReportDecode::Mismatch {
                found: Some("e2".into())
            }
        );
        assert_eq!(decoded.into_summary_text(raw), raw);
    }

    #[test]
    fn missing_event_id_is_a_mismatch() {
        let raw = "{\"summary\": \"no id\"}";
        assert_eq!(
            decode_round_report(raw, "e1"),
            ReportDecode::Mismatch { found: None }
        );
    }

    #[test]
    fn summary_text_is_trimmed() {
        let decoded = ReportDecode::Parsed {
            summary: "  done \n".into(),
        };
        assert_eq!(decoded.into_summary_text("ignored"), "done");
    }
}
