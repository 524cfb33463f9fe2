//! Report extraction from streaming agent output.
//!
//! Job children emit newline-delimited JSON on stdout. The extractor is
//! tolerant: non-JSON lines are ignored, and the last assistant message
//! observed across the stream becomes the run's report.

use corral_core::AgentId;
use serde_json::Value;

/// Extracts the last assistant message from a stream log, per agent.
/// Returns `None` when no message was observed or the result is empty.
pub fn extract_report(agent: AgentId, log: &str) -> Option<String> {
    let mut last: Option<String> = None;
    for line in log.lines() {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if let Some(text) = message_text(agent, &value) {
            last = Some(text);
        }
    }
    last.filter(|text| !text.trim().is_empty())
}

fn message_text(agent: AgentId, value: &Value) -> Option<String> {
    let kind = value.get("type")?.as_str()?;
    match agent {
        AgentId::Claude => {
            if kind != "assistant" {
                return None;
            }
            let content = value.get("message")?.get("content")?.as_array()?;
            let text: String = content
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect();
            Some(text)
        }
        AgentId::Codex => {
            if kind != "message" {
                return None;
            }
            let content = value.get("content")?;
            Some(match content.as_str() {
                Some(s) => s.to_string(),
                None => content.to_string(),
            })
        }
        AgentId::Gemini => {
            if kind != "text" {
                return None;
            }
            value.get("text")?.as_str().map(str::to_string)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_takes_the_last_assistant_text_concatenation() {
        let log = concat!(
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]}}"#,
            "\n",
            r#"{"type":"tool_use"}"#,
            "\n",
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use"},{"type":"text","text":"done"}]}}"#,
            "\n",
        );
        assert_eq!(extract_report(AgentId::Claude, log).as_deref(), Some("done"));
    }

    #[test]
    fn claude_concatenates_multiple_text_blocks() {
        let log = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"a"},{"type":"text","text":"b"}]}}"#;
        assert_eq!(extract_report(AgentId::Claude, log).as_deref(), Some("ab"));
    }

    #[test]
    fn codex_takes_string_or_stringified_content() {
        let log = concat!(
            r#"{"type":"message","content":"first"}"#,
            "\n",
            r#"{"type":"message","content":{"parts":["second"]}}"#,
            "\n",
        );
        let report = extract_report(AgentId::Codex, log).unwrap();
        assert!(report.contains("second"));
    }

    #[test]
    fn gemini_takes_text_events() {
        let log = concat!(
            r#"{"type":"text","text":"thinking"}"#,
            "\n",
            r#"{"type":"tool","name":"x"}"#,
            "\n",
            r#"{"type":"text","text":"final answer"}"#,
            "\n",
        );
        assert_eq!(
            extract_report(AgentId::Gemini, log).as_deref(),
            Some("final answer")
        );
    }

    #[test]
    fn malformed_lines_are_ignored() {
        let log = concat!(
            "not json at all\n",
            "{\"type\":\n",
            r#"{"type":"text","text":"ok"}"#,
            "\n",
            "trailing garbage\n",
        );
        assert_eq!(extract_report(AgentId::Gemini, log).as_deref(), Some("ok"));
    }

    #[test]
    fn empty_or_absent_messages_yield_none() {
        assert_eq!(extract_report(AgentId::Claude, ""), None);
        let log = r#"{"type":"assistant","message":{"content":[{"type":"tool_use"}]}}"#;
        assert_eq!(extract_report(AgentId::Claude, log), None);
        let blank = r#"{"type":"text","text":"   "}"#;
        assert_eq!(extract_report(AgentId::Gemini, blank), None);
    }
}
