//! `capture_agenda` — the agent's hand-off point for the compiled agenda.
//!
//! The agent is told to finish by calling this tool instead of replying in
//! prose or posting anywhere itself. The pipeline watches the stream for the
//! call and takes `agenda_text` from its arguments.

use async_trait::async_trait;

use super::{Tool, ToolResult};

pub const CAPTURE_TOOL: &str = "capture_agenda";
pub const AGENDA_FIELD: &str = "agenda_text";

pub struct CaptureAgendaTool;

#[async_trait]
impl Tool for CaptureAgendaTool {
    fn name(&self) -> &str {
        CAPTURE_TOOL
    }

    fn description(&self) -> &str {
        "Hand back the final compiled event agenda. Call exactly once, as the last step."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                AGENDA_FIELD: {
                    "type": "string",
                    "description": "The complete agenda, formatted per the output rules."
                }
            },
            "required": [AGENDA_FIELD]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        match extract_agenda(&input) {
            Some(_) => ToolResult::success("Agenda captured."),
            None => ToolResult::error(format!("missing or empty '{AGENDA_FIELD}' parameter")),
        }
    }
}

/// Pull `agenda_text` out of a capture payload.
///
/// Accepts the parsed object, or a JSON string holding it (some runners
/// double-encode arguments). Empty text counts as absent.
pub fn extract_agenda(input: &serde_json::Value) -> Option<String> {
    match input {
        serde_json::Value::Object(map) => map
            .get(AGENDA_FIELD)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        serde_json::Value::String(raw) => serde_json::from_str::<serde_json::Value>(raw)
            .ok()
            .filter(|v| v.is_object())
            .and_then(|v| extract_agenda(&v)),
        _ => None,
    }
}
