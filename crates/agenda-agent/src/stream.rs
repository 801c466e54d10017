use std::collections::BTreeMap;

use tracing::warn;

use crate::provider::ToolCall;

/// Events emitted while an agent run streams back.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental text content from the agent.
    TextDelta { text: String },

    /// A fully reassembled tool invocation.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Stream completed successfully.
    Done { model: String, stop_reason: String },

    /// Error reported in-band by the service.
    Error { message: String },
}

/// Parse a single SSE line.
/// SSE format: `event: <type>\ndata: <json>\n\n`
pub fn parse_sse_line(line: &str) -> Option<SseParsed> {
    if let Some(event_type) = line.strip_prefix("event: ") {
        Some(SseParsed::Event(event_type.to_string()))
    } else {
        line.strip_prefix("data: ")
            .or_else(|| line.strip_prefix("data:"))
            .map(|data| SseParsed::Data(data.trim_start().to_string()))
    }
}

#[derive(Debug)]
pub enum SseParsed {
    Event(String),
    Data(String),
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
    object: Option<serde_json::Value>,
}

impl PartialCall {
    fn complete(self) -> ToolCall {
        let input = match self.object {
            Some(obj) => obj,
            None => parse_arguments(&self.name, &self.arguments),
        };
        ToolCall {
            id: self.id,
            name: self.name,
            input,
        }
    }

    fn absorb(&mut self, arguments: &serde_json::Value) {
        match arguments {
            serde_json::Value::String(fragment) => self.arguments.push_str(fragment),
            serde_json::Value::Null => {}
            other => self.object = Some(other.clone()),
        }
    }
}

/// Reassembles OpenAI-style streamed tool calls.
///
/// Each delta names a slot `index`; the `arguments` string arrives in
/// fragments that only parse once the call is complete. A hosted runner may
/// reuse index 0 across tool rounds, so a delta carrying a new `id` for an
/// occupied slot completes the previous occupant.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    slots: BTreeMap<u32, PartialCall>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one delta. Returns a call displaced by a new id at the same index.
    pub fn push_delta(
        &mut self,
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&serde_json::Value>,
    ) -> Option<ToolCall> {
        let mut displaced = None;

        if let Some(new_id) = id.filter(|i| !i.is_empty()) {
            let occupied_by_other = self
                .slots
                .get(&index)
                .is_some_and(|p| !p.id.is_empty() && p.id != new_id);
            if occupied_by_other {
                displaced = self.slots.remove(&index).map(PartialCall::complete);
            }
        }

        let slot = self.slots.entry(index).or_default();
        if let Some(new_id) = id.filter(|i| !i.is_empty()) {
            slot.id = new_id.to_string();
        }
        if let Some(n) = name.filter(|n| !n.is_empty()) {
            slot.name.push_str(n);
        }
        if let Some(args) = arguments {
            slot.absorb(args);
        }

        displaced
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Complete every pending call, in index order.
    pub fn finish(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.slots)
            .into_values()
            .map(PartialCall::complete)
            .collect()
    }
}

/// Build a call from a non-streamed `message.tool_calls` record.
pub fn complete_tool_call(id: &str, name: &str, arguments: &serde_json::Value) -> ToolCall {
    let mut call = PartialCall {
        id: id.to_string(),
        name: name.to_string(),
        ..PartialCall::default()
    };
    call.absorb(arguments);
    call.complete()
}

fn parse_arguments(name: &str, raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::Value::Object(Default::default());
    }
    match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(tool = %name, error = %e, len = raw.len(), "tool arguments are not valid JSON");
            serde_json::Value::String(raw.to_string())
        }
    }
}
