//! HTTP runner for the hosted agent service (OpenAI-compatible chat API
//! extended with `mcp_servers`, multi-model `model` lists and bound
//! `credentials`).
//!
//! MCP tools run on the service side. When a turn ends on a call to one of
//! our client-side tools, the runner executes it, appends the result and
//! streams the next turn, the same loop the service SDKs run.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::provider::{AgentRequest, AgentRunner, RunnerError, ToolCall};
use crate::stream::{complete_tool_call, parse_sse_line, SseParsed, StreamEvent, ToolCallAssembler};
use crate::tools::{execute_named, Tool};

/// Upper bound on client-side tool rounds per run.
const MAX_TOOL_ROUNDS: usize = 8;

pub struct DedalusRunner {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    tools: Vec<Box<dyn Tool>>,
}

impl DedalusRunner {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, RunnerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            tools: Vec::new(),
        })
    }

    /// Register client-side tools the runner may execute.
    pub fn with_tools(mut self, tools: Vec<Box<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    fn is_local(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }
}

/// What one streamed turn produced.
#[derive(Debug, Default)]
struct StreamTurn {
    model: String,
    content: String,
    tool_calls: Vec<ToolCall>,
    finish_reason: String,
    /// Receiver went away; stop without sending more.
    closed: bool,
}

#[async_trait]
impl AgentRunner for DedalusRunner {
    fn name(&self) -> &str {
        "dedalus"
    }

    async fn run_stream(
        &self,
        req: &AgentRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), RunnerError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut messages = vec![serde_json::json!({
            "role": "user",
            "content": req.input,
        })];
        let mut last = StreamTurn::default();

        for round in 0..MAX_TOOL_ROUNDS {
            let body = build_request_body(req, &messages);
            debug!(round, models = ?req.models, "sending streaming request to agent service");

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let text = resp.text().await.unwrap_or_default();
                warn!(status, body = %text, "agent service API error");
                return Err(RunnerError::Api {
                    status,
                    message: text,
                });
            }

            let turn = process_stream(resp, &tx).await?;
            if turn.closed {
                return Ok(());
            }

            let continue_loop = turn.finish_reason == "tool_calls"
                && !turn.tool_calls.is_empty()
                && turn.tool_calls.iter().all(|c| self.is_local(&c.name));
            if !continue_loop {
                last = turn;
                break;
            }
            // no turn left to carry the results
            if round + 1 == MAX_TOOL_ROUNDS {
                warn!(max_rounds = MAX_TOOL_ROUNDS, "agent tool loop hit maximum rounds");
                last = turn;
                break;
            }

            info!(round, calls = turn.tool_calls.len(), "executing client-side tool calls");
            append_tool_round(&mut messages, &turn, &self.tools).await;
            last = turn;
        }

        let _ = tx
            .send(StreamEvent::Done {
                model: last.model,
                stop_reason: last.finish_reason,
            })
            .await;
        Ok(())
    }
}

fn build_request_body(req: &AgentRequest, messages: &[serde_json::Value]) -> serde_json::Value {
    let tools: Vec<serde_json::Value> = req
        .tools
        .iter()
        .map(|t| {
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                }
            })
        })
        .collect();

    let mut body = serde_json::json!({
        "model": req.models,
        "messages": messages,
        "mcp_servers": req.mcp_servers,
        "stream": req.stream,
    });
    if !tools.is_empty() {
        body["tools"] = serde_json::Value::Array(tools);
    }
    if !req.credentials.is_empty() {
        body["credentials"] = serde_json::json!(req.credentials);
    }
    body
}

/// Record the assistant's tool calls and our results for the next turn.
async fn append_tool_round(
    messages: &mut Vec<serde_json::Value>,
    turn: &StreamTurn,
    tools: &[Box<dyn Tool>],
) {
    let calls: Vec<serde_json::Value> = turn
        .tool_calls
        .iter()
        .map(|c| {
            serde_json::json!({
                "id": c.id,
                "type": "function",
                "function": {
                    "name": c.name,
                    "arguments": c.input.to_string(),
                }
            })
        })
        .collect();

    messages.push(serde_json::json!({
        "role": "assistant",
        "content": turn.content,
        "tool_calls": calls,
    }));

    for call in &turn.tool_calls {
        let result = execute_named(tools, &call.name, call.input.clone()).await;
        debug!(tool = %call.name, is_error = result.is_error, "client-side tool executed");
        messages.push(serde_json::json!({
            "role": "tool",
            "tool_call_id": call.id,
            "content": result.content,
        }));
    }
}

/// Parse one streamed turn and forward events as they complete.
/// Each data line holds a JSON chunk; `data: [DONE]` ends the turn.
async fn process_stream(
    resp: reqwest::Response,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<StreamTurn, RunnerError> {
    use futures_util::StreamExt;

    let mut turn = StreamTurn::default();
    let mut assembler = ToolCallAssembler::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    // raw bytes: a multi-byte char may straddle two network chunks
    let mut line_buf: Vec<u8> = Vec::new();
    let mut byte_stream = resp.bytes_stream();

    'read: while let Some(chunk) = byte_stream.next().await {
        line_buf.extend_from_slice(&chunk?);

        while let Some(pos) = line_buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = line_buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some(SseParsed::Data(data)) = parse_sse_line(line) else {
                continue;
            };
            if data.trim() == "[DONE]" {
                break 'read;
            }

            let events = match serde_json::from_str::<StreamChunk>(&data) {
                Ok(chunk) => apply_chunk(chunk, &mut turn, &mut assembler),
                Err(e) => {
                    debug!(error = %e, "skipping unparseable stream chunk");
                    continue;
                }
            };
            if !forward(events, &mut turn, &mut seen_ids, tx).await {
                turn.closed = true;
                return Ok(turn);
            }
        }
    }

    let rest = assembler.finish();
    if !forward(
        rest.into_iter().map(tool_use_event).collect(),
        &mut turn,
        &mut seen_ids,
        tx,
    )
    .await
    {
        turn.closed = true;
    }
    Ok(turn)
}

/// Fold one chunk into the turn; returns events ready to forward.
fn apply_chunk(
    chunk: StreamChunk,
    turn: &mut StreamTurn,
    assembler: &mut ToolCallAssembler,
) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if let Some(err) = chunk.error {
        warn!(error = %err, "agent service reported a stream error");
        events.push(StreamEvent::Error {
            message: err.to_string(),
        });
    }
    if turn.model.is_empty() {
        if let Some(model) = chunk.model {
            turn.model = model;
        }
    }

    for choice in chunk.choices {
        if let Some(delta) = choice.delta {
            if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                turn.content.push_str(&text);
                events.push(StreamEvent::TextDelta { text });
            }
            for (pos, tc) in delta.tool_calls.unwrap_or_default().into_iter().enumerate() {
                let function = tc.function.unwrap_or_default();
                let index = tc.index.unwrap_or(pos as u32);
                if let Some(done) = assembler.push_delta(
                    index,
                    tc.id.as_deref(),
                    function.name.as_deref(),
                    Some(&function.arguments),
                ) {
                    events.push(tool_use_event(done));
                }
            }
        }

        // complete records; text here repeats the deltas, so only calls count
        if let Some(message) = choice.message {
            for tc in message.tool_calls.unwrap_or_default() {
                let function = tc.function.unwrap_or_default();
                let call = complete_tool_call(
                    tc.id.as_deref().unwrap_or(""),
                    function.name.as_deref().unwrap_or(""),
                    &function.arguments,
                );
                events.push(tool_use_event(call));
            }
        }

        if let Some(reason) = choice.finish_reason.filter(|r| !r.is_empty()) {
            turn.finish_reason = reason;
            events.extend(assembler.finish().into_iter().map(tool_use_event));
        }
    }

    events
}

fn tool_use_event(call: ToolCall) -> StreamEvent {
    StreamEvent::ToolUse {
        id: call.id,
        name: call.name,
        input: call.input,
    }
}

/// Send events downstream; `false` once the receiver is gone.
async fn forward(
    events: Vec<StreamEvent>,
    turn: &mut StreamTurn,
    seen_ids: &mut HashSet<String>,
    tx: &mpsc::Sender<StreamEvent>,
) -> bool {
    for event in events {
        if let StreamEvent::ToolUse { id, name, input } = &event {
            // the same call may arrive as deltas and again as a full message
            if !id.is_empty() && !seen_ids.insert(id.clone()) {
                continue;
            }
            turn.tool_calls.push(ToolCall {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            });
        }
        if tx.send(event).await.is_err() {
            return false;
        }
    }
    true
}

// Streaming chunk types (private — deserialization only)

#[derive(Deserialize)]
struct StreamChunk {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    message: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    index: Option<u32>,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Deserialize, Default)]
struct FunctionDelta {
    name: Option<String>,
    #[serde(default)]
    arguments: serde_json::Value,
}
