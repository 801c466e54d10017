use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::connection::SecretValues;
use crate::stream::StreamEvent;

/// Tool definition sent to the agent service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A tool call extracted from the agent stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// One research run handed to the agent service.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Natural-language task description.
    pub input: String,
    /// Candidate models in preference order (leftmost first).
    pub models: Vec<String>,
    /// MCP tool-server references, e.g. `"nickyhec/discord-mcp"`.
    pub mcp_servers: Vec<String>,
    /// Credentials bound to the MCP servers above.
    pub credentials: Vec<SecretValues>,
    /// Client-side tools the agent may call.
    pub tools: Vec<ToolDefinition>,
    pub stream: bool,
}

/// Narrow seam over the hosted agent-orchestration service.
///
/// Implementations push events into `tx` as they arrive and return once the
/// run is over. Tests substitute scripted runners here.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Runner name for logging and error messages.
    fn name(&self) -> &str;

    async fn run_stream(
        &self,
        req: &AgentRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), RunnerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Runner unavailable: {0}")]
    Unavailable(String),
}
