use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgendaError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A credential or destination needed for posting is unset.
    /// The pipeline reports this as a skipped post, never as a failed run.
    #[error("Configuration missing: {key}")]
    ConfigurationMissing { key: String },

    #[error("No agenda captured")]
    AgentProducedNoAgenda,

    #[error("Agent runner error: {0}")]
    Agent(String),

    #[error("Discord post failed {status}: {body}")]
    PostEndpoint { status: u16, body: String },

    #[error("Post transport error: {0}")]
    PostTransport(String),

    #[error("Agent run timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Invalid chunk limit: {limit} (must be > 0)")]
    ChunkingPrecondition { limit: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgendaError {
    /// Short, stable error code for status summaries.
    pub fn code(&self) -> &'static str {
        match self {
            AgendaError::Config(_) => "CONFIG_ERROR",
            AgendaError::ConfigurationMissing { .. } => "CONFIGURATION_MISSING",
            AgendaError::AgentProducedNoAgenda => "NO_AGENDA",
            AgendaError::Agent(_) => "AGENT_ERROR",
            AgendaError::PostEndpoint { .. } => "POST_ENDPOINT_ERROR",
            AgendaError::PostTransport(_) => "POST_TRANSPORT_ERROR",
            AgendaError::Timeout { .. } => "TIMEOUT",
            AgendaError::ChunkingPrecondition { .. } => "CHUNKING_PRECONDITION",
            AgendaError::Serialization(_) => "SERIALIZATION_ERROR",
            AgendaError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, AgendaError>;
