use agenda_core::AgendaError;

/// Errors produced while posting to Discord.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Discord post failed {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid chunk limit: {limit}")]
    InvalidLimit { limit: usize },
}

impl From<DiscordError> for AgendaError {
    fn from(e: DiscordError) -> Self {
        match e {
            DiscordError::Api { status, body } => AgendaError::PostEndpoint { status, body },
            DiscordError::InvalidLimit { limit } => AgendaError::ChunkingPrecondition { limit },
            DiscordError::Http(e) => AgendaError::PostTransport(e.to_string()),
        }
    }
}
