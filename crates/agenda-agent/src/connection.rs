//! Credential bindings for the MCP tool servers the agent calls.
//!
//! A [`Connection`] describes how a server authenticates (which secret keys
//! it expects, its API base and header format). [`SecretValues`] binds actual
//! values to that schema; the bound set travels with the agent request.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use agenda_core::config::{AgendaConfig, DiscordConfig, XConfig, DEFAULT_DISCORD_API};

/// Schema for one MCP server's credentials.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Connection {
    pub name: String,
    /// Secret slot name → environment variable it is conventionally read from.
    pub secrets: BTreeMap<String, String>,
    pub base_url: String,
    /// Header template; `{api_key}` is replaced with the primary secret.
    pub auth_header_format: String,
}

/// Secret values bound to a [`Connection`].
#[derive(Clone, Serialize)]
pub struct SecretValues {
    pub connection: Connection,
    pub values: BTreeMap<String, String>,
}

impl std::fmt::Debug for SecretValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretValues")
            .field("connection", &self.connection.name)
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn slots(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn discord_mcp_connection() -> Connection {
    Connection {
        name: "discord-mcp".to_string(),
        secrets: slots(&[
            ("discord_app_id", "DISCORD_APP_ID"),
            ("discord_token", "DISCORD_TOKEN"),
            ("discord_public_key", "DISCORD_PUBLIC_KEY"),
        ]),
        base_url: DEFAULT_DISCORD_API.to_string(),
        auth_header_format: "Bot {api_key}".to_string(),
    }
}

pub fn x_connection() -> Connection {
    Connection {
        name: "x".to_string(),
        secrets: slots(&[("token", "X_BEARER_TOKEN")]),
        base_url: "https://api.x.com".to_string(),
        auth_header_format: "Bearer {api_key}".to_string(),
    }
}

/// Bind Discord credentials; `None` without a bot token.
pub fn discord_mcp_secrets(cfg: &DiscordConfig) -> Option<SecretValues> {
    let token = cfg.token()?;
    let text = |v: &Option<String>| v.as_deref().unwrap_or("").trim().to_string();
    Some(SecretValues {
        connection: discord_mcp_connection(),
        values: BTreeMap::from([
            ("discord_app_id".to_string(), text(&cfg.app_id)),
            ("discord_token".to_string(), token.to_string()),
            ("discord_public_key".to_string(), text(&cfg.public_key)),
        ]),
    })
}

/// Bind X credentials; `None` without a bearer token.
pub fn x_secrets(cfg: &XConfig) -> Option<SecretValues> {
    let token = cfg.bearer_token()?;
    Some(SecretValues {
        connection: x_connection(),
        values: BTreeMap::from([("token".to_string(), token.to_string())]),
    })
}

/// Every credential set that is actually available.
pub fn all_credentials(cfg: &AgendaConfig) -> Vec<SecretValues> {
    discord_mcp_secrets(&cfg.discord)
        .into_iter()
        .chain(x_secrets(&cfg.x))
        .collect()
}

/// Report whether the Discord reader can authenticate. Never fatal.
pub fn check_discord_credentials(cfg: &DiscordConfig) -> bool {
    match cfg.token() {
        Some(_) => {
            info!(
                app_id = cfg.app_id.as_deref().unwrap_or("N/A"),
                "Discord token found"
            );
            true
        }
        None => {
            warn!(
                "DISCORD_TOKEN not set: the discord-mcp server cannot authenticate \
                 and Discord channel access may fail"
            );
            false
        }
    }
}
