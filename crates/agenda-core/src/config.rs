use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_DEDALUS_BASE_URL: &str = "https://api.dedaluslabs.ai";
pub const DEFAULT_DISCORD_API: &str = "https://discord.com/api/v9";
pub const DEFAULT_SERVER_NAME: &str = "Break In - Dec 2025";
pub const AGENT_TIMEOUT_SECS: u64 = 900; // whole agent run, stream included

/// Plain environment variables read on top of the TOML file, as `.env`
/// files for this agent have always carried them.
const RAW_ENV_KEYS: &[&str] = &[
    "DEDALUS_API_KEY",
    "DISCORD_TOKEN",
    "DISCORD_APP_ID",
    "DISCORD_PUBLIC_KEY",
    "DISCORD_POST_CHANNEL_ID",
    "DISCORD_GUILD_ID",
    "X_BEARER_TOKEN",
];

/// Top-level config (agenda.toml + AGENDA_* and raw env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgendaConfig {
    #[serde(default)]
    pub dedalus: DedalusConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub x: XConfig,
}

/// Hosted agent-runner service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedalusConfig {
    #[serde(default, deserialize_with = "opt_string")]
    pub api_key: Option<String>,
    #[serde(default = "default_dedalus_base_url")]
    pub base_url: String,
    /// Candidate models, tried by the service leftmost first.
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    /// MCP tool servers the agent may call.
    #[serde(default = "default_mcp_servers")]
    pub mcp_servers: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DedalusConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_dedalus_base_url(),
            models: default_models(),
            mcp_servers: default_mcp_servers(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token; used both for the MCP reader binding and for posting.
    #[serde(default, deserialize_with = "opt_string")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub app_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub public_key: Option<String>,
    /// Channel the finished agenda is posted to.
    #[serde(default, deserialize_with = "opt_string")]
    pub post_channel_id: Option<String>,
    /// Guild the agent should read events from.
    #[serde(default, deserialize_with = "opt_string")]
    pub guild_id: Option<String>,
    #[serde(default = "default_server_name")]
    pub server_name: String,
    #[serde(default = "default_discord_api")]
    pub api_base: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            app_id: None,
            public_key: None,
            post_channel_id: None,
            guild_id: None,
            server_name: default_server_name(),
            api_base: default_discord_api(),
        }
    }
}

impl DiscordConfig {
    pub fn token(&self) -> Option<&str> {
        non_blank(&self.token)
    }

    pub fn post_channel_id(&self) -> Option<&str> {
        non_blank(&self.post_channel_id)
    }

    pub fn guild_id(&self) -> Option<&str> {
        non_blank(&self.guild_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XConfig {
    #[serde(default, deserialize_with = "opt_string")]
    pub bearer_token: Option<String>,
}

impl XConfig {
    pub fn bearer_token(&self) -> Option<&str> {
        non_blank(&self.bearer_token)
    }
}

impl DedalusConfig {
    pub fn api_key(&self) -> Option<&str> {
        non_blank(&self.api_key)
    }
}

/// Treat unset and whitespace-only values the same way.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn default_dedalus_base_url() -> String {
    DEFAULT_DEDALUS_BASE_URL.to_string()
}
fn default_models() -> Vec<String> {
    vec![
        "anthropic/claude-opus-4-5".to_string(),
        "openai/gpt-4-turbo".to_string(),
    ]
}
fn default_mcp_servers() -> Vec<String> {
    vec![
        "nickyhec/discord-mcp".to_string(),
        "tsion/brave-search-mcp".to_string(),
    ]
}
fn default_timeout_secs() -> u64 {
    AGENT_TIMEOUT_SECS
}
fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}
fn default_discord_api() -> String {
    DEFAULT_DISCORD_API.to_string()
}

// Env values are parsed as TOML scalars, so a snowflake like
// DISCORD_POST_CHANNEL_ID arrives as an integer.
fn opt_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Str(s) => s,
        Raw::Unsigned(n) => n.to_string(),
        Raw::Signed(n) => n.to_string(),
    }))
}

impl AgendaConfig {
    /// Load config from a TOML file with env var overrides.
    ///
    /// File lookup: explicit path argument, then ~/.agenda/agenda.toml.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::extract(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("AGENDA_").split("__"))
                .merge(raw_env()),
        )
    }

    fn extract(figment: Figment) -> crate::error::Result<Self> {
        figment
            .extract()
            .map_err(|e| crate::error::AgendaError::Config(e.to_string()))
    }
}

/// `DISCORD_POST_CHANNEL_ID` → `discord.post_channel_id`, and so on.
fn raw_env() -> Env {
    Env::raw()
        .only(RAW_ENV_KEYS)
        .map(|key| key.as_str().replacen('_', ".", 1).into())
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.agenda/agenda.toml", home)
}
