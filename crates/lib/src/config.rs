//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.sigbridge/config.json`) and environment.
//! Every section has defaults so a partial file is enough; secrets may come from env instead.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener for the webhook and health endpoints.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Signal REST API (signal-cli-rest-api) and the bridge's own number.
    #[serde(default)]
    pub signal: SignalConfig,

    /// Which AI backend answers messages (default "anythingllm").
    #[serde(default)]
    pub backend: BackendKind,

    /// AnythingLLM workspace the messages are forwarded to.
    #[serde(default)]
    pub anythingllm: AnythingLlmConfig,

    /// OpenAI-compatible endpoint (LiteLLM proxy), used when backend is "litellm".
    #[serde(default)]
    pub litellm: LiteLlmConfig,

    /// Reply behavior (timeouts, length limit, fallback text).
    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 18789).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; the Signal REST API usually runs in another container).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// How long shutdown waits for in-flight replies before exiting.
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
}

fn default_gateway_port() -> u16 {
    18789
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_shutdown_grace_seconds() -> u64 {
    10
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
        }
    }
}

/// Signal REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalConfig {
    #[serde(default = "default_signal_api_url")]
    pub api_url: String,

    /// The bridge's own registered number, used as sender and for self-echo filtering. Overridden by SIGNAL_PHONE_NUMBER env.
    pub phone_number: Option<String>,

    #[serde(default = "default_send_timeout_seconds")]
    pub send_timeout_seconds: u64,
}

fn default_signal_api_url() -> String {
    "http://signal-api:8080".to_string()
}

fn default_send_timeout_seconds() -> u64 {
    30
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            api_url: default_signal_api_url(),
            phone_number: None,
            send_timeout_seconds: default_send_timeout_seconds(),
        }
    }
}

/// How AnythingLLM answers: "chat" uses the model plus workspace documents, "query" answers only from documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Chat,
    Query,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Chat => "chat",
            ChatMode::Query => "query",
        }
    }
}

/// AnythingLLM workspace settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnythingLlmConfig {
    #[serde(default = "default_anythingllm_api_url")]
    pub api_url: String,

    /// Developer API key. Overridden by ANYTHINGLLM_API_KEY env.
    pub api_key: Option<String>,

    /// Workspace slug as shown in the AnythingLLM URL.
    pub workspace_slug: Option<String>,

    #[serde(default)]
    pub mode: ChatMode,

    /// Prefix for the per-sender session id sent to AnythingLLM ("<prefix>-<sender>").
    #[serde(default = "default_session_prefix")]
    pub session_prefix: String,
}

fn default_anythingllm_api_url() -> String {
    "http://anythingllm:3001".to_string()
}

fn default_session_prefix() -> String {
    "signal".to_string()
}

impl Default for AnythingLlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_anythingllm_api_url(),
            api_key: None,
            workspace_slug: None,
            mode: ChatMode::default(),
            session_prefix: default_session_prefix(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    AnythingLlm,
    LiteLlm,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::AnythingLlm => "anythingllm",
            BackendKind::LiteLlm => "litellm",
        }
    }
}

/// OpenAI-compatible chat completions settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiteLlmConfig {
    #[serde(default = "default_litellm_api_url")]
    pub api_url: String,

    /// Bearer token for the proxy. Overridden by LITELLM_API_KEY env.
    pub api_key: Option<String>,

    #[serde(default = "default_litellm_model")]
    pub model: String,

    #[serde(default = "default_litellm_max_tokens")]
    pub max_tokens: u32,
}

fn default_litellm_api_url() -> String {
    "http://litellm:4000".to_string()
}

fn default_litellm_model() -> String {
    "llama3.2".to_string()
}

fn default_litellm_max_tokens() -> u32 {
    500
}

impl Default for LiteLlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_litellm_api_url(),
            api_key: None,
            model: default_litellm_model(),
            max_tokens: default_litellm_max_tokens(),
        }
    }
}

/// Reply behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Sent to the user when the backend fails or returns nothing.
    #[serde(default = "default_error_message")]
    pub error_message: String,

    /// Timeout for one backend query.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Replies longer than this (in characters) are truncated with a marker.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Upper bound on messages processed at once; further messages wait for a slot.
    #[serde(default = "default_max_concurrent_turns")]
    pub max_concurrent_turns: usize,
}

fn default_bot_name() -> String {
    "sigbridge".to_string()
}

fn default_error_message() -> String {
    "Sorry, I encountered an error processing your message. Please try again.".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_max_message_length() -> usize {
    2000
}

fn default_max_concurrent_turns() -> usize {
    16
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            error_message: default_error_message(),
            timeout_seconds: default_timeout_seconds(),
            max_message_length: default_max_message_length(),
            max_concurrent_turns: default_max_concurrent_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturesConfig {
    /// Number of turns (user and assistant each count as one) kept per sender.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_history_limit() -> usize {
    20
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve the AnythingLLM API key: env ANYTHINGLLM_API_KEY overrides config.
pub fn resolve_api_key(config: &Config) -> Option<String> {
    env_non_empty("ANYTHINGLLM_API_KEY").or_else(|| trimmed(config.anythingllm.api_key.as_ref()))
}

/// Resolve the LiteLLM proxy key: env LITELLM_API_KEY overrides config.
pub fn resolve_litellm_api_key(config: &Config) -> Option<String> {
    env_non_empty("LITELLM_API_KEY").or_else(|| trimmed(config.litellm.api_key.as_ref()))
}

/// Resolve the bridge's own Signal number: env SIGNAL_PHONE_NUMBER overrides config.
pub fn resolve_phone_number(config: &Config) -> Option<String> {
    env_non_empty("SIGNAL_PHONE_NUMBER").or_else(|| trimmed(config.signal.phone_number.as_ref()))
}

/// Check that everything needed to relay messages is present. Called once at startup.
pub fn validate(config: &Config) -> Result<()> {
    if resolve_phone_number(config).is_none() {
        anyhow::bail!("signal.phoneNumber is not set (or set SIGNAL_PHONE_NUMBER)");
    }
    match config.backend {
        BackendKind::AnythingLlm => {
            if resolve_api_key(config).is_none() {
                anyhow::bail!("anythingllm.apiKey is not set (or set ANYTHINGLLM_API_KEY)");
            }
            if trimmed(config.anythingllm.workspace_slug.as_ref()).is_none() {
                anyhow::bail!("anythingllm.workspaceSlug is not set");
            }
        }
        BackendKind::LiteLlm => {
            if resolve_litellm_api_key(config).is_none() {
                anyhow::bail!("litellm.apiKey is not set (or set LITELLM_API_KEY)");
            }
            if config.litellm.model.trim().is_empty() {
                anyhow::bail!("litellm.model is not set");
            }
        }
    }
    if config.bot.max_message_length == 0 {
        anyhow::bail!("bot.maxMessageLength must be greater than 0");
    }
    if config.bot.max_concurrent_turns == 0 {
        anyhow::bail!("bot.maxConcurrentTurns must be greater than 0");
    }
    Ok(())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("SIGBRIDGE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".sigbridge").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, or the default path (or SIGBRIDGE_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
