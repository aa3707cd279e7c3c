//! Configuration loading and validation.

use crate::SenderId;
use crate::error::{ConfigError, Result};

use arc_swap::ArcSwap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default number of sent replies whose conversation can be resumed by quoting them.
pub const DEFAULT_REPLY_CAPACITY: usize = 30;

/// replybot configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion service settings.
    pub llm: LlmConfig,

    /// Formula rendering service settings.
    pub formula: FormulaConfig,

    /// Fallback permission rules.
    pub permissions: PermissionConfig,

    /// Reply threading settings.
    pub conversation: ConversationConfig,
}

/// Completion service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `https://api.openai.com/v1`.
    pub api_base_url: String,

    /// Bearer token. Empty means the bot stays silent.
    pub api_token: String,

    /// Model identifier sent with every request.
    pub chat_model: String,

    /// Connect, request and read timeout in milliseconds.
    pub timeout_ms: u64,

    /// Seeds every fresh conversation as a system message when non-empty.
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.openai.com/v1".into(),
            api_token: String::new(),
            chat_model: "gpt-3.5-turbo".into(),
            timeout_ms: 60_000,
            system_prompt: String::new(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Formula rendering service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FormulaConfig {
    /// Endpoint receiving `?latex_code=<formula>` and answering with an image URL.
    pub endpoint: String,

    pub timeout_ms: u64,
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.hk.jmstrand.cn/latex_to_image".into(),
            timeout_ms: 30_000,
        }
    }
}

impl FormulaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Who may chat without holding the explicit chat capability.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    /// Senders holding the explicit chat capability.
    pub allowed_senders: Vec<SenderId>,

    /// Group owners and administrators may chat.
    pub group_op_has_chat_permission: bool,

    /// Friends may chat in direct messages.
    pub friend_has_chat_permission: bool,

    /// Shorthand enabling both bypasses above.
    pub everyone_has_chat_permission: bool,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            allowed_senders: Vec::new(),
            group_op_has_chat_permission: true,
            friend_has_chat_permission: false,
            everyone_has_chat_permission: false,
        }
    }
}

/// Reply threading configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// How many sent replies remain resumable.
    pub reply_capacity: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            reply_capacity: DEFAULT_REPLY_CAPACITY,
        }
    }
}

impl Config {
    /// Default config file location: `<config dir>/replybot/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("replybot"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Load configuration from the default location and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path())
    }

    /// Load from a specific config file path. A missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Load {
                path: path.display().to_string(),
                source: Arc::new(error),
            })?;
            toml::from_str::<Self>(&content).map_err(|error| ConfigError::Parse {
                path: path.display().to_string(),
                message: error.to_string(),
            })?
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|error| ConfigError::Invalid(error.to_string()).into())
    }

    /// Overlay environment values on top of the file values.
    fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        let token = env("REPLYBOT_API_TOKEN").or_else(|| env("OPENAI_API_KEY"));
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.llm.api_token = token;
        }
        if let Some(base_url) = env("REPLYBOT_API_BASE_URL").filter(|v| !v.is_empty()) {
            self.llm.api_base_url = base_url;
        }
        if let Some(model) = env("REPLYBOT_MODEL").filter(|v| !v.is_empty()) {
            self.llm.chat_model = model;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.api_base_url must not be empty".into()).into());
        }
        if self.llm.chat_model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.chat_model must not be empty".into()).into());
        }
        if self.llm.timeout_ms == 0 {
            return Err(ConfigError::Invalid("llm.timeout_ms must be positive".into()).into());
        }
        if self.formula.timeout_ms == 0 {
            return Err(ConfigError::Invalid("formula.timeout_ms must be positive".into()).into());
        }
        if self.conversation.reply_capacity == 0 {
            return Err(
                ConfigError::Invalid("conversation.reply_capacity must be positive".into()).into(),
            );
        }
        Ok(())
    }
}

/// Per-run chat settings that can change without a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub chat_model: String,
    pub system_prompt: String,
}

impl From<&LlmConfig> for ChatSettings {
    fn from(llm: &LlmConfig) -> Self {
        Self {
            chat_model: llm.chat_model.clone(),
            system_prompt: llm.system_prompt.clone(),
        }
    }
}

/// Hot-reloadable slice of the configuration, read once per orchestration run.
pub struct RuntimeConfig {
    pub chat: ArcSwap<ChatSettings>,
    pub permissions: Arc<ArcSwap<PermissionConfig>>,
}

impl RuntimeConfig {
    pub fn new(config: &Config) -> Self {
        Self {
            chat: ArcSwap::from_pointee(ChatSettings::from(&config.llm)),
            permissions: Arc::new(ArcSwap::from_pointee(config.permissions.clone())),
        }
    }

    /// Swap in the values of a freshly loaded config.
    pub fn reload_from(&self, config: &Config) {
        self.chat.store(Arc::new(ChatSettings::from(&config.llm)));
        self.permissions.store(Arc::new(config.permissions.clone()));
        tracing::info!(model = %config.llm.chat_model, "runtime config reloaded");
    }
}

/// Write a new API token into the config file, keeping its formatting and comments.
pub async fn persist_api_token(path: &Path, token: &str) -> Result<()> {
    let content = if path.exists() {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|error| ConfigError::Load {
                path: path.display().to_string(),
                source: Arc::new(error),
            })?
    } else {
        String::new()
    };

    let mut doc: toml_edit::DocumentMut =
        content.parse().map_err(|error: toml_edit::TomlError| ConfigError::Parse {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;

    if doc.get("llm").is_none() {
        doc["llm"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let llm = doc["llm"]
        .as_table_mut()
        .ok_or_else(|| ConfigError::Invalid("[llm] is not a table".into()))?;
    llm["api_token"] = toml_edit::value(token);

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, doc.to_string()).await?;

    tracing::info!(path = %path.display(), "API token persisted");
    Ok(())
}
