//! Operator commands typed on the console: `/reload`, `/token <value>`, `/help`.

use crate::config::{self, Config, RuntimeConfig};
use crate::error::Result;
use crate::llm::LlmManager;

use std::path::PathBuf;
use std::sync::Arc;

pub const HELP_TEXT: &str = "\
commands:
  /reload          re-read the config file and apply it
  /token <value>   set and persist the API token (empty value disables the bot)
  /help            show this message";

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Reload,
    SetToken(String),
    Help,
    Unknown(String),
}

impl AdminCommand {
    /// Parse a line starting with `/`. Anything else is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.trim().strip_prefix('/')?;
        let (head, arg) = match rest.split_once(char::is_whitespace) {
            Some((head, arg)) => (head, arg.trim()),
            None => (rest, ""),
        };

        let command = match head.to_lowercase().as_str() {
            "reload" => Self::Reload,
            "token" => Self::SetToken(arg.to_string()),
            "help" | "h" => Self::Help,
            _ => Self::Unknown(head.to_string()),
        };
        Some(command)
    }
}

/// Everything a command may touch.
pub struct CommandContext {
    pub config_path: PathBuf,
    pub llm: Arc<LlmManager>,
    pub runtime_config: Arc<RuntimeConfig>,
}

impl CommandContext {
    /// Run a command and return the text to show the operator.
    pub async fn execute(&self, command: AdminCommand) -> Result<String> {
        match command {
            AdminCommand::Reload => {
                let config = Config::load_from_path(&self.config_path)?;
                self.llm.reconfigure(config.llm.clone())?;
                self.runtime_config.reload_from(&config);
                Ok(format!("reloaded {}", self.config_path.display()))
            }
            AdminCommand::SetToken(token) => {
                config::persist_api_token(&self.config_path, &token).await?;
                self.llm.update_token(&token)?;
                if token.is_empty() {
                    Ok("token cleared, bot disabled".into())
                } else {
                    Ok("token updated".into())
                }
            }
            AdminCommand::Help => Ok(HELP_TEXT.into()),
            AdminCommand::Unknown(name) => Ok(format!("unknown command /{name}\n{HELP_TEXT}")),
        }
    }
}
