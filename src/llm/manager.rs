//! LLM manager owning the hot-swappable completion client.

use crate::config::LlmConfig;
use crate::error::{LlmError, Result};
use crate::llm::{CompletionRequest, CompletionResponse, CompletionService, OpenAiClient};

use arc_swap::{ArcSwap, ArcSwapOption};
use std::sync::Arc;

/// Holds the current completion client. Without a token there is no client,
/// and the bot ignores all traffic until one is set.
pub struct LlmManager {
    config: ArcSwap<LlmConfig>,
    client: ArcSwapOption<OpenAiClient>,
}

impl LlmManager {
    /// Create a new LLM manager with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self {
            config: ArcSwap::from_pointee(config),
            client: ArcSwapOption::new(client.map(Arc::new)),
        })
    }

    /// Replace the API token, rebuilding the client. An empty token disables completions.
    pub fn update_token(&self, token: &str) -> Result<()> {
        let mut config = LlmConfig::clone(&self.config.load());
        config.api_token = token.trim().to_string();
        self.reconfigure(config)
    }

    /// Apply a new base URL, token or timeout.
    pub fn reconfigure(&self, config: LlmConfig) -> Result<()> {
        let client = build_client(&config)?;
        let available = client.is_some();
        self.client.store(client.map(Arc::new));
        self.config.store(Arc::new(config));
        tracing::info!(available, "completion client reconfigured");
        Ok(())
    }
}

fn build_client(config: &LlmConfig) -> Result<Option<OpenAiClient>> {
    if config.api_token.is_empty() {
        return Ok(None);
    }
    OpenAiClient::new(&config.api_base_url, &config.api_token, config.timeout()).map(Some)
}

#[async_trait::async_trait]
impl CompletionService for LlmManager {
    fn is_available(&self) -> bool {
        self.client.load().is_some()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let client = self.client.load_full().ok_or(LlmError::MissingToken)?;
        tracing::info!(model = %request.model, turns = request.messages.len(), "completion requesting");
        client.complete(request).await
    }
}
