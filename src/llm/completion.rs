//! Request and response types for chat completions.

use crate::conversation::ChatMessage;
use crate::error::Result;

use serde::{Deserialize, Serialize};

/// A chat completion request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "prompt={} completion={} total={}",
            self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}

/// A chat completion response. Providers may return no choices at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub choices: Vec<ChatMessage>,
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    /// The first candidate, the one that gets replied with.
    pub fn first_choice(&self) -> Option<&ChatMessage> {
        self.choices.first()
    }
}

/// Anything that can answer a chat completion request.
#[async_trait::async_trait]
pub trait CompletionService: Send + Sync {
    /// False while no credentials are configured. Inbound events are ignored then.
    fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}
