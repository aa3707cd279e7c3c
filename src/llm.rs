//! Completion service clients.

pub mod completion;
pub mod manager;
pub mod openai;

pub use completion::{CompletionRequest, CompletionResponse, CompletionService, Usage};
pub use manager::LlmManager;
pub use openai::OpenAiClient;
