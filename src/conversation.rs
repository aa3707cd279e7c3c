//! Conversation turns and the reply-indexed context store.

pub mod history;
pub mod reply_store;

pub use history::{ChatMessage, ConversationHistory, Role};
pub use reply_store::ReplyContextStore;
