//! Chat turns exchanged with the completion service.

use serde::{Deserialize, Serialize};

/// Shown in place of a turn whose content is empty.
pub const EMPTY_CONTENT_PLACEHOLDER: &str = "...";

/// Ordered turns of one conversation, oldest first.
pub type ConversationHistory = Vec<ChatMessage>;

/// Author role of a chat turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Content as shown to people: empty content becomes `"..."`.
    pub fn display_content(&self) -> &str {
        if self.content.is_empty() {
            EMPTY_CONTENT_PLACEHOLDER
        } else {
            &self.content
        }
    }
}
