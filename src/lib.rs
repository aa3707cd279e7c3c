//! replybot: a chat bot that threads LLM completions through quoted replies.

pub mod agent;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod formula;
pub mod llm;
pub mod messaging;
pub mod permissions;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};

/// Host-assigned message identifier.
pub type MessageId = i64;

/// Host-assigned user identifier.
pub type SenderId = i64;

/// Kind of conversation an inbound message arrived in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatKind {
    /// A group chat. Group operators may get a permission bypass.
    Group { group_id: i64 },
    /// A direct message from a friend of the bot account.
    Direct,
    /// A temporary or stranger session.
    Temporary,
}

/// Author of an inbound message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sender {
    pub id: SenderId,
    pub name: String,
    /// Owner or administrator of the group the message was sent in.
    pub is_operator: bool,
}

/// The message an inbound message replies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotedMessage {
    pub message_id: MessageId,
    /// Plain text of the quoted message as originally sent.
    pub text: String,
}

/// Inbound message from a messaging adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: MessageId,
    /// Name of the adapter that delivered the message. Responses are routed back by it.
    pub source: String,
    pub chat: ChatKind,
    pub sender: Sender,
    /// Plain-text segments of the message, trimmed.
    pub text: String,
    pub quote: Option<QuotedMessage>,
    pub mentions_bot: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Who a forwarded transcript entry is attributed to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The human who triggered the conversation.
    Sender { id: SenderId, name: String },
    /// The bot account.
    Bot,
}

/// One turn of a forwarded transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwardEntry {
    pub speaker: Speaker,
    pub content: String,
}

/// Outbound response to messaging platforms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutboundResponse {
    /// Plain text sent as a reply quoting the triggering message.
    Quote { text: String },
    /// A single bundled message containing several attributed turns.
    Forward { entries: Vec<ForwardEntry> },
}
