//! Decides whether an inbound message starts a chat, and with which context.

use crate::InboundMessage;
use crate::agent::{ChatDeps, ChatOutcome, CompletionOrchestrator};
use crate::conversation::{ChatMessage, ConversationHistory};
use crate::permissions;

/// Entry point for inbound messages.
pub struct EventRouter {
    deps: ChatDeps,
    orchestrator: CompletionOrchestrator,
}

impl EventRouter {
    pub fn new(deps: ChatDeps) -> Self {
        Self {
            orchestrator: CompletionOrchestrator::new(deps.clone()),
            deps,
        }
    }

    /// Handle one message. Returns `None` when the message was ignored.
    ///
    /// A message is picked up when it mentions the bot, or when it quotes a
    /// reply whose conversation is still cached. Quoting anything else while
    /// mentioning the bot without typing anything seeds the conversation with
    /// the quoted text. Typed text always starts from scratch in that case.
    pub async fn handle(&self, message: &InboundMessage) -> Option<ChatOutcome> {
        if !self.deps.completion.is_available() {
            return None;
        }

        let allowed = permissions::may_chat(
            self.deps.permissions.as_ref(),
            &self.deps.runtime_config.permissions.load(),
            message,
        );
        if !allowed {
            tracing::trace!(sender_id = message.sender.id, "sender may not chat");
            return None;
        }

        if !message.mentions_bot && message.quote.is_none() {
            return None;
        }

        let mut context = message
            .quote
            .as_ref()
            .and_then(|quote| self.deps.replies.get(quote.message_id));

        if !message.mentions_bot && context.is_none() {
            return None;
        }

        if context.is_none() && message.text.is_empty() {
            context = message.quote.as_ref().and_then(|quote| seed_from_quote(&quote.text));
        }

        tracing::debug!(
            sender_id = message.sender.id,
            message_id = message.id,
            resumed_turns = context.as_ref().map_or(0, Vec::len),
            "starting chat"
        );
        Some(self.orchestrator.start_chat(message, context).await)
    }
}

/// A quoted message the bot has no history for becomes the opening user turn.
fn seed_from_quote(text: &str) -> Option<ConversationHistory> {
    let text = text.trim();
    (!text.is_empty()).then(|| vec![ChatMessage::user(text)])
}
