//! Runs one completion for one inbound message and sends the reply.

use crate::agent::ChatDeps;
use crate::conversation::{ChatMessage, ConversationHistory, Role};
use crate::error::{LlmError, Result};
use crate::formula;
use crate::llm::CompletionRequest;
use crate::{ForwardEntry, InboundMessage, MessageId, OutboundResponse, Speaker};

/// Replies shorter than this many characters are sent inline; longer ones as a transcript.
pub const INLINE_REPLY_MAX_CHARS: usize = 100;

/// Sent to a sender who already has a completion in flight.
pub const BUSY_NOTICE: &str = "Please wait, still working on your last message...";

/// Sent when a completion could not be produced.
pub const FAILURE_NOTICE: &str = "An error occurred, please retry.";

/// How a reply was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// Quoted reply to the triggering message.
    Inline,
    /// Forwarded transcript of the whole conversation.
    Transcript,
}

/// Result of one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    Replied {
        message_id: MessageId,
        shape: ReplyShape,
    },
    /// The sender already had a completion in flight.
    Busy,
    /// The failure notice was sent (or attempted) instead of a reply.
    Failed,
}

/// Threads completions through the reply store and the request gate.
pub struct CompletionOrchestrator {
    deps: ChatDeps,
}

impl CompletionOrchestrator {
    pub fn new(deps: ChatDeps) -> Self {
        Self { deps }
    }

    /// Answer `message`, continuing `context` when one was recovered.
    ///
    /// Never fails: errors are logged and reported to the sender. The sender's
    /// gate slot is held for the whole run and released on every path.
    pub async fn start_chat(
        &self,
        message: &InboundMessage,
        context: Option<ConversationHistory>,
    ) -> ChatOutcome {
        let sender_id = message.sender.id;

        let Some(_guard) = self.deps.gate.acquire(sender_id) else {
            tracing::trace!(sender_id, "sender already has a completion in flight");
            self.notify(message, BUSY_NOTICE).await;
            return ChatOutcome::Busy;
        };

        match self.run(message, context).await {
            Ok((message_id, shape)) => ChatOutcome::Replied { message_id, shape },
            Err(error) => {
                tracing::warn!(sender_id, message_id = message.id, %error, "chat completion failed");
                self.notify(message, FAILURE_NOTICE).await;
                ChatOutcome::Failed
            }
        }
    }

    async fn run(
        &self,
        message: &InboundMessage,
        context: Option<ConversationHistory>,
    ) -> Result<(MessageId, ReplyShape)> {
        let settings = self.deps.runtime_config.chat.load_full();

        let mut history = base_history(context, &settings.system_prompt);
        if !message.text.is_empty() {
            let text = formula::preprocess(&message.text, self.deps.renderer.as_ref()).await?;
            history.push(ChatMessage::user(text));
        }

        let response = self
            .deps
            .completion
            .complete(CompletionRequest {
                model: settings.chat_model.clone(),
                messages: history.clone(),
            })
            .await?;

        if let Some(usage) = response.usage {
            tracing::info!(model = %settings.chat_model, %usage, "completion usage");
        }

        let reply = response.first_choice().ok_or(LlmError::EmptyResponse)?;
        history.push(ChatMessage::assistant(reply.content.clone()));

        let (response, shape) = render_reply(message, &history);
        let message_id = self.deps.messaging.respond(message, response).await?;

        self.deps.replies.put(message_id, history);
        tracing::debug!(
            sender_id = message.sender.id,
            reply_id = message_id,
            ?shape,
            "reply sent"
        );

        Ok((message_id, shape))
    }

    async fn notify(&self, message: &InboundMessage, text: &str) {
        let response = OutboundResponse::Quote { text: text.into() };
        if let Err(error) = self.deps.messaging.respond(message, response).await {
            tracing::warn!(message_id = message.id, %error, "failed to send notice");
        }
    }
}

/// Prior history when there is one, else the system prompt, else nothing.
fn base_history(context: Option<ConversationHistory>, system_prompt: &str) -> ConversationHistory {
    match context {
        Some(history) if !history.is_empty() => history,
        _ if !system_prompt.is_empty() => vec![ChatMessage::system(system_prompt)],
        _ => Vec::new(),
    }
}

/// Short replies quote the trigger; long ones forward the whole conversation.
fn render_reply(message: &InboundMessage, history: &[ChatMessage]) -> (OutboundResponse, ReplyShape) {
    let content = history
        .last()
        .map(ChatMessage::display_content)
        .unwrap_or(crate::conversation::history::EMPTY_CONTENT_PLACEHOLDER);

    if content.chars().count() < INLINE_REPLY_MAX_CHARS {
        let response = OutboundResponse::Quote {
            text: content.to_string(),
        };
        return (response, ReplyShape::Inline);
    }

    let entries = history
        .iter()
        .filter_map(|turn| {
            let speaker = match turn.role {
                Role::User => Speaker::Sender {
                    id: message.sender.id,
                    name: message.sender.name.clone(),
                },
                Role::Assistant => Speaker::Bot,
                Role::System => return None,
            };
            Some(ForwardEntry {
                speaker,
                content: turn.display_content().to_string(),
            })
        })
        .collect();

    (OutboundResponse::Forward { entries }, ReplyShape::Transcript)
}
