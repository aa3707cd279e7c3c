//! Console messaging adapter: chat with the bot from a terminal.
//!
//! Every line read from stdin becomes a direct message from the local operator
//! and gets a message id, printed as `[#id]`. A line can quote an earlier
//! message by starting with `>id`:
//!
//! ```text
//! what is $e^{i\pi}$?        plain line, addressed to the bot
//! >4 and why?                quote message 4
//! >4 @bot explain again      quote message 4 and mention the bot
//! >4 please @bot explain     the mention may appear anywhere
//! ```
//!
//! A standalone `@bot` word is removed from the text passed on.

use crate::error::MessagingError;
use crate::messaging::traits::{InboundStream, Messaging};
use crate::{ChatKind, ForwardEntry, InboundMessage, MessageId, OutboundResponse, QuotedMessage, Sender, Speaker};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tokio::sync::mpsc;

/// How many recent messages stay quotable.
const QUOTABLE_MESSAGES: usize = 256;

const MENTION: &str = "@bot";

/// Shared between the adapter and its stdin reader task.
struct ConsoleState {
    operator: Sender,
    next_id: AtomicI64,
    recent: Mutex<VecDeque<(MessageId, String)>>,
}

impl ConsoleState {
    fn allocate_id(&self) -> MessageId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn remember(&self, id: MessageId, text: String) {
        let mut recent = self.recent.lock();
        recent.push_back((id, text));
        if recent.len() > QUOTABLE_MESSAGES {
            recent.pop_front();
        }
    }

    fn text_of(&self, id: MessageId) -> Option<String> {
        self.recent
            .lock()
            .iter()
            .find(|(known, _)| *known == id)
            .map(|(_, text)| text.clone())
    }

    /// Turn one console line into an inbound message.
    fn parse_line(&self, line: &str) -> Option<InboundMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (quote, rest) = match line.strip_prefix('>') {
            Some(quoted) => {
                let digits_end = quoted
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(quoted.len());
                let Ok(quoted_id) = quoted[..digits_end].parse::<MessageId>() else {
                    return Some(self.message(line.to_string(), None, true));
                };
                let quote = QuotedMessage {
                    message_id: quoted_id,
                    text: self.text_of(quoted_id).unwrap_or_default(),
                };
                (Some(quote), quoted[digits_end..].trim())
            }
            None => (None, line),
        };

        let (mentions_bot, text) = match strip_mention(rest) {
            Some(text) => (true, text),
            // Unquoted lines are always addressed to the bot.
            None => (quote.is_none(), rest.to_string()),
        };

        Some(self.message(text, quote, mentions_bot))
    }

    fn message(&self, text: String, quote: Option<QuotedMessage>, mentions_bot: bool) -> InboundMessage {
        let id = self.allocate_id();
        self.remember(id, text.clone());
        InboundMessage {
            id,
            source: ConsoleAdapter::NAME.into(),
            chat: ChatKind::Direct,
            sender: self.operator.clone(),
            text,
            quote,
            mentions_bot,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// The text with every standalone mention word removed, or `None` without one.
fn strip_mention(text: &str) -> Option<String> {
    if !text.split_whitespace().any(|word| word == MENTION) {
        return None;
    }
    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|word| *word != MENTION)
        .collect();
    Some(words.join(" "))
}

/// Console adapter state.
pub struct ConsoleAdapter {
    state: Arc<ConsoleState>,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl ConsoleAdapter {
    pub const NAME: &'static str = "console";

    pub fn new(operator: Sender) -> Self {
        Self {
            state: Arc::new(ConsoleState {
                operator,
                next_id: AtomicI64::new(1),
                recent: Mutex::new(VecDeque::new()),
            }),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Print a line outside of a reply, e.g. command output.
    pub async fn print(&self, text: &str) -> crate::Result<()> {
        write_stdout(&format!("{text}\n")).await
    }
}

async fn write_stdout(text: &str) -> crate::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

/// Plain text of a response, as remembered for later quoting.
fn response_text(response: &OutboundResponse) -> String {
    match response {
        OutboundResponse::Quote { text } => text.clone(),
        OutboundResponse::Forward { entries } => entries
            .iter()
            .map(|entry| entry.content.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn speaker_label(entry: &ForwardEntry) -> &str {
    match &entry.speaker {
        Speaker::Sender { name, .. } => name,
        Speaker::Bot => "bot",
    }
}

fn render(id: MessageId, reply_to: MessageId, response: &OutboundResponse) -> String {
    match response {
        OutboundResponse::Quote { text } => format!("[#{id}] (re #{reply_to}) {text}\n"),
        OutboundResponse::Forward { entries } => {
            let mut out = format!("[#{id}] forwarded transcript (re #{reply_to}):\n");
            for entry in entries {
                out.push_str(&format!("  {}: {}\n", speaker_label(entry), entry.content));
            }
            out
        }
    }
}

impl Messaging for ConsoleAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn start(&self) -> crate::Result<InboundStream> {
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        let state = self.state.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("console reader shutting down");
                        break;
                    }
                    line = lines.next_line() => {
                        let line = match line {
                            Ok(Some(line)) => line,
                            Ok(None) => {
                                tracing::info!("console input closed");
                                break;
                            }
                            Err(error) => {
                                tracing::error!(%error, "failed to read console input");
                                break;
                            }
                        };

                        let Some(message) = state.parse_line(&line) else {
                            continue;
                        };
                        if let Err(error) = write_stdout(&format!("[#{}] sent\n", message.id)).await {
                            tracing::warn!(%error, "failed to echo console message id");
                        }
                        if inbound_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(inbound_rx)))
    }

    async fn respond(
        &self,
        message: &InboundMessage,
        response: OutboundResponse,
    ) -> crate::Result<MessageId> {
        let id = self.state.allocate_id();
        write_stdout(&render(id, message.id, &response)).await?;
        self.state.remember(id, response_text(&response));
        Ok(id)
    }

    async fn health_check(&self) -> crate::Result<()> {
        let running = self
            .shutdown_tx
            .lock()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed());
        if !running {
            return Err(MessagingError::NotStarted(Self::NAME.into()).into());
        }
        Ok(())
    }

    async fn shutdown(&self) -> crate::Result<()> {
        let shutdown_tx = self.shutdown_tx.lock().take();
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(()).await;
        }
        tracing::info!("console adapter shut down");
        Ok(())
    }
}
