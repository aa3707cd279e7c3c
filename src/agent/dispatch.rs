//! Fans inbound messages out to one task each and tracks them until they finish.

use crate::InboundMessage;
use crate::agent::EventRouter;
use crate::commands::{AdminCommand, CommandContext};
use crate::messaging::{ConsoleAdapter, InboundStream};

use futures::StreamExt as _;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Operator commands and the console their output goes to.
struct CommandSink {
    context: Arc<CommandContext>,
    console: Arc<ConsoleAdapter>,
}

/// Owns every in-flight message task.
pub struct EventDispatcher {
    router: Arc<EventRouter>,
    commands: Option<CommandSink>,
    tasks: JoinSet<()>,
}

impl EventDispatcher {
    pub fn new(router: Arc<EventRouter>) -> Self {
        Self {
            router,
            commands: None,
            tasks: JoinSet::new(),
        }
    }

    /// Take `/` commands from the console operator instead of routing them.
    pub fn with_commands(mut self, context: Arc<CommandContext>, console: Arc<ConsoleAdapter>) -> Self {
        self.commands = Some(CommandSink { context, console });
        self
    }

    /// Number of tasks spawned and not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Dispatch every message of `inbound` until the stream ends.
    ///
    /// Returns without waiting for the spawned tasks; call [`Self::drain`] for that.
    pub async fn run(&mut self, mut inbound: InboundStream) {
        while let Some(message) = inbound.next().await {
            self.dispatch(message);
        }
    }

    /// Handle one message on its own task.
    pub fn dispatch(&mut self, message: InboundMessage) {
        self.reap_finished();

        if let Some(sink) = &self.commands
            && let Some(command) = operator_command(&message)
        {
            let context = sink.context.clone();
            let console = sink.console.clone();
            self.tasks.spawn(async move {
                let output = match context.execute(command).await {
                    Ok(output) => output,
                    Err(error) => {
                        tracing::warn!(%error, "command failed");
                        format!("command failed: {error}")
                    }
                };
                if let Err(error) = console.print(&output).await {
                    tracing::warn!(%error, "failed to print command output");
                }
            });
            return;
        }

        let router = self.router.clone();
        self.tasks.spawn(async move {
            if let Some(outcome) = router.handle(&message).await {
                tracing::debug!(message_id = message.id, ?outcome, "message handled");
            }
        });
    }

    /// Wait for every spawned task to finish.
    pub async fn drain(&mut self) {
        if !self.tasks.is_empty() {
            tracing::info!(in_flight = self.tasks.len(), "waiting for in-flight messages");
        }
        while let Some(result) = self.tasks.join_next().await {
            if let Err(error) = result {
                tracing::warn!(%error, "message task failed");
            }
        }
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(error) = result {
                tracing::warn!(%error, "message task failed");
            }
        }
    }
}

/// Commands are only taken from the operator on the local console.
fn operator_command(message: &InboundMessage) -> Option<AdminCommand> {
    if message.source != ConsoleAdapter::NAME || !message.sender.is_operator {
        return None;
    }
    AdminCommand::parse(&message.text)
}
