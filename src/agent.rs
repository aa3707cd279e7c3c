//! Chat handling: routing inbound events, gating senders, running completions.

pub mod dispatch;
pub mod gate;
pub mod orchestrator;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::EventDispatcher;
pub use gate::{GateGuard, RequestGate};
pub use orchestrator::{ChatOutcome, CompletionOrchestrator, ReplyShape};
pub use router::EventRouter;

use crate::config::RuntimeConfig;
use crate::conversation::ReplyContextStore;
use crate::formula::FormulaRenderer;
use crate::llm::CompletionService;
use crate::messaging::MessagingManager;
use crate::permissions::PermissionService;

use std::sync::Arc;

/// Shared dependency bundle for chat handling.
///
/// The reply store and request gate are the only state shared between
/// concurrently handled events.
#[derive(Clone)]
pub struct ChatDeps {
    pub completion: Arc<dyn CompletionService>,
    pub renderer: Arc<dyn FormulaRenderer>,
    pub permissions: Arc<dyn PermissionService>,
    pub replies: Arc<ReplyContextStore>,
    pub gate: Arc<RequestGate>,
    pub messaging: Arc<MessagingManager>,
    pub runtime_config: Arc<RuntimeConfig>,
}
