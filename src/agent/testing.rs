//! Stub collaborators shared by the chat handling tests.

use crate::agent::{ChatDeps, CompletionOrchestrator, EventRouter, RequestGate};
use crate::config::{ChatSettings, Config, RuntimeConfig};
use crate::conversation::{ChatMessage, ReplyContextStore};
use crate::error::{LlmError, MessagingError, RenderError, Result};
use crate::formula::FormulaRenderer;
use crate::llm::{CompletionRequest, CompletionResponse, CompletionService, Usage};
use crate::messaging::traits::{InboundStream, Messaging};
use crate::messaging::MessagingManager;
use crate::permissions::PermissionService;
use crate::{ChatKind, InboundMessage, MessageId, OutboundResponse, Sender};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

pub(crate) const TEST_SENDER_ID: i64 = 10;

/// A direct message from the test sender, addressed to the bot.
pub(crate) fn inbound(text: &str) -> InboundMessage {
    InboundMessage {
        id: 1,
        source: RecordingAdapter::NAME.into(),
        chat: ChatKind::Direct,
        sender: Sender {
            id: TEST_SENDER_ID,
            name: "alice".into(),
            is_operator: false,
        },
        text: text.into(),
        quote: None,
        mentions_bot: true,
        timestamp: chrono::Utc::now(),
    }
}

type Scripted = std::result::Result<(Vec<ChatMessage>, Option<Usage>), String>;

/// Completion service answering with a scripted result.
pub(crate) struct StubCompletion {
    available: AtomicBool,
    script: Mutex<Scripted>,
    requests: Mutex<Vec<CompletionRequest>>,
    hold: Mutex<Option<Arc<Notify>>>,
    delay: Mutex<Option<Duration>>,
}

impl StubCompletion {
    fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            script: Mutex::new(Err("no reply scripted".into())),
            requests: Mutex::new(Vec::new()),
            hold: Mutex::new(None),
            delay: Mutex::new(None),
        }
    }

    pub(crate) fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub(crate) fn reply_with(&self, text: &str) {
        self.respond_with(vec![ChatMessage::assistant(text)], None);
    }

    pub(crate) fn respond_with(&self, choices: Vec<ChatMessage>, usage: Option<Usage>) {
        *self.script.lock() = Ok((choices, usage));
    }

    pub(crate) fn fail_with(&self, message: &str) {
        *self.script.lock() = Err(message.into());
    }

    /// Make every completion wait until the returned notify fires.
    pub(crate) fn hold(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock() = Some(notify.clone());
        notify
    }

    /// Make every completion take at least `delay`.
    pub(crate) fn delay_by(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub(crate) async fn wait_for_requests(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.requests.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("completion requests should arrive");
    }
}

#[async_trait::async_trait]
impl CompletionService for StubCompletion {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().push(request);

        let hold = self.hold.lock().clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let script = self.script.lock().clone();
        match script {
            Ok((choices, usage)) => Ok(CompletionResponse { choices, usage }),
            Err(message) => Err(LlmError::ProviderRequest(message).into()),
        }
    }
}

/// Renderer with a fixed formula → URL table. Unknown formulas fail.
#[derive(Default)]
pub(crate) struct StubRenderer {
    urls: Mutex<HashMap<String, String>>,
}

impl StubRenderer {
    pub(crate) fn map(&self, formula: &str, url: &str) {
        self.urls.lock().insert(formula.into(), url.into());
    }
}

#[async_trait::async_trait]
impl FormulaRenderer for StubRenderer {
    async fn render(&self, formula: &str) -> Result<String> {
        let url = self.urls.lock().get(formula).cloned();
        url.ok_or_else(|| {
            RenderError::Status {
                status: 500,
                formula: formula.into(),
            }
            .into()
        })
    }
}

pub(crate) struct StubPermissions {
    allowed: AtomicBool,
}

impl StubPermissions {
    pub(crate) fn set_allowed(&self, allowed: bool) {
        self.allowed.store(allowed, Ordering::SeqCst);
    }
}

impl PermissionService for StubPermissions {
    fn has_chat_permission(&self, _sender: &Sender) -> bool {
        self.allowed.load(Ordering::SeqCst)
    }
}

/// Records every response as `(reply_to, response)` and hands out ids from 1000.
pub(crate) struct RecordingAdapter {
    next_id: AtomicI64,
    sent: Mutex<Vec<(MessageId, OutboundResponse)>>,
    fail_next: AtomicBool,
}

impl RecordingAdapter {
    pub(crate) const NAME: &'static str = "test";

    pub(crate) fn sent(&self) -> Vec<(MessageId, OutboundResponse)> {
        self.sent.lock().clone()
    }

    pub(crate) fn fail_next_send(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl Messaging for RecordingAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn start(&self) -> Result<InboundStream> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn respond(&self, message: &InboundMessage, response: OutboundResponse) -> Result<MessageId> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(MessagingError::SendFailed {
                adapter: Self::NAME.into(),
                message: "connection reset".into(),
            }
            .into());
        }
        self.sent.lock().push((message.id, response));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

/// Chat dependencies wired to stubs, with handles to each stub.
pub(crate) struct Harness {
    pub(crate) deps: ChatDeps,
    pub(crate) completion: Arc<StubCompletion>,
    pub(crate) renderer: Arc<StubRenderer>,
    pub(crate) permissions: Arc<StubPermissions>,
    pub(crate) adapter: Arc<RecordingAdapter>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let completion = Arc::new(StubCompletion::new());
        let renderer = Arc::new(StubRenderer::default());
        let permissions = Arc::new(StubPermissions {
            allowed: AtomicBool::new(true),
        });
        let adapter = Arc::new(RecordingAdapter {
            next_id: AtomicI64::new(1000),
            sent: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        });

        let mut messaging = MessagingManager::new();
        messaging.register_shared(adapter.clone());

        let mut config = Config::default();
        config.llm.chat_model = "test-model".into();

        let deps = ChatDeps {
            completion: completion.clone(),
            renderer: renderer.clone(),
            permissions: permissions.clone(),
            replies: Arc::new(ReplyContextStore::default()),
            gate: Arc::new(RequestGate::new()),
            messaging: Arc::new(messaging),
            runtime_config: Arc::new(RuntimeConfig::new(&config)),
        };

        Self {
            deps,
            completion,
            renderer,
            permissions,
            adapter,
        }
    }

    pub(crate) fn set_system_prompt(&self, prompt: &str) {
        let current = self.deps.runtime_config.chat.load_full();
        self.deps.runtime_config.chat.store(Arc::new(ChatSettings {
            chat_model: current.chat_model.clone(),
            system_prompt: prompt.into(),
        }));
    }

    pub(crate) fn orchestrator(&self) -> CompletionOrchestrator {
        CompletionOrchestrator::new(self.deps.clone())
    }

    pub(crate) fn router(&self) -> EventRouter {
        EventRouter::new(self.deps.clone())
    }
}
