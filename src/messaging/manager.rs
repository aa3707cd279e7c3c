//! MessagingManager: Fan-in and routing for all adapters.

use crate::error::{MessagingError, Result};
use crate::messaging::traits::{InboundStream, Messaging, MessagingDyn};
use crate::{InboundMessage, MessageId, OutboundResponse};

use std::collections::HashMap;
use std::sync::Arc;

/// Manages all messaging adapters.
pub struct MessagingManager {
    adapters: HashMap<String, Arc<dyn MessagingDyn>>,
}

impl MessagingManager {
    /// Create a new messaging manager.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register an adapter.
    pub fn register(&mut self, adapter: impl Messaging) {
        self.register_shared(Arc::new(adapter));
    }

    /// Register an adapter the caller keeps a handle to.
    pub fn register_shared(&mut self, adapter: Arc<dyn MessagingDyn>) {
        let name = adapter.name().to_string();
        if self.adapters.insert(name.clone(), adapter).is_some() {
            tracing::warn!(adapter = %name, "messaging adapter replaced");
        }
    }

    pub fn adapter_names(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    /// Start every adapter and merge their inbound streams.
    ///
    /// An adapter that fails to start is logged and skipped.
    pub async fn start(&self) -> Result<InboundStream> {
        let mut streams = Vec::with_capacity(self.adapters.len());
        for (name, adapter) in &self.adapters {
            match adapter.start().await {
                Ok(stream) => {
                    tracing::info!(adapter = %name, "messaging adapter started");
                    streams.push(stream);
                }
                Err(error) => {
                    tracing::error!(adapter = %name, %error, "messaging adapter failed to start");
                }
            }
        }
        Ok(Box::pin(futures::stream::select_all(streams)))
    }

    /// Route a response to the adapter the message came from.
    pub async fn respond(
        &self,
        message: &InboundMessage,
        response: OutboundResponse,
    ) -> Result<MessageId> {
        let adapter = self
            .adapters
            .get(&message.source)
            .ok_or_else(|| MessagingError::UnknownAdapter(message.source.clone()))?;
        adapter.respond(message, response).await
    }

    /// Check every adapter, returning the names of unhealthy ones.
    pub async fn health_check(&self) -> Vec<String> {
        let mut unhealthy = Vec::new();
        for (name, adapter) in &self.adapters {
            if let Err(error) = adapter.health_check().await {
                tracing::warn!(adapter = %name, %error, "messaging adapter unhealthy");
                unhealthy.push(name.clone());
            }
        }
        unhealthy
    }

    pub async fn shutdown(&self) {
        for (name, adapter) in &self.adapters {
            if let Err(error) = adapter.shutdown().await {
                tracing::warn!(adapter = %name, %error, "messaging adapter shutdown failed");
            }
        }
    }
}

impl Default for MessagingManager {
    fn default() -> Self {
        Self::new()
    }
}
