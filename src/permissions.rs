//! Who may start a chat.

use crate::config::PermissionConfig;
use crate::{ChatKind, InboundMessage, Sender, SenderId};

use arc_swap::ArcSwap;
use std::sync::Arc;

/// The chat capability check of the host's permission system.
pub trait PermissionService: Send + Sync {
    fn has_chat_permission(&self, sender: &Sender) -> bool;
}

/// Capability held by an explicit list of senders, read from config, plus
/// senders granted it for the lifetime of the process.
pub struct AllowList {
    permissions: Arc<ArcSwap<PermissionConfig>>,
    fixed: Vec<SenderId>,
}

impl AllowList {
    pub fn new(permissions: Arc<ArcSwap<PermissionConfig>>) -> Self {
        Self {
            permissions,
            fixed: Vec::new(),
        }
    }

    /// Grant the capability to `sender_id` regardless of config reloads.
    pub fn with_sender(mut self, sender_id: SenderId) -> Self {
        self.fixed.push(sender_id);
        self
    }

    pub fn contains(&self, sender_id: SenderId) -> bool {
        self.fixed.contains(&sender_id)
            || self.permissions.load().allowed_senders.contains(&sender_id)
    }
}

impl PermissionService for AllowList {
    fn has_chat_permission(&self, sender: &Sender) -> bool {
        self.contains(sender.id)
    }
}

/// Capability check plus the configured fallbacks for senders without it.
///
/// Group messages need an operator and the group-operator bypass. Direct
/// messages need the friend bypass. `everyone_has_chat_permission` turns both
/// bypasses on. Temporary sessions are not subject to the fallback.
pub fn may_chat(
    service: &dyn PermissionService,
    config: &PermissionConfig,
    message: &InboundMessage,
) -> bool {
    if service.has_chat_permission(&message.sender) {
        return true;
    }

    match message.chat {
        ChatKind::Group { .. } => {
            message.sender.is_operator
                && (config.group_op_has_chat_permission || config.everyone_has_chat_permission)
        }
        ChatKind::Direct => {
            config.friend_has_chat_permission || config.everyone_has_chat_permission
        }
        ChatKind::Temporary => true,
    }
}
