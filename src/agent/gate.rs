//! Per-sender mutual exclusion for in-flight completions.

use crate::SenderId;

use parking_lot::Mutex;
use std::collections::HashSet;

/// Set of senders with a completion in flight.
#[derive(Debug, Default)]
pub struct RequestGate {
    in_flight: Mutex<HashSet<SenderId>>,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `sender_id` busy. Returns false if it already was.
    pub fn try_acquire(&self, sender_id: SenderId) -> bool {
        self.in_flight.lock().insert(sender_id)
    }

    pub fn release(&self, sender_id: SenderId) {
        self.in_flight.lock().remove(&sender_id);
    }

    /// Scoped acquisition: the sender is released when the guard drops.
    pub fn acquire(&self, sender_id: SenderId) -> Option<GateGuard<'_>> {
        self.try_acquire(sender_id).then_some(GateGuard {
            gate: self,
            sender_id,
        })
    }

    pub fn is_held(&self, sender_id: SenderId) -> bool {
        self.in_flight.lock().contains(&sender_id)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}

/// Holds a sender's slot in the gate until dropped.
#[derive(Debug)]
#[must_use = "the sender is released as soon as the guard is dropped"]
pub struct GateGuard<'a> {
    gate: &'a RequestGate,
    sender_id: SenderId,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.release(self.sender_id);
    }
}
