//! Single-use, per-peer handler continuations.
//!
//! Engaging a continuation for `(peer, type)` means "the next message of this
//! type from this peer goes to this handler instead of the standing routes".
//! A multi-step conversation is a chain of handlers, each engaging the next.

use std::{collections::HashMap, sync::Mutex};

use tracing::debug;

use crate::key::PeerKey;

#[derive(Debug, Default)]
pub struct NamedHandlerRegistry {
    entries: Mutex<HashMap<PeerKey, String>>,
}

impl NamedHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or replace the continuation for `(peer, msg_type)`.
    /// Returns the handler name it replaced, if any.
    pub fn register(
        &self,
        peer: &str,
        msg_type: &str,
        handler_name: impl Into<String>,
    ) -> Option<String> {
        let key = PeerKey::new(peer, msg_type);
        let handler_name = handler_name.into();
        debug!(key = %key, handler = %handler_name, "continuation engaged");
        self.lock().insert(key, handler_name)
    }

    /// Look up and remove the continuation in one critical section, so two
    /// concurrent messages can never both observe it.
    pub fn resolve_and_consume(&self, peer: &str, msg_type: &str) -> Option<String> {
        self.lock().remove(&PeerKey::new(peer, msg_type))
    }

    pub fn peek(&self, peer: &str, msg_type: &str) -> Option<String> {
        self.lock().get(&PeerKey::new(peer, msg_type)).cloned()
    }

    pub fn remove(&self, peer: &str, msg_type: &str) -> bool {
        self.resolve_and_consume(peer, msg_type).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PeerKey, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
