//! Storage contract shared by every context backend.

use std::time::{SystemTime, UNIX_EPOCH};

use {async_trait::async_trait, serde_json::Value};

use crate::Result;

/// A single stored value with its last-write time.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    pub namespace: String,
    pub key: String,
    pub value: Value,
    /// Milliseconds since the Unix epoch of the last `set`.
    pub updated_at: u64,
}

/// Namespaced key/value storage for conversation state.
///
/// Namespaces are opaque strings; [`crate::ContextScope`] is the only place
/// that builds them. A missing key is `Ok(None)` from `get` and `Ok(false)`
/// from `delete`, never an error. Errors mean the backend itself failed and
/// must reach the caller.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Short backend name used in logs and metric labels.
    fn backend(&self) -> &'static str;

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<ContextEntry>>;

    /// Insert or replace, refreshing `updated_at`.
    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<()>;

    /// Remove a key. Returns whether anything was removed.
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool>;

    /// All entries in a namespace, ordered by key.
    async fn list(&self, namespace: &str) -> Result<Vec<ContextEntry>>;

    /// Every namespace holding at least one entry, sorted.
    async fn namespaces(&self) -> Result<Vec<String>>;

    /// Remove every entry in a namespace. Returns the number removed.
    async fn clear(&self, namespace: &str) -> Result<u64>;
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
