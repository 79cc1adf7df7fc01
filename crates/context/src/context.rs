//! Scope-bound view over a shared [`ContextStore`].

use std::{fmt, sync::Arc};

use {
    serde::{Serialize, de::DeserializeOwned},
    serde_json::Value,
};

#[cfg(feature = "metrics")]
use parley_metrics::{context as ctx_metrics, counter, labels};

use crate::{
    Error, Result,
    scope::ContextScope,
    store::{ContextEntry, ContextStore},
};

/// A live, mutable view of one namespace.
///
/// Cloning is cheap and clones share the underlying store: a write through
/// one facade is visible through every other facade with the same scope.
#[derive(Clone)]
pub struct Context {
    store: Arc<dyn ContextStore>,
    scope: ContextScope,
    namespace: Arc<str>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("namespace", &self.namespace)
            .field("backend", &self.store.backend())
            .finish()
    }
}

impl Context {
    pub fn new(store: Arc<dyn ContextStore>, scope: ContextScope) -> Self {
        let namespace = scope.namespace().into();
        Self {
            store,
            scope,
            namespace,
        }
    }

    pub fn contact(store: Arc<dyn ContextStore>, peer: impl Into<String>) -> Self {
        Self::new(store, ContextScope::contact(peer))
    }

    pub fn thread(
        store: Arc<dyn ContextStore>,
        peer: impl Into<String>,
        thid: impl Into<String>,
    ) -> Self {
        Self::new(store, ContextScope::thread(peer, thid))
    }

    pub fn scope(&self) -> &ContextScope {
        &self.scope
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get_entry(key).await?.map(|entry| entry.value))
    }

    /// Value together with its last-write timestamp.
    pub async fn get_entry(&self, key: &str) -> Result<Option<ContextEntry>> {
        let result = self.store.get(&self.namespace, key).await;
        self.record("get", &result);
        result
    }

    /// Decode a stored value into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| Error::decode(&*self.namespace, key, e)),
            None => Ok(None),
        }
    }

    pub async fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let result = self.store.set(&self.namespace, key, value.into()).await;
        self.record("set", &result);
        result
    }

    /// Serialize `value` and store it.
    pub async fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.set(key, serde_json::to_value(value)?).await
    }

    /// Remove `key`; absent keys are not an error.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let result = self.store.delete(&self.namespace, key).await;
        self.record("delete", &result);
        result
    }

    pub async fn list(&self) -> Result<Vec<ContextEntry>> {
        let result = self.store.list(&self.namespace).await;
        self.record("list", &result);
        result
    }

    pub async fn clear(&self) -> Result<u64> {
        let result = self.store.clear(&self.namespace).await;
        self.record("clear", &result);
        result
    }

    #[cfg(feature = "metrics")]
    fn record<T>(&self, operation: &'static str, result: &Result<T>) {
        let backend = self.store.backend();
        counter!(
            ctx_metrics::OPERATIONS_TOTAL,
            labels::OPERATION => operation,
            labels::BACKEND => backend
        )
        .increment(1);
        if result.is_err() {
            counter!(
                ctx_metrics::ERRORS_TOTAL,
                labels::OPERATION => operation,
                labels::BACKEND => backend
            )
            .increment(1);
        }
    }

    #[cfg(not(feature = "metrics"))]
    fn record<T>(&self, _operation: &'static str, _result: &Result<T>) {}
}
