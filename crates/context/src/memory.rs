//! Process-local context store.

use std::collections::{BTreeMap, HashMap};

use {async_trait::async_trait, serde_json::Value, tokio::sync::RwLock};

use crate::{
    Result,
    store::{ContextEntry, ContextStore, now_ms},
};

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    updated_at: u64,
}

/// In-memory [`ContextStore`]. State is lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    data: RwLock<HashMap<String, BTreeMap<String, Slot>>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn entry(namespace: &str, key: &str, slot: &Slot) -> ContextEntry {
    ContextEntry {
        namespace: namespace.to_string(),
        key: key.to_string(),
        value: slot.value.clone(),
        updated_at: slot.updated_at,
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<ContextEntry>> {
        let data = self.data.read().await;
        Ok(data
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .map(|slot| entry(namespace, key, slot)))
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        let slot = Slot {
            value,
            updated_at: now_ms(),
        };
        self.data
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), slot);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let mut data = self.data.write().await;
        let Some(entries) = data.get_mut(namespace) else {
            return Ok(false);
        };
        let removed = entries.remove(key).is_some();
        if entries.is_empty() {
            data.remove(namespace);
        }
        Ok(removed)
    }

    async fn list(&self, namespace: &str) -> Result<Vec<ContextEntry>> {
        let data = self.data.read().await;
        Ok(data
            .get(namespace)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(key, slot)| entry(namespace, key, slot))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.data.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn clear(&self, namespace: &str) -> Result<u64> {
        Ok(self
            .data
            .write()
            .await
            .remove(namespace)
            .map(|entries| entries.len() as u64)
            .unwrap_or(0))
    }
}
