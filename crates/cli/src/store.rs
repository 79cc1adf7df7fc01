use std::sync::Arc;

use {
    parley_config::{ContextBackend, ContextConfig},
    parley_context::{ContextStore, InMemoryContextStore, SqliteContextStore},
    tracing::info,
};

/// Open the context store selected by config.
pub async fn open_store(config: &ContextConfig) -> anyhow::Result<Arc<dyn ContextStore>> {
    match config.backend {
        ContextBackend::Memory => {
            info!(backend = "memory", "context store opened");
            Ok(Arc::new(InMemoryContextStore::new()))
        },
        ContextBackend::Sqlite => {
            let url = config
                .database_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .ok_or_else(|| anyhow::anyhow!("context.database_url is required for sqlite"))?;
            let store = SqliteContextStore::connect(url).await?;
            info!(backend = "sqlite", url, "context store opened");
            Ok(Arc::new(store))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_requires_url() {
        let config = ContextConfig {
            backend: ContextBackend::Sqlite,
            database_url: None,
        };
        assert!(open_store(&config).await.is_err());
    }

    #[tokio::test]
    async fn opens_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ctx.db").display());
        let config = ContextConfig {
            backend: ContextBackend::Sqlite,
            database_url: Some(url),
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.backend(), "sqlite");
    }
}
