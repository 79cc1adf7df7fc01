//! SQLite-backed context store.
//!
//! One row per `(namespace, key)`; values are stored as JSON text and every
//! upsert refreshes `updated_at` (milliseconds since the Unix epoch).

use std::{str::FromStr, time::Duration};

use {
    async_trait::async_trait,
    serde_json::Value,
    sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    tracing::{debug, info},
};

use crate::{
    Error, Result,
    error::Context as _,
    store::{ContextEntry, ContextStore, now_ms},
};

#[derive(sqlx::FromRow)]
struct EntryRow {
    namespace: String,
    key: String,
    value: String,
    updated_at: i64,
}

impl TryFrom<EntryRow> for ContextEntry {
    type Error = Error;

    fn try_from(r: EntryRow) -> Result<Self> {
        let value = serde_json::from_str(&r.value)
            .map_err(|e| Error::decode(r.namespace.clone(), r.key.clone(), e))?;
        Ok(Self {
            namespace: r.namespace,
            key: r.key,
            value,
            updated_at: r.updated_at.max(0) as u64,
        })
    }
}

/// Run the context table migrations against `pool`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// SQLite-backed [`ContextStore`].
#[derive(Debug, Clone)]
pub struct SqliteContextStore {
    pool: SqlitePool,
}

impl SqliteContextStore {
    /// Wrap an existing pool. The caller is responsible for migrations.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `url` and run migrations.
    ///
    /// `sqlite::memory:` URLs get a single connection that is never reaped:
    /// every connection to an in-memory database sees its own empty
    /// database, and closing the last one discards the data.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid sqlite url `{url}`"))?
            .create_if_missing(true);
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;
        run_migrations(&pool).await?;
        info!(url, "sqlite context store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ContextStore for SqliteContextStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<ContextEntry>> {
        let row = sqlx::query_as::<_, EntryRow>(
            "SELECT namespace, key, value, updated_at FROM context_entries \
             WHERE namespace = ? AND key = ?",
        )
        .bind(namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ContextEntry::try_from).transpose()
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        let encoded = serde_json::to_string(&value)?;
        sqlx::query(
            r#"INSERT INTO context_entries (namespace, key, value, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(namespace, key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at"#,
        )
        .bind(namespace)
        .bind(key)
        .bind(encoded)
        .bind(now_ms() as i64)
        .execute(&self.pool)
        .await?;
        debug!(namespace, key, "context entry written");
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM context_entries WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, namespace: &str) -> Result<Vec<ContextEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            "SELECT namespace, key, value, updated_at FROM context_entries \
             WHERE namespace = ? ORDER BY key",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ContextEntry::try_from).collect()
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT namespace FROM context_entries ORDER BY namespace",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn clear(&self, namespace: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM context_entries WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
