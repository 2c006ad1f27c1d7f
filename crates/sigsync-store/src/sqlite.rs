//! SQLite remote store
//!
//! Keeps the template table in a SQLite database file. Tags are stored as a
//! JSON array and timestamps as RFC 3339 text.

use crate::error::{Result, StoreError, remote_error};
use async_trait::async_trait;
use sigsync::{RemoteError, RemoteStore, TemplateName, TemplateRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

const COLUMNS: &str = "name, content, category, tags, updated_at";

/// SQLite-backed template table
#[derive(Debug, Clone)]
pub struct SqliteTemplateStore {
    pool: SqlitePool,
}

impl SqliteTemplateStore {
    /// Open (and create if missing) the database at `database_url`
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::InvalidUrl(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to SQLite: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create SQLite storage from environment variable
    ///
    /// Expects DATABASE_URL with a SQLite connection string,
    /// e.g. `sqlite:./data/sigsync.db`
    pub async fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:./data/sigsync.db".to_string());

        Self::new(&database_url).await
    }

    /// Wrap an existing pool; the schema is created if needed
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS templates (
                name TEXT PRIMARY KEY NOT NULL,
                content TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'default',
                tags TEXT NOT NULL DEFAULT '[]',   -- JSON array
                updated_at TEXT NOT NULL           -- RFC 3339
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Schema(format!("Failed to create templates table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_templates_category ON templates(category)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Schema(format!("Failed to create category index: {}", e)))?;

        Ok(())
    }

    /// Close the pool, waiting for checked out connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn record_from_row(row: &SqliteRow) -> std::result::Result<TemplateRecord, RemoteError> {
    let name: String = row.try_get("name").map_err(remote_error)?;
    let name = TemplateName::new(name)
        .map_err(|e| RemoteError::Backend(format!("Invalid stored name: {}", e)))?;

    let tags: String = row.try_get("tags").map_err(remote_error)?;
    let tags: Vec<String> = serde_json::from_str(&tags)
        .map_err(|e| RemoteError::Backend(format!("Invalid tags for {}: {}", name, e)))?;

    let updated_at: String = row.try_get("updated_at").map_err(remote_error)?;
    let updated_at = OffsetDateTime::parse(&updated_at, &Rfc3339)
        .map_err(|e| RemoteError::Backend(format!("Invalid timestamp for {}: {}", name, e)))?;

    Ok(TemplateRecord {
        name,
        content: row.try_get("content").map_err(remote_error)?,
        category: row.try_get("category").map_err(remote_error)?,
        tags,
        updated_at,
    })
}

#[async_trait]
impl RemoteStore for SqliteTemplateStore {
    async fn probe(&self) -> std::result::Result<(), RemoteError> {
        sqlx::query("SELECT name FROM templates LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(remote_error)?;
        Ok(())
    }

    async fn fetch(
        &self,
        name: &TemplateName,
    ) -> std::result::Result<Option<TemplateRecord>, RemoteError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM templates WHERE name = ?"))
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(remote_error)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list(&self) -> std::result::Result<Vec<TemplateRecord>, RemoteError> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM templates ORDER BY name"))
            .fetch_all(&self.pool)
            .await
            .map_err(remote_error)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn upsert(
        &self,
        record: &TemplateRecord,
    ) -> std::result::Result<TemplateRecord, RemoteError> {
        let tags = serde_json::to_string(&record.tags)
            .map_err(|e| RemoteError::Backend(format!("Failed to serialize tags: {}", e)))?;
        let updated_at = record
            .updated_at
            .format(&Rfc3339)
            .map_err(|e| RemoteError::Backend(format!("Failed to format timestamp: {}", e)))?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO templates ({COLUMNS})
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                content = excluded.content,
                category = excluded.category,
                tags = excluded.tags,
                updated_at = excluded.updated_at
            RETURNING {COLUMNS}
        "#
        ))
        .bind(record.name.as_str())
        .bind(&record.content)
        .bind(&record.category)
        .bind(tags)
        .bind(updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(remote_error)?;

        debug!("Upserted template {} into SQLite", record.name);
        record_from_row(&row)
    }

    async fn delete(&self, name: &TemplateName) -> std::result::Result<(), RemoteError> {
        sqlx::query("DELETE FROM templates WHERE name = ?")
            .bind(name.as_str())
            .execute(&self.pool)
            .await
            .map_err(remote_error)?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
