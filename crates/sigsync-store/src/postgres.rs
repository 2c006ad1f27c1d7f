//! PostgreSQL remote store
//!
//! Uses a native `TEXT[]` column for tags and `TIMESTAMPTZ` for the update
//! time.

use crate::error::{Result, StoreError, remote_error};
use async_trait::async_trait;
use sigsync::{RemoteError, RemoteStore, TemplateName, TemplateRecord};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Executor, PgPool, Row};
use std::time::Duration;
use tracing::debug;

/// PostgreSQL-backed template table
#[derive(Debug, Clone)]
pub struct PostgresTemplateStore {
    pool: PgPool,
}

impl PostgresTemplateStore {
    /// Wrap an existing pool; call [`migrate`](Self::migrate) before use
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and make sure the schema exists
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to PostgreSQL: {}", e)))?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Create the templates table if it does not exist
    pub async fn migrate(&self) -> Result<()> {
        self.pool
            .execute(Self::SCHEMA_SQL)
            .await
            .map_err(|e| StoreError::Schema(e.to_string()))?;
        Ok(())
    }

    const SCHEMA_SQL: &'static str = r#"
        CREATE TABLE IF NOT EXISTS templates (
            name TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'default',
            tags TEXT[] NOT NULL DEFAULT '{}',
            updated_at TIMESTAMPTZ NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_templates_category ON templates(category);
    "#;
}

fn record_from_row(row: &PgRow) -> std::result::Result<TemplateRecord, RemoteError> {
    let name: String = row.try_get("name").map_err(remote_error)?;
    let name = TemplateName::new(name)
        .map_err(|e| RemoteError::Backend(format!("Invalid stored name: {}", e)))?;

    Ok(TemplateRecord {
        name,
        content: row.try_get("content").map_err(remote_error)?,
        category: row.try_get("category").map_err(remote_error)?,
        tags: row.try_get("tags").map_err(remote_error)?,
        updated_at: row.try_get("updated_at").map_err(remote_error)?,
    })
}

#[async_trait]
impl RemoteStore for PostgresTemplateStore {
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
        let row = sqlx::query(
            "SELECT name, content, category, tags, updated_at FROM templates WHERE name = $1",
        )
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(remote_error)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list(&self) -> std::result::Result<Vec<TemplateRecord>, RemoteError> {
        let rows = sqlx::query(
            "SELECT name, content, category, tags, updated_at FROM templates ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(remote_error)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn upsert(
        &self,
        record: &TemplateRecord,
    ) -> std::result::Result<TemplateRecord, RemoteError> {
        let row = sqlx::query(
            r#"
            INSERT INTO templates (name, content, category, tags, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE SET
                content = EXCLUDED.content,
                category = EXCLUDED.category,
                tags = EXCLUDED.tags,
                updated_at = EXCLUDED.updated_at
            RETURNING name, content, category, tags, updated_at
            "#,
        )
        .bind(record.name.as_str())
        .bind(&record.content)
        .bind(&record.category)
        .bind(&record.tags)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(remote_error)?;

        debug!("Upserted template {} into PostgreSQL", record.name);
        record_from_row(&row)
    }

    async fn delete(&self, name: &TemplateName) -> std::result::Result<(), RemoteError> {
        sqlx::query("DELETE FROM templates WHERE name = $1")
            .bind(name.as_str())
            .execute(&self.pool)
            .await
            .map_err(remote_error)?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
