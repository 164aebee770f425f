//! SQLite-backed [`KnowledgeStore`].
//!
//! Embeddings are stored as little-endian `f32` BLOBs (see
//! [`vec_to_blob`](crate::embedding::vec_to_blob)) and materialized back into
//! `Vec<f32>` on read. Timestamps are Unix seconds; `rowid` breaks ties so
//! listing order is deterministic.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::migrate;
use crate::models::{KnowledgeItem, KnowledgeKind, KnowledgeSummary, NewKnowledgeItem};

use super::KnowledgeStore;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect using `[db].path` and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn from_timestamp(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

/// Decode a stored embedding. Corrupt BLOBs read as "no embedding".
fn materialize_embedding(id: &str, blob: Option<Vec<u8>>) -> Option<Vec<f32>> {
    let blob = blob?;
    if blob.is_empty() || blob.len() % 4 != 0 {
        tracing::warn!(
            item_id = %id,
            bytes = blob.len(),
            "ignoring corrupt embedding blob"
        );
        return None;
    }
    Some(blob_to_vec(&blob))
}

fn row_to_item(row: &SqliteRow) -> Result<KnowledgeItem> {
    let id: String = row.get("id");
    let kind: String = row.get("kind");
    let created_at: i64 = row.get("created_at");
    let blob: Option<Vec<u8>> = row.get("embedding");
    let embedding = materialize_embedding(&id, blob);

    Ok(KnowledgeItem {
        kind: kind
            .parse::<KnowledgeKind>()
            .with_context(|| format!("invalid kind for knowledge item {}", id))?,
        title: row.get("title"),
        content: row.get("content"),
        created_at: from_timestamp(created_at),
        embedding,
        id,
    })
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn insert(
        &self,
        new: NewKnowledgeItem,
        embedding: Option<Vec<f32>>,
    ) -> Result<KnowledgeItem> {
        let id = Uuid::new_v4().to_string();
        let created_at = from_timestamp(Utc::now().timestamp());
        let blob = embedding.as_deref().map(vec_to_blob);

        sqlx::query(
            "INSERT INTO knowledge (id, title, content, kind, created_at, embedding) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.title)
        .bind(&new.content)
        .bind(new.kind.as_str())
        .bind(created_at.timestamp())
        .bind(blob)
        .execute(&self.pool)
        .await?;

        Ok(KnowledgeItem {
            id,
            title: new.title,
            content: new.content,
            kind: new.kind,
            created_at,
            embedding,
        })
    }

    async fn list_items(&self) -> Result<Vec<KnowledgeItem>> {
        let rows = sqlx::query(
            "SELECT id, title, content, kind, created_at, embedding FROM knowledge ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_item).collect()
    }

    async fn list_summaries(&self) -> Result<Vec<KnowledgeSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, kind, created_at, embedding IS NOT NULL AS embedded
            FROM knowledge
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let kind: String = row.get("kind");
                let created_at: i64 = row.get("created_at");
                let embedded: i64 = row.get("embedded");
                Ok(KnowledgeSummary {
                    id: row.get("id"),
                    title: row.get("title"),
                    kind: kind.parse()?,
                    created_at: from_timestamp(created_at),
                    embedded: embedded != 0,
                })
            })
            .collect()
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeItem>> {
        let row = sqlx::query(
            "SELECT id, title, content, kind, created_at, embedding FROM knowledge WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_item).transpose()
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM knowledge WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
