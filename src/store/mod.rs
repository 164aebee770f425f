//! Storage abstraction for knowledge items.
//!
//! The [`KnowledgeStore`] trait is the read/write surface ingestion,
//! retrieval and the HTTP server share, so backends are interchangeable:
//! [`SqliteStore`] for the application, [`InMemoryStore`] for tests and
//! embedding in other hosts.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{KnowledgeItem, KnowledgeSummary, NewKnowledgeItem};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Abstract storage backend for knowledge items.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](KnowledgeStore::insert) | Persist a new item with its optional embedding |
/// | [`list_items`](KnowledgeStore::list_items) | Full items in insertion order (retrieval read path) |
/// | [`list_summaries`](KnowledgeStore::list_summaries) | Lightweight listing, newest first |
/// | [`get`](KnowledgeStore::get) | Fetch one item by id |
/// | [`delete`](KnowledgeStore::delete) | Hard delete by id |
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Insert a new item. The store assigns the id and creation time.
    async fn insert(
        &self,
        new: NewKnowledgeItem,
        embedding: Option<Vec<f32>>,
    ) -> Result<KnowledgeItem>;

    /// All items with their embeddings, oldest first.
    ///
    /// The returned vector is a snapshot: later writes do not affect it.
    async fn list_items(&self) -> Result<Vec<KnowledgeItem>>;

    /// Summaries of all items, newest first.
    async fn list_summaries(&self) -> Result<Vec<KnowledgeSummary>>;

    async fn get(&self, id: &str) -> Result<Option<KnowledgeItem>>;

    /// Remove an item. Returns `false` if no item had that id.
    async fn delete(&self, id: &str) -> Result<bool>;
}
