//! In-memory [`KnowledgeStore`] implementation for testing and embedding.
//!
//! Items live in a `Vec` behind `std::sync::RwLock`, in insertion order.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{KnowledgeItem, KnowledgeSummary, NewKnowledgeItem};

use super::KnowledgeStore;

/// In-memory store for tests and hosts without a database.
pub struct InMemoryStore {
    items: RwLock<Vec<KnowledgeItem>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    /// Seed the store with pre-built items (kept in the given order).
    pub fn with_items(items: Vec<KnowledgeItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn insert(
        &self,
        new: NewKnowledgeItem,
        embedding: Option<Vec<f32>>,
    ) -> Result<KnowledgeItem> {
        let item = KnowledgeItem {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            content: new.content,
            kind: new.kind,
            created_at: Utc::now(),
            embedding,
        };
        self.items.write().map_err(poisoned)?.push(item.clone());
        Ok(item)
    }

    async fn list_items(&self) -> Result<Vec<KnowledgeItem>> {
        Ok(self.items.read().map_err(poisoned)?.clone())
    }

    async fn list_summaries(&self) -> Result<Vec<KnowledgeSummary>> {
        let items = self.items.read().map_err(poisoned)?;
        // newest first; insertion order breaks timestamp ties
        let mut summaries: Vec<KnowledgeSummary> =
            items.iter().rev().map(KnowledgeSummary::from).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeItem>> {
        let items = self.items.read().map_err(poisoned)?;
        Ok(items.iter().find(|item| item.id == id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut items = self.items.write().map_err(poisoned)?;
        let before = items.len();
        items.retain(|item| item.id != id);
        Ok(items.len() != before)
    }
}
