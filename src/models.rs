//! Core data models used throughout Knowledge Forge.
//!
//! These types represent the knowledge snippets that flow from ingestion
//! into the store and out again through retrieval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a knowledge item came from. Informational only; retrieval ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeKind {
    /// Manually authored note.
    #[default]
    Note,
    /// Text extracted from an ingested file.
    Document,
}

impl KnowledgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeKind::Note => "note",
            KnowledgeKind::Document => "document",
        }
    }
}

impl fmt::Display for KnowledgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnowledgeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "note" => Ok(KnowledgeKind::Note),
            "document" => Ok(KnowledgeKind::Document),
            other => anyhow::bail!("unknown knowledge kind: '{}'", other),
        }
    }
}

/// A stored knowledge snippet.
///
/// `title`, `content` and `embedding` never change after creation; new
/// content means a new item.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeItem {
    pub id: String,
    pub title: String,
    pub content: String,
    pub kind: KnowledgeKind,
    pub created_at: DateTime<Utc>,
    /// `None` when the embedding call failed or was never attempted.
    /// Such items are invisible to retrieval.
    pub embedding: Option<Vec<f32>>,
}

/// Input to ingestion, before an id, timestamp and embedding are attached.
#[derive(Debug, Clone, Deserialize)]
pub struct NewKnowledgeItem {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub kind: KnowledgeKind,
}

/// Listing projection: no body, no vector.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeSummary {
    pub id: String,
    pub title: String,
    pub kind: KnowledgeKind,
    pub created_at: DateTime<Utc>,
    pub embedded: bool,
}

impl From<&KnowledgeItem> for KnowledgeSummary {
    fn from(item: &KnowledgeItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            kind: item.kind,
            created_at: item.created_at,
            embedded: item.embedding.is_some(),
        }
    }
}
