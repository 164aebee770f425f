//! Knowledge ingestion.
//!
//! Turns a note or a file into a stored [`KnowledgeItem`]. The embedding is
//! computed once here, from a bounded prefix of the content; if the provider
//! fails the item is still stored, just without a vector, and stays
//! invisible to retrieval.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::EmbeddingConfig;
use crate::embedding::EmbeddingProvider;
use crate::extract;
use crate::models::{KnowledgeItem, KnowledgeKind, NewKnowledgeItem};
use crate::store::KnowledgeStore;

/// How much of an item's content is sent to the embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestPolicy {
    pub max_input_chars: usize,
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self {
            max_input_chars: 2000,
        }
    }
}

impl From<&EmbeddingConfig> for IngestPolicy {
    fn from(config: &EmbeddingConfig) -> Self {
        Self {
            max_input_chars: config.max_input_chars,
        }
    }
}

/// The first `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Validate, embed and store one knowledge item.
pub async fn add_knowledge<S>(
    store: &S,
    provider: &dyn EmbeddingProvider,
    policy: &IngestPolicy,
    new: NewKnowledgeItem,
) -> Result<KnowledgeItem>
where
    S: KnowledgeStore + ?Sized,
{
    if new.title.trim().is_empty() {
        bail!("title must not be empty");
    }
    if new.content.trim().is_empty() {
        bail!("content must not be empty");
    }

    let input = truncate_chars(&new.content, policy.max_input_chars);
    let embedding = match provider.embed(input).await {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(
                title = %new.title,
                model = provider.model_name(),
                error = %e,
                "storing knowledge without embedding"
            );
            None
        }
    };

    let item = store.insert(new, embedding).await?;
    tracing::info!(
        id = %item.id,
        title = %item.title,
        kind = %item.kind,
        embedded = item.embedding.is_some(),
        "knowledge stored"
    );
    Ok(item)
}

/// Extract text from a file and store it as a [`KnowledgeKind::Document`].
///
/// The file name becomes the title.
pub async fn ingest_file<S>(
    store: &S,
    provider: &dyn EmbeddingProvider,
    policy: &IngestPolicy,
    path: &Path,
) -> Result<KnowledgeItem>
where
    S: KnowledgeStore + ?Sized,
{
    let content_type = extract::content_type_for_path(path).with_context(|| {
        format!(
            "unsupported file type: {} (use PDF or a text format)",
            path.display()
        )
    })?;

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let text = extract::extract_document(&bytes, content_type)
        .with_context(|| format!("Failed to extract text from {}", path.display()))?;

    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    add_knowledge(
        store,
        provider,
        policy,
        NewKnowledgeItem {
            title,
            content: text,
            kind: KnowledgeKind::Document,
        },
    )
    .await
}
