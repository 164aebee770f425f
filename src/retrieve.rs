//! Semantic knowledge retrieval.
//!
//! Embeds a query, scores it against the caller's knowledge items with
//! cosine similarity, drops everything at or below the relevance threshold,
//! and returns the best `top_k` contents for injection into an LLM prompt.
//!
//! # Ranking Algorithm
//!
//! 1. Embed the query (provider failure ⇒ empty result, never an error).
//! 2. Skip items without an embedding, and items whose vector length differs
//!    from the query vector (logged as a dimension mismatch).
//! 3. Score the rest with [`cosine_similarity`].
//! 4. Keep scores strictly above `threshold`.
//! 5. Sort by score (desc); equal scores keep their input order.
//! 6. Truncate to `top_k`.
//!
//! The retriever holds no mutable state and never modifies `items`, so one
//! instance can serve concurrent requests.

use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::RetrievalError;
use crate::models::KnowledgeItem;

/// Header placed above retrieved snippets by [`format_context`].
pub const CONTEXT_HEADER: &str = "[KNOWLEDGE CONTEXT]:";
/// Separator between snippets in a context block.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Maximum number of snippets to return.
    pub top_k: usize,
    /// Exclusive lower bound on cosine similarity.
    pub threshold: f32,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 3,
            threshold: 0.4,
        }
    }
}

impl From<&RetrievalConfig> for RetrievalParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            threshold: config.threshold,
        }
    }
}

/// A ranked hit: the item and its similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredItem<'a> {
    pub item: &'a KnowledgeItem,
    pub score: f32,
}

/// Query-time retriever over caller-supplied knowledge items.
#[derive(Clone)]
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Return the contents of the best-matching items, best first.
    ///
    /// An empty vector means "no relevant knowledge", including when the
    /// embedding provider is unavailable. The only error is an invalid
    /// `threshold`.
    pub async fn retrieve(
        &self,
        query: &str,
        items: &[KnowledgeItem],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<String>, RetrievalError> {
        let hits = self.retrieve_scored(query, items, top_k, threshold).await?;
        Ok(hits.into_iter().map(|h| h.item.content.clone()).collect())
    }

    /// Like [`retrieve`](Self::retrieve), but keeps scores and item references.
    pub async fn retrieve_scored<'a>(
        &self,
        query: &str,
        items: &'a [KnowledgeItem],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredItem<'a>>, RetrievalError> {
        validate_threshold(threshold)?;

        if top_k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        if !items.iter().any(|item| item.embedding.is_some()) {
            tracing::debug!(items = items.len(), "no embedded knowledge to search");
            return Ok(Vec::new());
        }

        let query_vec = match self.provider.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    model = self.provider.model_name(),
                    error = %e,
                    "query embedding unavailable, retrieving no context"
                );
                return Ok(Vec::new());
            }
        };

        let hits = rank(&query_vec, items, top_k, threshold);
        tracing::debug!(
            items = items.len(),
            hits = hits.len(),
            top_k,
            threshold,
            "knowledge retrieval finished"
        );
        Ok(hits)
    }
}

/// Score, filter and order `items` against an already computed query vector.
///
/// Pure and synchronous; this is the whole ranking step of [`Retriever`].
pub fn rank<'a>(
    query_vec: &[f32],
    items: &'a [KnowledgeItem],
    top_k: usize,
    threshold: f32,
) -> Vec<ScoredItem<'a>> {
    let mut hits: Vec<ScoredItem<'a>> = items
        .iter()
        .filter_map(|item| {
            let embedding = item.embedding.as_deref()?;
            if embedding.len() != query_vec.len() {
                tracing::warn!(
                    item_id = %item.id,
                    expected = query_vec.len(),
                    actual = embedding.len(),
                    "embedding dimension mismatch, skipping item"
                );
                return None;
            }
            let score = cosine_similarity(query_vec, embedding);
            (score > threshold).then_some(ScoredItem { item, score })
        })
        .collect();

    // sort_by is stable: ties keep input order
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k);
    hits
}

/// Render retrieved snippets as a context block for prompt injection.
///
/// Returns `None` when there is nothing to inject.
pub fn format_context(snippets: &[String]) -> Option<String> {
    if snippets.is_empty() {
        return None;
    }
    Some(format!(
        "{}\n{}",
        CONTEXT_HEADER,
        snippets.join(CONTEXT_SEPARATOR)
    ))
}

fn validate_threshold(threshold: f32) -> Result<(), RetrievalError> {
    if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(RetrievalError::InvalidThreshold(threshold))
    }
}
