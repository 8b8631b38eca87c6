//! Context Retriever - ranks corpus chunks against a query.
//!
//! Retrieval is a pure read over a corpus snapshot: it never mutates the
//! corpus and never blocks ingestion. The scoring function is a port so
//! keyword overlap can be swapped for embeddings without touching the
//! ranking logic.

use std::sync::Arc;

use crate::application::DomainManager;
use crate::domain::foundation::{DomainError, DomainId};
use crate::domain::knowledge::ContextSnippet;
use crate::ports::RelevanceScorer;

/// Chunks scoring at or below this are never returned.
const MIN_RELEVANCE: f32 = 0.0;

/// Retrieves the top-K most relevant snippets for a query.
pub struct ContextRetriever {
    domains: Arc<DomainManager>,
    scorer: Arc<dyn RelevanceScorer>,
}

impl ContextRetriever {
    pub fn new(domains: Arc<DomainManager>, scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { domains, scorer }
    }

    /// Returns up to `top_k` snippets from `domain_id` ranked by
    /// descending relevance. Ties break toward the most recently
    /// accessed chunk. Zero-relevance chunks are dropped, so fewer than
    /// `top_k` results (or none) is a normal outcome.
    ///
    /// # Errors
    ///
    /// - `DomainNotFound` if the domain is unknown
    pub async fn query(
        &self,
        domain_id: &DomainId,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<ContextSnippet>, DomainError> {
        let corpus = self.domains.corpus(domain_id).await?;
        if top_k == 0 || text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ContextSnippet> = corpus
            .chunks()
            .iter()
            .filter_map(|chunk| {
                let score = self.scorer.score(text, &chunk.content);
                if score > MIN_RELEVANCE {
                    Some(ContextSnippet::new(
                        chunk.id,
                        chunk.title.clone(),
                        chunk.content.clone(),
                        domain_id.clone(),
                        score,
                        chunk.last_accessed,
                    ))
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.last_accessed.as_datetime().cmp(a.last_accessed.as_datetime()))
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Scores by the fraction of query terms present in the chunk.
///
/// Tokenization lowercases and splits on non-alphanumeric boundaries;
/// a chunk containing every query term scores 1.0.
pub struct KeywordScorer;

impl KeywordScorer {
    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect()
    }
}

impl RelevanceScorer for KeywordScorer {
    fn score(&self, query: &str, chunk: &str) -> f32 {
        let query_terms = Self::tokens(query);
        if query_terms.is_empty() {
            return 0.0;
        }
        let chunk_terms = Self::tokens(chunk);
        let hits = query_terms
            .iter()
            .filter(|term| chunk_terms.iter().any(|c| c == *term))
            .count();
        hits as f32 / query_terms.len() as f32
    }
}
