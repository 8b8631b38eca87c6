//! Context snippet produced by retrieval queries.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainId, SnippetId, Timestamp};

/// A retrieved excerpt from a domain's corpus, ranked by relevance.
///
/// Snippets are transient query results; they are not persisted unless a
/// caller explicitly caches them. Relevance scores are comparable within
/// one domain only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub id: SnippetId,
    pub title: String,
    pub content: String,
    pub source_domain: DomainId,
    /// Relevance in [0, 1], higher is better.
    pub relevance_score: f32,
    pub word_count: u32,
    pub last_accessed: Timestamp,
}

impl ContextSnippet {
    /// Creates a snippet, clamping the score into [0, 1].
    pub fn new(
        id: SnippetId,
        title: impl Into<String>,
        content: impl Into<String>,
        source_domain: DomainId,
        relevance_score: f32,
        last_accessed: Timestamp,
    ) -> Self {
        let content = content.into();
        let word_count = content.split_whitespace().count() as u32;
        Self {
            id,
            title: title.into(),
            content,
            source_domain,
            relevance_score: relevance_score.clamp(0.0, 1.0),
            word_count,
            last_accessed,
        }
    }
}
