//! Relevance Scorer Port - pluggable snippet ranking.

/// Scores a corpus chunk against a query.
///
/// Scores must land in [0, 1] and are comparable within one domain only;
/// implementations may use keyword overlap, embeddings, or anything else.
pub trait RelevanceScorer: Send + Sync {
    /// Returns the relevance of `chunk` to `query`, in [0, 1].
    fn score(&self, query: &str, chunk: &str) -> f32;
}
