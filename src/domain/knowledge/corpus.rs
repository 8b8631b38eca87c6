//! Immutable corpus snapshot for a knowledge domain.

use crate::domain::foundation::{DomainId, SnippetId, Timestamp};

/// One indexed chunk within a corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusChunk {
    pub id: SnippetId,
    pub title: String,
    pub content: String,
    /// Set at ingestion (or by an explicit cache touch); queries never
    /// mutate it. Used only as a ranking tie-breaker.
    pub last_accessed: Timestamp,
}

/// An immutable indexed snapshot of one domain's content.
///
/// Built whole during ingestion and swapped in atomically; queries hold a
/// reference to a snapshot, so a concurrent re-ingestion is never
/// partially visible.
#[derive(Debug, Clone)]
pub struct Corpus {
    domain_id: DomainId,
    chunks: Vec<CorpusChunk>,
}

impl Corpus {
    /// Creates a corpus from pre-chunked content.
    ///
    /// Chunk titles are derived from the first few words of each chunk
    /// when no explicit title is supplied.
    pub fn from_chunks(domain_id: DomainId, chunks: Vec<String>) -> Self {
        let now = Timestamp::now();
        let chunks = chunks
            .into_iter()
            .map(|content| CorpusChunk {
                id: SnippetId::new(),
                title: derive_title(&content),
                content,
                last_accessed: now,
            })
            .collect();
        Self { domain_id, chunks }
    }

    /// Creates an empty corpus (built-in domains before any ingestion).
    pub fn empty(domain_id: DomainId) -> Self {
        Self {
            domain_id,
            chunks: Vec::new(),
        }
    }

    /// Returns the owning domain.
    pub fn domain_id(&self) -> &DomainId {
        &self.domain_id
    }

    /// Returns all indexed chunks.
    pub fn chunks(&self) -> &[CorpusChunk] {
        &self.chunks
    }

    /// Returns the number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

fn derive_title(content: &str) -> String {
    const TITLE_WORDS: usize = 6;
    let mut words: Vec<&str> = content.split_whitespace().take(TITLE_WORDS + 1).collect();
    let truncated = words.len() > TITLE_WORDS;
    words.truncate(TITLE_WORDS);
    let mut title = words.join(" ");
    if truncated {
        title.push('…');
    }
    title
}
