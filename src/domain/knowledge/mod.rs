//! Knowledge module - domains, corpora, and retrieved context snippets.
//!
//! A `KnowledgeDomain` names a corpus; a `Corpus` is an immutable indexed
//! snapshot of that domain's content. Ingestion builds a whole new corpus
//! and swaps it in atomically, so readers never observe a partial index.

mod chunker;
mod corpus;
mod domain;
mod snippet;

pub use chunker::{chunk_paragraphs, DEFAULT_MAX_CHUNKS};
pub use corpus::{Corpus, CorpusChunk};
pub use domain::KnowledgeDomain;
pub use snippet::ContextSnippet;
