//! Paragraph chunking for custom-domain ingestion.

/// Default ceiling on chunks per ingestion, bounding index memory.
pub const DEFAULT_MAX_CHUNKS: usize = 512;

/// Splits source text into paragraph chunks.
///
/// Paragraph boundaries are blank lines. Empty or whitespace-only chunks
/// are discarded, and the result is capped at `max_chunks`.
pub fn chunk_paragraphs(text: &str, max_chunks: usize) -> Vec<String> {
    text.split("\n\n")
        .flat_map(|block| block.split("\r\n\r\n"))
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .take(max_chunks)
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_blank_lines() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird.";
        let chunks = chunk_paragraphs(text, DEFAULT_MAX_CHUNKS);
        assert_eq!(chunks, vec!["First paragraph.", "Second paragraph.", "Third."]);
    }

    #[test]
    fn discards_empty_chunks() {
        let text = "One.\n\n\n\n   \n\nTwo.";
        let chunks = chunk_paragraphs(text, DEFAULT_MAX_CHUNKS);
        assert_eq!(chunks, vec!["One.", "Two."]);
    }

    #[test]
    fn caps_chunk_count() {
        let text = (0..20).map(|i| format!("p{}", i)).collect::<Vec<_>>().join("\n\n");
        let chunks = chunk_paragraphs(&text, 5);
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[4], "p4");
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_paragraphs("", DEFAULT_MAX_CHUNKS).is_empty());
        assert!(chunk_paragraphs("\n\n  \n\n", DEFAULT_MAX_CHUNKS).is_empty());
    }

    #[test]
    fn single_paragraph_is_one_chunk() {
        let chunks = chunk_paragraphs("Just one line.", DEFAULT_MAX_CHUNKS);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn handles_crlf_boundaries() {
        let text = "alpha\r\n\r\nbeta";
        let chunks = chunk_paragraphs(text, DEFAULT_MAX_CHUNKS);
        assert_eq!(chunks, vec!["alpha", "beta"]);
    }
}
