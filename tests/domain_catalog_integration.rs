//! Integration tests for the knowledge-domain catalog and retrieval.
//!
//! Covers the custom-domain lifecycle (ingest, search, delete), active
//! domain switching, and the transcript-ordering property.

use std::sync::Arc;

use sage_chat::application::{ContextRetriever, DomainManager, KeywordScorer};
use sage_chat::domain::foundation::{DomainId, ErrorCode};

// =============================================================================
// Custom domain lifecycle
// =============================================================================

#[tokio::test]
async fn test_custom_domain_round_trip() {
    let domains = Arc::new(DomainManager::with_default_limits());
    let retriever = ContextRetriever::new(domains.clone(), Arc::new(KeywordScorer));

    let source = "The stoics taught acceptance of what we cannot control.\n\n\
                  Marcus Aurelius wrote his meditations while on campaign.";
    let domain = domains
        .create_custom_domain("Stoic Texts", "Classical stoic writings", source)
        .await
        .unwrap();
    assert_eq!(domain.id().as_str(), "stoic-texts");
    assert!(!domain.is_builtin());
    assert_eq!(domain.document_count(), 2);

    // The new domain is listed alongside the built-ins.
    let listed = domains.list_domains().await;
    assert!(listed.iter().any(|d| d.id() == domain.id()));

    // Retrieval over the ingested corpus.
    let snippets = retriever.query(domain.id(), "meditations", 5).await.unwrap();
    assert_eq!(snippets.len(), 1);
    assert!(snippets[0].content.contains("Marcus Aurelius"));

    // Delete and verify it is gone.
    domains.delete_domain(domain.id()).await.unwrap();
    assert!(!domains.exists(domain.id()).await);
    let err = retriever.query(domain.id(), "meditations", 5).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::DomainNotFound);
}

#[tokio::test]
async fn test_custom_domain_with_only_whitespace_is_rejected() {
    let domains = DomainManager::with_default_limits();
    let err = domains
        .create_custom_domain("Empty", "nothing here", "  \n\n   \n ")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::EmptyContent);
}

#[tokio::test]
async fn test_builtin_domains_cannot_be_deleted() {
    let domains = DomainManager::with_default_limits();
    let err = domains
        .delete_domain(&DomainId::new("biblical").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidConfiguration);
}

// =============================================================================
// Active domain switching
// =============================================================================

#[tokio::test]
async fn test_switch_domain_is_idempotent() {
    let domains = DomainManager::with_default_limits();
    let buddhist = DomainId::new("buddhist").unwrap();

    let first = domains.switch_domain(&buddhist).await.unwrap();
    let second = domains.switch_domain(&buddhist).await.unwrap();
    assert!(first.is_active());
    assert!(second.is_active());

    // Exactly one domain is active after any number of switches.
    let active: Vec<_> = domains
        .list_domains()
        .await
        .into_iter()
        .filter(|d| d.is_active())
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id(), &buddhist);
}

// =============================================================================
// Retrieval ranking
// =============================================================================

#[tokio::test]
async fn test_search_ranks_by_descending_relevance() {
    let domains = Arc::new(DomainManager::with_default_limits());
    let retriever = ContextRetriever::new(domains, Arc::new(KeywordScorer));
    let biblical = DomainId::new("biblical").unwrap();

    let snippets = retriever
        .query(&biblical, "the lord is my shepherd", 3)
        .await
        .unwrap();
    assert!(!snippets.is_empty());
    assert!(snippets[0].content.to_lowercase().contains("shepherd"));
    for pair in snippets.windows(2) {
        assert!(pair[0].relevance_score >= pair[1].relevance_score);
    }
}

// =============================================================================
// Transcript ordering property
// =============================================================================

mod proptests {
    use proptest::prelude::*;

    use sage_chat::domain::foundation::{DomainId, ProviderId, ResponseTypeId};
    use sage_chat::domain::session::{Message, Session, SessionConfig};

    fn session() -> Session {
        Session::new(SessionConfig::new(
            DomainId::new("biblical").unwrap(),
            ResponseTypeId::new("conversation").unwrap(),
            ProviderId::new("openai").unwrap(),
            "gpt-4",
        ))
    }

    proptest! {
        #[test]
        fn transcript_sequences_are_strictly_increasing(
            contents in proptest::collection::vec("[a-z]{1,12}", 1..30),
        ) {
            let mut session = session();
            for content in &contents {
                let seq = session.next_sequence();
                let message = Message::user(
                    *session.id(),
                    seq,
                    content.clone(),
                    session.config().domain_id.clone(),
                    session.config().response_type_id.clone(),
                )
                .unwrap();
                session.append(message).unwrap();
            }

            let all = session.history(usize::MAX, None);
            prop_assert_eq!(all.len(), contents.len());
            for pair in all.windows(2) {
                prop_assert!(pair[0].sequence() < pair[1].sequence());
            }
        }

        #[test]
        fn history_pages_partition_the_transcript(
            count in 1usize..30,
            page in 1usize..10,
        ) {
            let mut session = session();
            for i in 0..count {
                let seq = session.next_sequence();
                let message = Message::user(
                    *session.id(),
                    seq,
                    format!("message {}", i),
                    session.config().domain_id.clone(),
                    session.config().response_type_id.clone(),
                )
                .unwrap();
                session.append(message).unwrap();
            }

            // Walk pages from newest to oldest; together they must cover
            // the whole transcript exactly once, in order.
            let mut seen = Vec::new();
            let mut before = None;
            loop {
                let chunk: Vec<u64> = session
                    .history(page, before)
                    .iter()
                    .map(|m| m.sequence())
                    .collect();
                if chunk.is_empty() {
                    break;
                }
                before = Some(chunk[0]);
                seen.splice(0..0, chunk);
            }

            let expected: Vec<u64> = session
                .history(usize::MAX, None)
                .iter()
                .map(|m| m.sequence())
                .collect();
            prop_assert_eq!(seen, expected);
        }
    }
}
