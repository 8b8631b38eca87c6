//! Domain Manager - owns knowledge domains and their corpora.
//!
//! Built-in domains are seeded at startup; custom domains are created by
//! ingesting user-supplied text. Each domain's corpus is an immutable
//! `Arc<Corpus>` snapshot: ingestion builds the whole index first and
//! swaps it in under a single write lock, so concurrent queries see
//! either the old or the new corpus, never a partial one.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, DomainId, ErrorCode};
use crate::domain::knowledge::{chunk_paragraphs, Corpus, KnowledgeDomain, DEFAULT_MAX_CHUNKS};

/// Seed rows for the built-in domains: (id, name, description, passages).
///
/// Document counts advertised for built-ins reflect the full upstream
/// corpora; the locally indexed passages are a small resident subset.
static BUILTIN_DOMAINS: Lazy<Vec<(&str, &str, &str, u32, Vec<&str>)>> = Lazy::new(|| {
    vec![
        (
            "biblical",
            "Biblical Texts",
            "Religious texts and interpretations",
            1250,
            vec![
                "Psalm 23: The Lord is my shepherd; I shall not want. He maketh me to lie \
                 down in green pastures: he leadeth me beside the still waters.",
                "Proverbs 3:5: Trust in the Lord with all thine heart; and lean not unto \
                 thine own understanding.",
                "Matthew 5:9: Blessed are the peacemakers: for they shall be called the \
                 children of God.",
            ],
        ),
        (
            "buddhist",
            "Buddhist Teachings",
            "Buddhist philosophy and practices",
            890,
            vec![
                "Dhammapada 1: All that we are is the result of what we have thought: it is \
                 founded on our thoughts, it is made up of our thoughts.",
                "The Four Noble Truths describe suffering, its origin in craving, its \
                 cessation, and the eightfold path leading to that cessation.",
            ],
        ),
        (
            "self-help",
            "Self-Help",
            "Personal development content",
            340,
            vec![
                "Small, consistent habits compound: a one percent improvement each day \
                 roughly doubles capability over a year.",
                "Goals give direction, but systems determine progress. Focus on the process \
                 you control, not the outcome you cannot.",
            ],
        ),
        (
            "therapeutic",
            "Therapeutic Dialogue",
            "Mental health resources",
            567,
            vec![
                "Naming an emotion precisely is the first step to regulating it; affect \
                 labeling measurably reduces amygdala response.",
                "Grounding techniques anchor attention in the present: five things you can \
                 see, four you can touch, three you can hear.",
            ],
        ),
    ]
});

struct Catalog {
    /// Insertion-ordered domain records.
    domains: Vec<KnowledgeDomain>,
    /// Corpus snapshot per domain.
    corpora: HashMap<DomainId, Arc<Corpus>>,
}

/// Owns the set of knowledge domains and their corpus snapshots.
pub struct DomainManager {
    catalog: RwLock<Catalog>,
    max_chunks: usize,
}

impl DomainManager {
    /// Creates a manager seeded with the built-in domains. The first
    /// built-in starts active.
    pub fn new(max_chunks: usize) -> Self {
        let mut domains = Vec::new();
        let mut corpora = HashMap::new();
        for (id, name, description, document_count, passages) in BUILTIN_DOMAINS.iter() {
            let domain_id = DomainId::new(*id).expect("builtin domain id is valid");
            let mut domain =
                KnowledgeDomain::builtin(domain_id.clone(), *name, *description, *document_count);
            if domains.is_empty() {
                domain.activate();
            }
            let chunks = passages.iter().map(|p| p.to_string()).collect();
            corpora.insert(
                domain_id.clone(),
                Arc::new(Corpus::from_chunks(domain_id, chunks)),
            );
            domains.push(domain);
        }
        Self {
            catalog: RwLock::new(Catalog { domains, corpora }),
            max_chunks,
        }
    }

    /// Creates a manager with the default chunk ceiling.
    pub fn with_default_limits() -> Self {
        Self::new(DEFAULT_MAX_CHUNKS)
    }

    /// Lists all domains in seed/creation order.
    pub async fn list_domains(&self) -> Vec<KnowledgeDomain> {
        self.catalog.read().await.domains.clone()
    }

    /// Returns a domain by id.
    ///
    /// # Errors
    ///
    /// - `DomainNotFound` if unknown
    pub async fn get(&self, domain_id: &DomainId) -> Result<KnowledgeDomain, DomainError> {
        let catalog = self.catalog.read().await;
        catalog
            .domains
            .iter()
            .find(|d| d.id() == domain_id)
            .cloned()
            .ok_or_else(|| DomainError::domain_not_found(domain_id))
    }

    /// Returns true if the domain exists.
    pub async fn exists(&self, domain_id: &DomainId) -> bool {
        let catalog = self.catalog.read().await;
        catalog.domains.iter().any(|d| d.id() == domain_id)
    }

    /// Makes `domain_id` the active domain.
    ///
    /// Idempotent: switching to the already-active domain is a no-op
    /// returning the same state.
    ///
    /// # Errors
    ///
    /// - `DomainNotFound` if unknown
    pub async fn switch_domain(&self, domain_id: &DomainId) -> Result<KnowledgeDomain, DomainError> {
        let mut catalog = self.catalog.write().await;
        if !catalog.domains.iter().any(|d| d.id() == domain_id) {
            return Err(DomainError::domain_not_found(domain_id));
        }
        for domain in catalog.domains.iter_mut() {
            if domain.id() == domain_id {
                domain.activate();
            } else {
                domain.deactivate();
            }
        }
        Ok(catalog
            .domains
            .iter()
            .find(|d| d.id() == domain_id)
            .cloned()
            .expect("domain presence checked above"))
    }

    /// Creates a custom domain by indexing `source_text`.
    ///
    /// Chunks on paragraph boundaries, discards empty chunks, and caps
    /// the total at the configured ceiling. The new corpus becomes
    /// queryable atomically with the domain record.
    ///
    /// # Errors
    ///
    /// - `EmptyContent` if no indexable text results
    /// - `ValidationFailed` if the derived id is invalid or taken
    pub async fn create_custom_domain(
        &self,
        name: &str,
        description: &str,
        source_text: &str,
    ) -> Result<KnowledgeDomain, DomainError> {
        let chunks = chunk_paragraphs(source_text, self.max_chunks);
        if chunks.is_empty() {
            return Err(DomainError::new(
                ErrorCode::EmptyContent,
                "No indexable text after chunking",
            ));
        }

        let domain_id = DomainId::new(slugify(name))?;
        let document_count = chunks.len() as u32;
        let domain =
            KnowledgeDomain::custom(domain_id.clone(), name, description, document_count)?;
        let corpus = Arc::new(Corpus::from_chunks(domain_id.clone(), chunks));

        let mut catalog = self.catalog.write().await;
        if catalog.domains.iter().any(|d| d.id() == &domain_id) {
            return Err(DomainError::validation(
                "name",
                format!("Domain '{}' already exists", domain_id),
            ));
        }
        catalog.corpora.insert(domain_id, corpus);
        catalog.domains.push(domain.clone());

        tracing::info!(domain = %domain.id(), chunks = document_count, "custom domain indexed");
        Ok(domain)
    }

    /// Deletes a custom domain and its corpus.
    ///
    /// # Errors
    ///
    /// - `DomainNotFound` if unknown
    /// - `InvalidConfiguration` for built-in domains
    pub async fn delete_domain(&self, domain_id: &DomainId) -> Result<(), DomainError> {
        let mut catalog = self.catalog.write().await;
        let index = catalog
            .domains
            .iter()
            .position(|d| d.id() == domain_id)
            .ok_or_else(|| DomainError::domain_not_found(domain_id))?;
        if catalog.domains[index].is_builtin() {
            return Err(DomainError::invalid_configuration(
                "domain_id",
                "Built-in domains cannot be deleted",
            ));
        }
        catalog.domains.remove(index);
        catalog.corpora.remove(domain_id);
        Ok(())
    }

    /// Returns the current corpus snapshot for a domain.
    ///
    /// The returned `Arc` stays valid across concurrent re-ingestions.
    ///
    /// # Errors
    ///
    /// - `DomainNotFound` if unknown
    pub async fn corpus(&self, domain_id: &DomainId) -> Result<Arc<Corpus>, DomainError> {
        let catalog = self.catalog.read().await;
        catalog
            .corpora
            .get(domain_id)
            .cloned()
            .ok_or_else(|| DomainError::domain_not_found(domain_id))
    }
}

/// Derives a slug id from a display name.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> DomainManager {
        DomainManager::with_default_limits()
    }

    #[tokio::test]
    async fn seeds_builtin_domains_with_first_active() {
        let m = manager();
        let domains = m.list_domains().await;

        let ids: Vec<&str> = domains.iter().map(|d| d.id().as_str()).collect();
        assert_eq!(ids, vec!["biblical", "buddhist", "self-help", "therapeutic"]);
        assert!(domains[0].is_active());
        assert!(domains.iter().skip(1).all(|d| !d.is_active()));
    }

    #[tokio::test]
    async fn switch_domain_moves_active_flag() {
        let m = manager();
        let buddhist = DomainId::new("buddhist").unwrap();

        let switched = m.switch_domain(&buddhist).await.unwrap();
        assert!(switched.is_active());

        let domains = m.list_domains().await;
        let active: Vec<&str> = domains
            .iter()
            .filter(|d| d.is_active())
            .map(|d| d.id().as_str())
            .collect();
        assert_eq!(active, vec!["buddhist"]);
    }

    #[tokio::test]
    async fn switch_domain_is_idempotent() {
        let m = manager();
        let buddhist = DomainId::new("buddhist").unwrap();

        let first = m.switch_domain(&buddhist).await.unwrap();
        let second = m.switch_domain(&buddhist).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn switch_unknown_domain_fails() {
        let m = manager();
        let err = m
            .switch_domain(&DomainId::new("astrology").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DomainNotFound);
    }

    #[tokio::test]
    async fn create_custom_domain_indexes_paragraphs() {
        let m = manager();
        let domain = m
            .create_custom_domain(
                "Garden Notes",
                "My gardening journal",
                "Tomatoes need full sun.\n\nBasil repels aphids.",
            )
            .await
            .unwrap();

        assert_eq!(domain.id().as_str(), "garden-notes");
        assert_eq!(domain.document_count(), 2);
        assert!(!domain.is_builtin());

        let corpus = m.corpus(domain.id()).await.unwrap();
        assert_eq!(corpus.len(), 2);
    }

    #[tokio::test]
    async fn create_custom_domain_rejects_empty_text() {
        let m = manager();
        let err = m
            .create_custom_domain("Empty", "nothing", "\n\n   \n\n")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyContent);
    }

    #[tokio::test]
    async fn create_custom_domain_rejects_duplicate_slug() {
        let m = manager();
        m.create_custom_domain("Notes", "", "one paragraph").await.unwrap();
        let err = m
            .create_custom_domain("Notes", "", "another paragraph")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn create_custom_domain_caps_chunks() {
        let m = DomainManager::new(3);
        let text = (0..10).map(|i| format!("p{}", i)).collect::<Vec<_>>().join("\n\n");
        let domain = m.create_custom_domain("Capped", "", &text).await.unwrap();
        assert_eq!(domain.document_count(), 3);
    }

    #[tokio::test]
    async fn delete_custom_domain_removes_corpus() {
        let m = manager();
        let domain = m.create_custom_domain("Tmp", "", "text").await.unwrap();
        m.delete_domain(domain.id()).await.unwrap();

        assert!(!m.exists(domain.id()).await);
        assert!(m.corpus(domain.id()).await.is_err());
    }

    #[tokio::test]
    async fn delete_builtin_domain_is_rejected() {
        let m = manager();
        let err = m
            .delete_domain(&DomainId::new("biblical").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration);
    }

    #[tokio::test]
    async fn corpus_snapshot_survives_reingestion() {
        let m = manager();
        let domain = m.create_custom_domain("Snap", "", "old text").await.unwrap();
        let snapshot = m.corpus(domain.id()).await.unwrap();

        // Delete and recreate under the same name: held snapshot is unchanged.
        m.delete_domain(domain.id()).await.unwrap();
        m.create_custom_domain("Snap", "", "new text\n\nsecond").await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.chunks()[0].content, "old text");

        let fresh = m.corpus(domain.id()).await.unwrap();
        assert_eq!(fresh.len(), 2);
    }

    #[test]
    fn slugify_normalizes_names() {
        assert_eq!(slugify("Garden Notes"), "garden-notes");
        assert_eq!(slugify("  My  Stuff!  "), "my-stuff");
        assert_eq!(slugify("Self-Help"), "self-help");
    }
}
