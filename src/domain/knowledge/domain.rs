//! Knowledge domain entity.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, DomainId, Timestamp};

/// A named knowledge corpus used to ground responses.
///
/// Built-in domains are seeded at startup; custom domains are created by
/// ingestion and live until explicitly deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDomain {
    id: DomainId,
    name: String,
    description: String,
    document_count: u32,
    last_updated: Timestamp,
    active: bool,
    /// Built-ins cannot be deleted.
    builtin: bool,
}

impl KnowledgeDomain {
    /// Creates a built-in domain seeded at startup.
    pub fn builtin(
        id: DomainId,
        name: impl Into<String>,
        description: impl Into<String>,
        document_count: u32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            document_count,
            last_updated: Timestamp::now(),
            active: false,
            builtin: true,
        }
    }

    /// Creates a custom domain produced by ingestion.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the name is empty
    pub fn custom(
        id: DomainId,
        name: impl Into<String>,
        description: impl Into<String>,
        document_count: u32,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name", "Domain name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            description: description.into(),
            document_count,
            last_updated: Timestamp::now(),
            active: false,
            builtin: false,
        })
    }

    /// Marks this domain as the active one.
    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Clears the active flag.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Records a re-index with a new document count.
    pub fn reindexed(&mut self, document_count: u32) {
        self.document_count = document_count;
        self.last_updated = Timestamp::now();
    }

    /// Returns the domain ID.
    pub fn id(&self) -> &DomainId {
        &self.id
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the indexed document (chunk) count.
    pub fn document_count(&self) -> u32 {
        self.document_count
    }

    /// Returns when the corpus was last updated.
    pub fn last_updated(&self) -> &Timestamp {
        &self.last_updated
    }

    /// Returns true if this is the currently active domain.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns true for seeded built-in domains.
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_domain_is_flagged() {
        let d = KnowledgeDomain::builtin(
            DomainId::new("biblical").unwrap(),
            "Biblical Texts",
            "Religious texts and interpretations",
            1250,
        );
        assert!(d.is_builtin());
        assert!(!d.is_active());
        assert_eq!(d.document_count(), 1250);
    }

    #[test]
    fn custom_domain_rejects_empty_name() {
        let result =
            KnowledgeDomain::custom(DomainId::new("notes").unwrap(), "  ", "desc", 3);
        assert!(result.is_err());
    }

    #[test]
    fn activate_toggles_flag() {
        let mut d = KnowledgeDomain::builtin(
            DomainId::new("buddhist").unwrap(),
            "Buddhist Teachings",
            "Buddhist philosophy and practices",
            890,
        );
        d.activate();
        assert!(d.is_active());
        d.deactivate();
        assert!(!d.is_active());
    }

    #[test]
    fn reindex_updates_count_and_timestamp() {
        let mut d = KnowledgeDomain::custom(
            DomainId::new("notes").unwrap(),
            "My Notes",
            "Personal notes",
            2,
        )
        .unwrap();
        let before = *d.last_updated();
        std::thread::sleep(std::time::Duration::from_millis(5));
        d.reindexed(9);

        assert_eq!(d.document_count(), 9);
        assert!(d.last_updated().is_after(&before));
    }
}
