//! Response-type templates shaping how generated replies are framed.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::ResponseTypeId;

/// A behavioral template applied to the system prompt of a generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseType {
    pub id: ResponseTypeId,
    pub name: String,
    pub description: String,
    /// System-prompt fragment injected ahead of retrieved context.
    pub template: String,
}

impl ResponseType {
    fn new(id: &str, name: &str, description: &str, template: &str) -> Self {
        Self {
            id: ResponseTypeId::new(id).expect("builtin response type id is valid"),
            name: name.into(),
            description: description.into(),
            template: template.into(),
        }
    }

    /// Looks up a built-in response type by id.
    pub fn builtin(id: &ResponseTypeId) -> Option<&'static ResponseType> {
        BUILTINS.iter().find(|rt| &rt.id == id)
    }

    /// Returns all built-in response types.
    pub fn builtins() -> &'static [ResponseType] {
        &BUILTINS
    }
}

static BUILTINS: Lazy<Vec<ResponseType>> = Lazy::new(|| {
    vec![
        ResponseType::new(
            "daily-guidance",
            "Daily Guidance",
            "Inspirational quotes and daily wisdom",
            "Respond with brief, uplifting guidance grounded in the provided context. \
             Keep the reply under three short paragraphs.",
        ),
        ResponseType::new(
            "interpretation",
            "Interpretation",
            "Deep analysis and explanation",
            "Provide a detailed, analytical interpretation of the user's question, \
             citing the provided context passages where relevant.",
        ),
        ResponseType::new(
            "conversation",
            "Conversation",
            "Natural dialogue and discussion",
            "Engage in a natural, personalized dialogue. Use the provided context to \
             inform, not dominate, the reply.",
        ),
        ResponseType::new(
            "therapeutic",
            "Therapeutic Dialogue",
            "Supportive and healing conversations",
            "Respond supportively and empathetically. Validate the user's feelings \
             before offering perspective from the provided context.",
        ),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_include_all_four_types() {
        let ids: Vec<&str> = ResponseType::builtins()
            .iter()
            .map(|rt| rt.id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec!["daily-guidance", "interpretation", "conversation", "therapeutic"]
        );
    }

    #[test]
    fn builtin_lookup_by_id() {
        let id = ResponseTypeId::new("interpretation").unwrap();
        let rt = ResponseType::builtin(&id).unwrap();
        assert_eq!(rt.name, "Interpretation");
        assert!(!rt.template.is_empty());
    }

    #[test]
    fn unknown_id_is_none() {
        let id = ResponseTypeId::new("haiku").unwrap();
        assert!(ResponseType::builtin(&id).is_none());
    }
}
