//! Session configuration: active domain, response type, provider/model,
//! and generation parameters.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainId, ProviderId, ResponseTypeId, ValidationError};

/// Bounds for generation parameters.
pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;
pub const MAX_MAX_TOKENS: u32 = 32_768;

/// Tunable generation parameters carried per session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationParams {
    /// Creates validated generation parameters.
    ///
    /// # Errors
    ///
    /// - `OutOfRange` if temperature is outside [0, 2] or max_tokens is
    ///   zero or above the ceiling
    pub fn new(temperature: f32, max_tokens: u32) -> Result<Self, ValidationError> {
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(ValidationError::out_of_range(
                "temperature",
                MIN_TEMPERATURE as f64,
                MAX_TEMPERATURE as f64,
                temperature as f64,
            ));
        }
        if max_tokens == 0 || max_tokens > MAX_MAX_TOKENS {
            return Err(ValidationError::out_of_range(
                "max_tokens",
                1.0,
                MAX_MAX_TOKENS as f64,
                max_tokens as f64,
            ));
        }
        Ok(Self {
            temperature,
            max_tokens,
        })
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// The active configuration of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub domain_id: DomainId,
    pub response_type_id: ResponseTypeId,
    pub provider_id: ProviderId,
    pub model: String,
    pub params: GenerationParams,
}

impl SessionConfig {
    /// Creates a session configuration with default generation parameters.
    pub fn new(
        domain_id: DomainId,
        response_type_id: ResponseTypeId,
        provider_id: ProviderId,
        model: impl Into<String>,
    ) -> Self {
        Self {
            domain_id,
            response_type_id,
            provider_id,
            model: model.into(),
            params: GenerationParams::default(),
        }
    }
}

/// A partial configuration update.
///
/// Each present field is validated independently by the Session Manager;
/// invalid fields are rejected individually while valid ones commit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub domain_id: Option<DomainId>,
    pub response_type_id: Option<ResponseTypeId>,
    pub provider_id: Option<ProviderId>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ConfigPatch {
    /// Returns true if the patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.domain_id.is_none()
            && self.response_type_id.is_none()
            && self.provider_id.is_none()
            && self.model.is_none()
            && self.temperature.is_none()
            && self.max_tokens.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        let params = GenerationParams::default();
        assert!(GenerationParams::new(params.temperature, params.max_tokens).is_ok());
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        assert!(GenerationParams::new(-0.1, 100).is_err());
        assert!(GenerationParams::new(2.1, 100).is_err());
        assert!(GenerationParams::new(2.0, 100).is_ok());
    }

    #[test]
    fn rejects_bad_max_tokens() {
        assert!(GenerationParams::new(0.7, 0).is_err());
        assert!(GenerationParams::new(0.7, MAX_MAX_TOKENS + 1).is_err());
        assert!(GenerationParams::new(0.7, MAX_MAX_TOKENS).is_ok());
    }

    #[test]
    fn empty_patch_reports_empty() {
        assert!(ConfigPatch::default().is_empty());

        let patch = ConfigPatch {
            temperature: Some(0.3),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn patch_deserializes_partial_json() {
        let json = r#"{"temperature": 0.2, "model": "gpt-4"}"#;
        let patch: ConfigPatch = serde_json::from_str(json).unwrap();
        assert_eq!(patch.temperature, Some(0.2));
        assert_eq!(patch.model.as_deref(), Some("gpt-4"));
        assert!(patch.domain_id.is_none());
    }
}
