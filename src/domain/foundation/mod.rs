//! Foundation module - Shared domain primitives.
//!
//! Contains the strongly-typed identifiers, timestamp value object, and
//! error taxonomy that form the vocabulary of the Sage Chat domain.

mod errors;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{DomainId, MessageId, PluginId, ProviderId, ResponseTypeId, SessionId, SnippetId};
pub use timestamp::Timestamp;
