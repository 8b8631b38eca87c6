//! Session module - Conversation state owned by the Session Manager.
//!
//! A `Session` is the authoritative record of one ongoing conversation:
//! its append-only transcript, active domain/response-type/provider
//! configuration, and generation parameters.

mod config;
mod message;
mod session;

pub use config::{ConfigPatch, GenerationParams, SessionConfig};
pub use message::{Message, MessageStatus, Sender};
pub use session::Session;
