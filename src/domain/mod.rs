//! Domain layer - pure model of sessions, knowledge, providers, and plugins.
//!
//! No I/O happens here; every type is constructed and mutated through
//! methods that enforce the component invariants.

pub mod foundation;
pub mod knowledge;
pub mod plugin;
pub mod provider;
pub mod response_type;
pub mod session;
