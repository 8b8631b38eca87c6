//! Plugin module - installed hook-based extensions.

mod plugin;

pub use plugin::{HookKind, Plugin};
