//! Adapters - concrete implementations behind the ports, plus the
//! transport surface.

pub mod ai;
pub mod http;
pub mod storage;
