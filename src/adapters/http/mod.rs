//! HTTP and WebSocket adapters - the REST API surface.

pub mod dto;
pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::{ApiError, AppState};
pub use routes::{api_routes, app_router};
