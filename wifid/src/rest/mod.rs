//! HTTP endpoints for scanning and WiFi settings.

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
