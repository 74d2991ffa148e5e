use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::handlers::{self, AppState};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "wifid API",
        version = "0.1.0",
        description = "WiFi scan listing, connection status and transactional settings updates.",
        license(name = "MIT")
    ),
    tags(
        (name = "system", description = "System information"),
        (name = "wifi", description = "WiFi scanning and configuration")
    ),
    paths(
        handlers::get_version,
        handlers::scan,
        handlers::conn_status,
        handlers::get_settings,
        handlers::set_params,
    ),
    components(schemas(
        handlers::VersionInfo,
        handlers::ApiError,
        handlers::ConnStatus,
        handlers::SettingsView,
        crate::scan::AccessPoint,
    ))
)]
pub struct ApiDoc;

pub fn create_router(state: Arc<AppState>) -> Router {
    let wifi_routes = Router::new()
        .route("/scan", get(handlers::scan))
        .route("/connstatus", get(handlers::conn_status))
        .route("/settings", get(handlers::get_settings))
        .route("/set", get(handlers::set_params).post(handlers::set_params));

    Router::new()
        .route("/api/v1/version", get(handlers::get_version))
        .route("/api-docs/openapi.json", get(handlers::openapi))
        .nest("/cfg/wifi", wifi_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
