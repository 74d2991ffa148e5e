use axum::{
    Form, Json,
    body::{Body, Bytes},
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use utoipa::{OpenApi, ToSchema};

use crate::apply::DeferredApplier;
use crate::config::{Committed, ConfigState, Field};
use crate::error::{CommitError, join_fields};
use crate::radio::{Radio, StationStatus};
use crate::scan::{CgiState, PaginatedEmitter, ScanOrchestrator, ScanStore};

/// Settings page, target of successful and failed updates.
pub const REDIRECT_SETTINGS: &str = "/cfg/wifi";

/// Page that polls the connection status after new station credentials.
pub const REDIRECT_CONNECTING: &str = "/cfg/wifi/connecting";

const SUCCESS_MESSAGE: &str = "Settings%20saved%20and%20applied.";

/// Shared application state
pub struct AppState {
    pub config: Arc<ConfigState>,
    pub radio: Arc<dyn Radio>,
    pub orchestrator: ScanOrchestrator,
    pub emitter: PaginatedEmitter,
    pub applier: DeferredApplier,
    pub apply_delay: Duration,
}

impl AppState {
    pub fn new(radio: Arc<dyn Radio>, config: Arc<ConfigState>, apply_delay: Duration) -> Self {
        let orchestrator = ScanOrchestrator::new(
            Arc::new(ScanStore::new()),
            Arc::clone(&radio),
            Arc::clone(&config),
        );
        Self {
            emitter: PaginatedEmitter::new(orchestrator.clone()),
            applier: DeferredApplier::for_radio(Arc::clone(&radio), Arc::clone(&config)),
            orchestrator,
            config,
            radio,
            apply_delay,
        }
    }
}

/// API error response
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub code: u32,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code {
            400 => StatusCode::BAD_REQUEST,
            503 => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

// === Version ===

/// Version information
#[derive(Serialize, ToSchema)]
pub struct VersionInfo {
    pub version: String,
}

/// Get service version
#[utoipa::path(
    get,
    path = "/api/v1/version",
    responses(
        (status = 200, description = "Service version", body = VersionInfo)
    ),
    tag = "system"
)]
pub async fn get_version() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// OpenAPI document
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(super::routes::ApiDoc::openapi())
}

// === Scan listing ===

/// List networks found by the last scan
///
/// Streams one record per chunk. Answers `inProgress: 1` while a scan runs;
/// a complete listing triggers the next scan.
#[utoipa::path(
    get,
    path = "/cfg/wifi/scan",
    responses(
        (status = 200, description = "Scan results as `{result: {inProgress, APs}}`")
    ),
    tag = "wifi"
)]
pub async fn scan(State(state): State<Arc<AppState>>) -> Response {
    let emitter = state.emitter.clone();
    let chunks = async_stream::stream! {
        let mut slot = None;
        loop {
            let mut chunk = Vec::new();
            let step = emitter.step(&mut slot, &mut chunk);
            yield Ok::<_, Infallible>(Bytes::from(chunk));
            if step == CgiState::Done {
                break;
            }
        }
    };

    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(chunks),
    )
        .into_response()
}

// === Connection status ===

/// Station connection status
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnStatus {
    /// One of `disabled`, `idle`, `working`, `fail`, `success`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl ConnStatus {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            cause: None,
            ip: None,
        }
    }

    fn fail(cause: &str) -> Self {
        Self {
            cause: Some(cause.to_string()),
            ..Self::new("fail")
        }
    }
}

/// Get station connection status
#[utoipa::path(
    get,
    path = "/cfg/wifi/connstatus",
    responses(
        (status = 200, description = "Connection status", body = ConnStatus)
    ),
    tag = "wifi"
)]
pub async fn conn_status(State(state): State<Arc<AppState>>) -> Json<ConnStatus> {
    let config = state.config.current();
    if !config.opmode.has_station() || config.sta_ssid.is_empty() {
        return Json(ConnStatus::new("disabled"));
    }

    let status = match state.radio.station_status() {
        StationStatus::Idle => ConnStatus::new("idle"),
        StationStatus::Connecting | StationStatus::Unknown(_) => ConnStatus::new("working"),
        StationStatus::WrongPassword => ConnStatus::fail("WRONG_PASSWORD"),
        StationStatus::NoApFound => ConnStatus::fail("AP_NOT_FOUND"),
        StationStatus::ConnectFailed => ConnStatus::fail("CONNECTION_FAILED"),
        StationStatus::GotIp => ConnStatus {
            ip: state.radio.station_ip().map(|ip| ip.to_string()),
            ..ConnStatus::new("success")
        },
    };
    Json(status)
}

// === Settings ===

/// Current WiFi settings with derived station state
#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsView {
    pub opmode: u8,
    pub opmode_name: String,
    pub sta_enable: bool,
    pub ap_enable: bool,
    pub tpw: u8,
    pub ap_channel: u8,
    pub ap_ssid: String,
    pub ap_password: String,
    pub ap_hidden: bool,
    pub sta_ssid: String,
    pub sta_password: String,
    pub sta_rssi: i8,
    /// Joined network, empty unless connected with an address.
    pub sta_active_ssid: String,
    pub sta_active_ip: String,
}

/// Get current WiFi settings
#[utoipa::path(
    get,
    path = "/cfg/wifi/settings",
    responses(
        (status = 200, description = "Current settings", body = SettingsView)
    ),
    tag = "wifi"
)]
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsView> {
    let config = state.config.current();
    let connected = config.opmode.has_station()
        && state.radio.station_status() == StationStatus::GotIp;

    let (sta_active_ssid, sta_active_ip) = if connected {
        (
            state.radio.station_ssid().unwrap_or_default(),
            state
                .radio
                .station_ip()
                .map(|ip| ip.to_string())
                .unwrap_or_default(),
        )
    } else {
        (String::new(), String::new())
    };

    Json(SettingsView {
        opmode: config.opmode.code(),
        opmode_name: config.opmode.name().to_string(),
        sta_enable: config.opmode.has_station(),
        ap_enable: config.opmode.has_ap(),
        tpw: config.tpw,
        ap_channel: config.ap_channel,
        ap_ssid: config.ap_ssid.clone(),
        ap_password: config.ap_password.clone(),
        ap_hidden: config.ap_hidden,
        sta_ssid: config.sta_ssid.clone(),
        sta_password: config.sta_password.clone(),
        sta_rssi: state.radio.station_rssi(),
        sta_active_ssid,
        sta_active_ip,
    })
}

/// Run all submitted fields through one transaction.
fn update_settings(
    config: &ConfigState,
    params: &HashMap<String, String>,
) -> Result<Committed, CommitError> {
    let mut tx = config.begin();
    for field in Field::ALL {
        if let Some(raw) = params.get(field.as_str()) {
            tx.propose(field, raw);
        }
    }
    tx.commit()
}

/// Update WiFi settings
///
/// Accepts `opmode`, `ap_enable`, `sta_enable`, `tpw`, `ap_channel`,
/// `ap_ssid`, `ap_password`, `ap_hidden`, `sta_ssid` and `sta_password` as
/// query or form fields. Either all submitted fields are applied or none.
#[utoipa::path(
    post,
    path = "/cfg/wifi/set",
    responses(
        (status = 303, description = "Redirect to the settings page, with `err` listing rejected fields"),
        (status = 500, description = "Settings could not be stored", body = ApiError)
    ),
    tag = "wifi"
)]
pub async fn set_params(
    State(state): State<Arc<AppState>>,
    Form(params): Form<HashMap<String, String>>,
) -> Result<Redirect, ApiError> {
    match update_settings(&state.config, &params) {
        Ok(committed) => {
            info!(
                delay_ms = state.apply_delay.as_millis() as u64,
                "WiFi settings saved, applying later"
            );
            state.applier.arm(state.apply_delay);

            if committed.wants_connect() {
                info!(ssid = %committed.config.sta_ssid, "Station credentials set, redirecting to connection status");
                Ok(Redirect::to(REDIRECT_CONNECTING))
            } else {
                Ok(Redirect::to(&format!(
                    "{REDIRECT_SETTINGS}?msg={SUCCESS_MESSAGE}"
                )))
            }
        }
        Err(CommitError::Rejected(fields)) => Ok(Redirect::to(&format!(
            "{REDIRECT_SETTINGS}?err={}",
            join_fields(&fields)
        ))),
        Err(e @ CommitError::Persist(_)) => Err(ApiError {
            error: e.to_string(),
            code: 500,
        }),
    }
}
