//! HTTP surface: flow actions, the alarm toggle and live settings

use crate::persistence::{self, SettingsStore};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use siren_control::{FlowAction, SettingsPatch, SirenDevice, SirenError};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sirens: Arc<DashMap<String, Arc<SirenDevice>>>,
    pub settings_path: Arc<PathBuf>,
    /// Serializes writes of the settings file
    pub persist_lock: Arc<Mutex<()>>,
}

impl AppState {
    #[must_use]
    pub fn new(settings_path: PathBuf) -> Self {
        Self {
            sirens: Arc::new(DashMap::new()),
            settings_path: Arc::new(settings_path),
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    fn siren(&self, id: &str) -> Result<Arc<SirenDevice>, SirenError> {
        self.sirens
            .get(id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| SirenError::DeviceNotFound(id.to_string()))
    }

    /// Write the settings of every siren to disk
    pub async fn persist_settings(&self) -> Result<(), std::io::Error> {
        let _guard = self.persist_lock.lock().await;
        let sirens: Vec<Arc<SirenDevice>> =
            self.sirens.iter().map(|r| Arc::clone(r.value())).collect();

        let mut store = SettingsStore::new();
        for siren in sirens {
            store.insert(siren.id().to_string(), siren.settings().await);
        }
        persistence::save_settings(&self.settings_path, &store).await
    }
}

/// API response wrapper using `serde_json::Value` for flexibility
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: Some(serde_json::to_value(data).unwrap_or(serde_json::Value::Null)),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// HTTP status for a controller error
fn status_for(error: &SirenError) -> StatusCode {
    match error {
        SirenError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
        SirenError::Transport(_) => StatusCode::BAD_GATEWAY,
        SirenError::Cluster(_) => StatusCode::BAD_REQUEST,
        SirenError::Host(_) => StatusCode::INTERNAL_SERVER_ERROR,
        SirenError::Cancelled(_) => StatusCode::CONFLICT,
    }
}

fn error_response(error: &SirenError) -> (StatusCode, Json<ApiResponse>) {
    (status_for(error), Json(ApiResponse::error(error.to_string())))
}

/// Build a flow action from its name and an optional JSON object of arguments
fn parse_action(name: &str, body: &[u8]) -> Result<FlowAction, serde_json::Error> {
    let mut args = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Map::new()
    } else {
        serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(body)?
    };
    args.insert(
        "action".to_string(),
        serde_json::Value::String(name.to_string()),
    );
    serde_json::from_value(serde_json::Value::Object(args))
}

/// Siren summary for listings
#[derive(Debug, Serialize)]
struct SirenStatus {
    id: String,
    alarm_toggle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_secs: Option<u64>,
}

/// Alarm toggle request
#[derive(Deserialize)]
struct ToggleRequest {
    value: bool,
}

/// Health check
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// List all sirens
async fn list_sirens(State(state): State<AppState>) -> impl IntoResponse {
    let sirens: Vec<Arc<SirenDevice>> =
        state.sirens.iter().map(|r| Arc::clone(r.value())).collect();

    let mut statuses = Vec::with_capacity(sirens.len());
    for siren in sirens {
        statuses.push(SirenStatus {
            id: siren.id().to_string(),
            alarm_toggle: siren.alarm_toggle().await,
            remaining_secs: siren.alarm().remaining().await.map(|d| d.as_secs()),
        });
    }
    statuses.sort_by(|a, b| a.id.cmp(&b.id));

    Json(ApiResponse::success(statuses))
}

/// Run a flow action on a siren
async fn run_action(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
    body: Bytes,
) -> impl IntoResponse {
    let siren = match state.siren(&id) {
        Ok(siren) => siren,
        Err(e) => return error_response(&e),
    };

    let flow_action = match parse_action(&action, &body) {
        Ok(flow_action) => flow_action,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(format!("Invalid action {action}: {e}"))),
            )
        }
    };

    match siren.run_action(flow_action).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "device": id,
                "action": action
            }))),
        ),
        Err(e) => error_response(&e),
    }
}

/// Flip the alarm toggle capability, as the UI would
async fn set_alarm_toggle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ToggleRequest>,
) -> impl IntoResponse {
    let siren = match state.siren(&id) {
        Ok(siren) => siren,
        Err(e) => return error_response(&e),
    };

    let result = siren.on_alarm_toggle(req.value).await;
    // The toggle reflects the controller's view even when the device call failed
    let toggle = siren.alarm_toggle().await;
    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "device": id,
                "alarm_toggle": toggle
            }))),
        ),
        Err(e) => error_response(&e),
    }
}

/// Get a siren's settings
async fn get_settings(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.siren(&id) {
        Ok(siren) => (
            StatusCode::OK,
            Json(ApiResponse::success(siren.settings().await)),
        ),
        Err(e) => error_response(&e),
    }
}

/// Apply a partial settings update and persist it. A `null` value clears a setting.
async fn update_settings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<SettingsPatch>,
) -> impl IntoResponse {
    let siren = match state.siren(&id) {
        Ok(siren) => siren,
        Err(e) => return error_response(&e),
    };

    let settings = siren.on_settings(&patch).await;
    if let Err(e) = state.persist_settings().await {
        tracing::warn!("Failed to save settings: {}", e);
    }
    (StatusCode::OK, Json(ApiResponse::success(settings)))
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/sirens", get(list_sirens))
        .route("/api/v1/sirens/:id/actions/:action", post(run_action))
        .route(
            "/api/v1/sirens/:id/capabilities/alarm_toggle",
            put(set_alarm_toggle),
        )
        .route(
            "/api/v1/sirens/:id/settings",
            get(get_settings).put(update_settings),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use siren_control::{AlarmMode, TransportError};

    #[test]
    fn test_parse_action_without_body() {
        assert_eq!(parse_action("stop_alarm", b"").unwrap(), FlowAction::StopAlarm);
        assert_eq!(
            parse_action("trigger_doorbell", b"  \n").unwrap(),
            FlowAction::TriggerDoorbell
        );
    }

    #[test]
    fn test_parse_action_with_arguments() {
        let action = parse_action("start_alarm", br#"{"mode": "strobe", "volume": 30}"#).unwrap();
        assert_eq!(
            action,
            FlowAction::StartAlarm {
                mode: Some(AlarmMode::Strobe),
                duration: None,
                volume: Some(30),
            }
        );

        // The path names the action, not the body
        let action = parse_action("set_volume", br#"{"action": "stop_alarm", "volume": 5}"#).unwrap();
        assert_eq!(action, FlowAction::SetVolume { volume: 5 });
    }

    #[test]
    fn test_parse_action_errors() {
        assert!(parse_action("self_destruct", b"").is_err());
        assert!(parse_action("set_volume", b"").is_err());
        assert!(parse_action("start_alarm", b"[1, 2]").is_err());
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            status_for(&SirenError::DeviceNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&SirenError::Transport(TransportError::Timeout("startWarning".into()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&SirenError::Cancelled("hall".into())),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_unknown_siren() {
        let state = AppState::new(PathBuf::from("unused.json"));
        assert!(matches!(
            state.siren("missing"),
            Err(SirenError::DeviceNotFound(_))
        ));
    }
}
