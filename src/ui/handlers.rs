//! HTTP API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::protocol::{MediaAction, ShareOutcome, StatusSnapshot, ToggleOutcome};
use crate::ui::server::AppState;

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

/// Current session snapshot
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatusSnapshot>> {
    Json(ApiResponse::ok(state.controller.snapshot()))
}

/// Play/pause button
pub async fn toggle_play(State(state): State<Arc<AppState>>) -> Reply<ToggleOutcome> {
    match state.controller.toggle_play() {
        ToggleOutcome::Busy => (
            StatusCode::CONFLICT,
            Json(ApiResponse::error("Connection already in progress")),
        ),
        ToggleOutcome::ShutDown => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error("Player is shutting down")),
        ),
        outcome => (StatusCode::OK, Json(ApiResponse::ok(outcome))),
    }
}

pub async fn restart(State(state): State<Arc<AppState>>) -> Reply<StatusSnapshot> {
    if state.controller.restart() {
        (StatusCode::ACCEPTED, Json(ApiResponse::ok(state.controller.snapshot())))
    } else {
        (
            StatusCode::CONFLICT,
            Json(ApiResponse::error("Connection already in progress")),
        )
    }
}

/// Volume request; out-of-range values are clamped
#[derive(Deserialize)]
pub struct VolumeRequest {
    pub volume: i32,
}

pub async fn set_volume(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VolumeRequest>,
) -> Json<ApiResponse<StatusSnapshot>> {
    state.controller.set_volume(req.volume);
    Json(ApiResponse::ok(state.controller.snapshot()))
}

#[derive(Deserialize)]
pub struct MuteRequest {
    pub muted: bool,
}

pub async fn set_mute(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MuteRequest>,
) -> Json<ApiResponse<StatusSnapshot>> {
    if req.muted {
        state.controller.mute();
    } else {
        state.controller.unmute();
    }
    Json(ApiResponse::ok(state.controller.snapshot()))
}

pub async fn share(State(state): State<Arc<AppState>>) -> Reply<ShareOutcome> {
    match state.controller.share() {
        ShareOutcome::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error("Neither sharing nor the clipboard is available")),
        ),
        outcome => (StatusCode::OK, Json(ApiResponse::ok(outcome))),
    }
}

/// Media key routed in from the host, e.g. `/api/media/next_track`
pub async fn media_action(
    State(state): State<Arc<AppState>>,
    Path(action): Path<MediaAction>,
) -> Json<ApiResponse<StatusSnapshot>> {
    state.controller.handle_media_action(action);
    Json(ApiResponse::ok(state.controller.snapshot()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerOptions;
    use crate::platform::fake::{Behavior, ScriptedOutput};
    use crate::platform::{
        Capabilities, Connectivity, LoggingMediaSession, MemoryClipboard, NoWakeLock, Platform,
        UnsupportedShare,
    };
    use crate::protocol::PlaybackStatus;
    use crate::stream::StreamEndpoint;
    use crate::StreamPlaybackController;

    const STREAM: &str = "https://radio.example/live";

    fn app_state() -> Arc<AppState> {
        let (output, handle) = ScriptedOutput::new();
        handle.set_behavior(STREAM, Behavior::Hang);
        let platform = Platform {
            output: Box::new(output),
            wake_lock: Arc::new(NoWakeLock),
            media_session: Arc::new(LoggingMediaSession::new()),
            share: Arc::new(UnsupportedShare),
            clipboard: Arc::new(MemoryClipboard::new()),
            connectivity: Connectivity::default().subscribe(),
            capabilities: Capabilities::headless(),
        };
        let endpoints = StreamEndpoint::parse([STREAM]).unwrap();
        let controller =
            StreamPlaybackController::new(ControllerOptions::new(endpoints), platform).unwrap();
        Arc::new(AppState { controller })
    }

    #[test]
    fn test_api_response_envelope() {
        let ok = serde_json::to_value(ApiResponse::ok(ToggleOutcome::Connecting)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "data": "connecting"}));

        let err = serde_json::to_value(ApiResponse::<()>::error("nope")).unwrap();
        assert_eq!(err, serde_json::json!({"success": false, "error": "nope"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_play_press_conflicts() {
        let state = app_state();

        let (code, Json(body)) = toggle_play(State(state.clone())).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.data, Some(ToggleOutcome::Connecting));

        let (code, Json(body)) = toggle_play(State(state.clone())).await;
        assert_eq!(code, StatusCode::CONFLICT);
        assert!(body.data.is_none());

        let (code, _) = restart(State(state.clone())).await;
        assert_eq!(code, StatusCode::CONFLICT);

        state.controller.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_and_mute_requests() {
        let state = app_state();

        let Json(body) = set_volume(State(state.clone()), Json(VolumeRequest { volume: 150 })).await;
        assert_eq!(body.data.unwrap().volume, 100);

        let Json(body) = set_mute(State(state.clone()), Json(MuteRequest { muted: true })).await;
        let snapshot = body.data.unwrap();
        assert!(snapshot.muted);
        assert_eq!(snapshot.effective_volume, 0);

        let Json(body) = get_status(State(state.clone())).await;
        assert_eq!(body.data.unwrap().status, PlaybackStatus::Idle);

        state.controller.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_share_copies_without_share_sheet() {
        let state = app_state();
        let (code, Json(body)) = share(State(state.clone())).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.data, Some(ShareOutcome::Copied));
        state.controller.shutdown();
    }
}
