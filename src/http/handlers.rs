use super::state::AppState;
use crate::capture::{CaptureState, CaptureStatus};
use crate::error::Error;
use crate::model::{Identity, Message, RoomBinding};
use crate::recognition::RecognitionEntry;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BindRequest {
    pub peer: String,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CaptureStateResponse {
    pub state: CaptureState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecognitionView {
    pub interim: Vec<RecognitionEntry>,
    pub finals: Vec<RecognitionEntry>,
    pub awaiting_final: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub error: String,
}

fn error_response(e: Error) -> Response {
    let status = match &e {
        Error::DeviceAccess(_) => StatusCode::FORBIDDEN,
        Error::NoActiveRoom | Error::IllegalState { .. } => StatusCode::CONFLICT,
        Error::RoomResolution(_) | Error::HistoryUnavailable(_) => StatusCode::BAD_GATEWAY,
        Error::ChannelDisconnected | Error::DeviceLost(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::InvalidFrameLength { .. } | Error::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status.is_server_error() {
        error!("Request failed: {}", e);
    }

    (
        status,
        Json(ErrorResponse {
            code: e.code().to_string(),
            error: e.to_string(),
        }),
    )
        .into_response()
}

fn capture_response(result: crate::error::Result<CaptureState>) -> Response {
    match result {
        Ok(state) => (StatusCode::OK, Json(CaptureStateResponse { state })).into_response(),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// POST /chat/bind
/// Leave the current room and join the one shared with `peer`
pub async fn bind_room(State(state): State<AppState>, Json(req): Json<BindRequest>) -> Response {
    let peer = req.peer.trim();
    if peer.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                code: "INVALID_REQUEST".to_string(),
                error: "peer must not be empty".to_string(),
            }),
        )
            .into_response();
    }

    info!("Binding to conversation with {}", peer);

    let mut client = state.client.lock().await;
    match client.bind(Identity::new(peer)).await {
        Ok(binding) => (StatusCode::OK, Json::<RoomBinding>(binding)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /chat/history
/// Load the bound room's stored messages
pub async fn load_history(State(state): State<AppState>) -> Response {
    let mut client = state.client.lock().await;
    match client.load_history().await {
        Ok(history) => (StatusCode::OK, Json::<Vec<Message>>(history)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /chat/messages
pub async fn get_messages(State(state): State<AppState>) -> Response {
    let client = state.client.lock().await;
    (StatusCode::OK, Json(client.messages().to_vec())).into_response()
}

/// POST /chat/send
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Response {
    let client = state.client.lock().await;
    match client.send(&req.text).await {
        Ok(()) => (
            StatusCode::OK,
            Json(SendResponse {
                status: "sent".to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /capture/arm
pub async fn arm_capture(State(state): State<AppState>) -> Response {
    let mut client = state.client.lock().await;
    capture_response(client.arm().await)
}

/// POST /capture/start
pub async fn start_capture(State(state): State<AppState>) -> Response {
    let mut client = state.client.lock().await;
    capture_response(client.start_capture().await)
}

/// POST /capture/stop
pub async fn stop_capture(State(state): State<AppState>) -> Response {
    let mut client = state.client.lock().await;
    capture_response(client.stop_capture().await)
}

/// POST /capture/close
pub async fn close_capture(State(state): State<AppState>) -> Response {
    let mut client = state.client.lock().await;
    client.close_capture().await;
    capture_response(Ok(client.capture().state()))
}

/// GET /capture/status
pub async fn get_capture_status(State(state): State<AppState>) -> Response {
    let client = state.client.lock().await;
    (StatusCode::OK, Json::<CaptureStatus>(client.capture().status())).into_response()
}

/// GET /recognition
pub async fn get_recognition(State(state): State<AppState>) -> Response {
    let client = state.client.lock().await;
    let recognition = client.recognition();

    (
        StatusCode::OK,
        Json(RecognitionView {
            interim: recognition.interim().to_vec(),
            finals: recognition.finals().to_vec(),
            awaiting_final: recognition.awaiting_final(),
        }),
    )
        .into_response()
}
