use super::state::{AppState, SessionHandle};
use crate::call::CallStatus;
use crate::session::{CallController, ScenarioInfo, SessionConfig};
use crate::speech::{SpeechBridge, SpeechCapabilities};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartCallRequest {
    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<String>,

    #[serde(default)]
    pub phone_number: String,

    pub language: String,

    pub scenario: ScenarioRequest,

    /// Overrides the scenario's own difficulty
    pub difficulty: Option<String>,

    pub user_id: Option<String>,

    /// Whether the client can run speech recognition (default: true)
    pub speech: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioRequest {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub context: String,
    pub difficulty: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartCallResponse {
    pub session_id: String,
    pub call_id: Option<String>,
    pub status: CallStatus,
    pub demo_mode: bool,
    pub demo_mode_reason: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct FinalResultRequest {
    pub text: String,
    pub confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct SpeechErrorRequest {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of a 202 while the scorecard is still being produced
#[derive(Debug, Serialize)]
pub struct AnalysisPending {
    pub status: &'static str,
    pub session_id: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn not_found(session_id: &str) -> Response {
    error(
        StatusCode::NOT_FOUND,
        format!("Call session {} not found", session_id),
    )
}

async fn lookup(state: &AppState, session_id: &str) -> Result<SessionHandle, Response> {
    state.get(session_id).await.ok_or_else(|| not_found(session_id))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /calls
/// Start a new practice call
pub async fn start_call(
    State(state): State<AppState>,
    Json(req): Json<StartCallRequest>,
) -> Response {
    if req.language.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "language is required");
    }

    let session_id = req
        .session_id
        .unwrap_or_else(|| format!("call-{}", uuid::Uuid::new_v4()));

    if state.sessions.read().await.contains_key(&session_id) {
        return error(
            StatusCode::CONFLICT,
            format!("Call session {} already exists", session_id),
        );
    }

    info!("Starting practice call: {}", session_id);

    let difficulty = req
        .difficulty
        .or(req.scenario.difficulty)
        .unwrap_or_else(|| "Intermediate".to_string());
    let config = SessionConfig {
        session_id: session_id.clone(),
        phone_number: req.phone_number,
        language: req.language,
        scenario: ScenarioInfo {
            id: req.scenario.id,
            title: req.scenario.title,
            context: req.scenario.context,
        },
        difficulty,
        user_id: req.user_id.unwrap_or_else(|| "anonymous".to_string()),
    };

    let bridge = Arc::new(SpeechBridge::new());
    let capabilities = if req.speech.unwrap_or(true) {
        bridge.capabilities()
    } else {
        SpeechCapabilities::unavailable()
    };

    let controller = CallController::start(config, state.services.clone(), capabilities).await;
    let snapshot = controller.snapshot().await;

    {
        let mut sessions = state.sessions.write().await;
        if sessions.contains_key(&session_id) {
            drop(sessions);
            controller.shutdown().await;
            return error(
                StatusCode::CONFLICT,
                format!("Call session {} already exists", session_id),
            );
        }
        sessions.insert(
            session_id.clone(),
            SessionHandle {
                controller,
                bridge,
            },
        );
    }

    let message = match (snapshot.status, snapshot.demo_mode) {
        (CallStatus::Error, _) => "Call could not be placed".to_string(),
        (_, true) => "Demo call started".to_string(),
        _ => "Call initiated successfully".to_string(),
    };

    (
        StatusCode::OK,
        Json(StartCallResponse {
            session_id,
            call_id: snapshot.call_id,
            status: snapshot.status,
            demo_mode: snapshot.demo_mode,
            demo_mode_reason: snapshot.demo_mode_reason,
            message,
        }),
    )
        .into_response()
}

/// GET /calls/:session_id
pub async fn get_call(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    match lookup(&state, &session_id).await {
        Ok(handle) => Json(handle.controller.snapshot().await).into_response(),
        Err(response) => response,
    }
}

/// POST /calls/:session_id/end
pub async fn end_call(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };
    if !handle.controller.end().await {
        return error(
            StatusCode::CONFLICT,
            format!("Call is {} and cannot be ended", handle.controller.status()),
        );
    }
    info!("Call session {} ended by user", session_id);
    Json(handle.controller.snapshot().await).into_response()
}

/// POST /calls/:session_id/restart
pub async fn restart_call(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };
    if !handle.controller.restart().await {
        return error(
            StatusCode::CONFLICT,
            format!(
                "Call is {}; only failed calls can be restarted",
                handle.controller.status()
            ),
        );
    }
    Json(handle.controller.snapshot().await).into_response()
}

/// GET /calls/:session_id/transcript
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match lookup(&state, &session_id).await {
        Ok(handle) => Json(handle.controller.transcript().await).into_response(),
        Err(response) => response,
    }
}

/// POST /calls/:session_id/transcript
/// Append a typed message
pub async fn post_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };
    if req.text.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "text is required");
    }
    if !handle.controller.send_message(&req.text).await {
        return error(StatusCode::CONFLICT, "Transcript is finalized");
    }
    Json(handle.controller.transcript().await).into_response()
}

/// POST /calls/:session_id/speech/interim
pub async fn speech_interim(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Response {
    match lookup(&state, &session_id).await {
        Ok(handle) => {
            handle.controller.speech_interim(&req.text).await;
            StatusCode::ACCEPTED.into_response()
        }
        Err(response) => response,
    }
}

/// POST /calls/:session_id/speech/final
pub async fn speech_final(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<FinalResultRequest>,
) -> Response {
    match lookup(&state, &session_id).await {
        Ok(handle) => {
            handle
                .controller
                .speech_final(&req.text, req.confidence)
                .await;
            StatusCode::ACCEPTED.into_response()
        }
        Err(response) => response,
    }
}

/// POST /calls/:session_id/speech/error
pub async fn speech_error(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SpeechErrorRequest>,
) -> Response {
    match lookup(&state, &session_id).await {
        Ok(handle) => {
            handle.controller.speech_error(&req.error).await;
            StatusCode::ACCEPTED.into_response()
        }
        Err(response) => response,
    }
}

/// POST /calls/:session_id/speech/end
/// Recognition session ended
pub async fn speech_end(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match lookup(&state, &session_id).await {
        Ok(handle) => {
            handle.controller.speech_ended().await;
            StatusCode::ACCEPTED.into_response()
        }
        Err(response) => response,
    }
}

/// POST /calls/:session_id/speech/spoken
/// Synthesis finished playing
pub async fn speech_spoken(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match lookup(&state, &session_id).await {
        Ok(handle) => {
            handle.controller.speech_spoken().await;
            StatusCode::ACCEPTED.into_response()
        }
        Err(response) => response,
    }
}

/// GET /calls/:session_id/speech/commands
/// Drain pending recognizer/synthesizer commands
pub async fn speech_commands(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match lookup(&state, &session_id).await {
        Ok(handle) => Json(handle.bridge.drain()).into_response(),
        Err(response) => response,
    }
}

/// GET /calls/:session_id/analysis
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };
    if let Some(result) = handle.controller.analysis() {
        return Json(result).into_response();
    }
    match handle.controller.status() {
        CallStatus::Ended => (
            StatusCode::ACCEPTED,
            Json(AnalysisPending {
                status: "pending",
                session_id,
            }),
        )
            .into_response(),
        status => error(
            StatusCode::CONFLICT,
            format!("No analysis while the call is {}", status),
        ),
    }
}

/// DELETE /calls/:session_id
/// Tear down a session and everything it runs
pub async fn delete_call(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let handle = state.sessions.write().await.remove(&session_id);
    match handle {
        Some(handle) => {
            handle.controller.shutdown().await;
            info!("Call session {} removed", session_id);
            StatusCode::NO_CONTENT.into_response()
        }
        None => {
            warn!("Call session {} not found", session_id);
            not_found(&session_id)
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
