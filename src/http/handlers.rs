use super::state::AppState;
use crate::capture::{CaptureDeviceFactory, CaptureSource, CONTENT_TYPE_WEBM};
use crate::catalog::{CatalogEntry, CatalogStats};
use crate::error::{DeleteError, SessionError, StoreError};
use crate::format::format_file_size;
use crate::session::{RecordingSession, SessionStatus, StopOutcome};
use crate::store::StoredObject;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub session_id: String,
    /// "stored" or "ignored"
    pub outcome: String,
    pub stored: Option<StoredObject>,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct RecordingView {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    pub size_display: String,
}

#[derive(Debug, Serialize)]
pub struct ListRecordingsResponse {
    pub recordings: Vec<RecordingView>,
    pub stats: CatalogStats,
    pub total_size_display: String,
}

#[derive(Debug, Deserialize)]
pub struct SignedObjectQuery {
    pub expires: i64,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn session_error_response(e: &SessionError) -> Response {
    let status = match e {
        SessionError::InvalidTransition { .. } => StatusCode::CONFLICT,
        SessionError::Permission(_) => StatusCode::FORBIDDEN,
        SessionError::Upload(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, e)
}

async fn find_session(
    state: &AppState,
    session_id: &str,
) -> Result<Arc<Mutex<RecordingSession>>, Response> {
    let sessions = state.sessions.read().await;
    sessions.get(session_id).cloned().ok_or_else(|| {
        warn!("Session {} not found", session_id);
        error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        )
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions
/// Start a push-driven capture session
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.session_config.renewed();
    let session_id = config.session_id.clone();

    info!("Starting capture session: {}", session_id);

    let device = CaptureDeviceFactory::create(CaptureSource::Push, state.capture_config.clone());
    let mut session = RecordingSession::new(config, state.uploader.clone());

    if let Err(e) = session.start(device).await {
        error!("Failed to start session {}: {}", session_id, e);
        return session_error_response(&e);
    }

    let status = session.status();
    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(session_id.clone(), Arc::new(Mutex::new(session)));
    }

    (
        StatusCode::CREATED,
        Json(StartSessionResponse { session_id, status }),
    )
        .into_response()
}

/// POST /sessions/:session_id/chunks
/// Append one fragment (raw request body)
pub async fn append_chunk(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    let session = match find_session(&state, &session_id).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let mut session = session.lock().await;
    match session.on_chunk(body.to_vec()) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => session_error_response(&e),
    }
}

/// POST /sessions/:session_id/stop
/// Finalize the recording and upload it
pub async fn stop_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let session = match find_session(&state, &session_id).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let mut session = session.lock().await;
    let (outcome, stored) = match session.stop().await {
        Ok(StopOutcome::Stored(stored)) => ("stored", Some(stored)),
        Ok(StopOutcome::Ignored(_)) => ("ignored", None),
        Err(e) => {
            error!("Failed to stop session {}: {}", session_id, e);
            return session_error_response(&e);
        }
    };

    (
        StatusCode::OK,
        Json(StopSessionResponse {
            session_id: session_id.clone(),
            outcome: outcome.to_string(),
            stored,
            status: session.status(),
        }),
    )
        .into_response()
}

/// GET /sessions/:session_id
/// Get status of a capture session
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match find_session(&state, &session_id).await {
        Ok(session) => {
            let status = session.lock().await.status();
            (StatusCode::OK, Json(status)).into_response()
        }
        Err(response) => response,
    }
}

/// GET /sessions/:session_id/blob
/// Download the finalized clip from memory, whether or not it was uploaded
pub async fn get_session_blob(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let session = match find_session(&state, &session_id).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let session = session.lock().await;
    match (session.final_blob(), session.local_file_name()) {
        (Some(blob), Some(file_name)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, CONTENT_TYPE_WEBM.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file_name),
                ),
            ],
            blob.to_vec(),
        )
            .into_response(),
        _ => error_response(
            StatusCode::CONFLICT,
            format!(
                "Session {} has no finalized recording (state {})",
                session_id,
                session.state()
            ),
        ),
    }
}

/// DELETE /sessions/:session_id
/// Discard a session and its local clip
pub async fn discard_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let removed = {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&session_id)
    };

    match removed {
        Some(_) => {
            info!("Discarded session {}", session_id);
            StatusCode::NO_CONTENT.into_response()
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        ),
    }
}

/// GET /recordings
/// Refresh the catalog from the store and list it
pub async fn list_recordings(State(state): State<AppState>) -> impl IntoResponse {
    match state.catalog.refresh().await {
        Ok(entries) => {
            let stats = state.catalog.stats();
            let recordings = entries
                .into_iter()
                .map(|entry| RecordingView {
                    size_display: format_file_size(entry.object.size),
                    entry,
                })
                .collect();

            (
                StatusCode::OK,
                Json(ListRecordingsResponse {
                    recordings,
                    total_size_display: format_file_size(stats.total_size),
                    stats,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e),
    }
}

/// DELETE /recordings/*key
/// Delete a stored recording
pub async fn delete_recording(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match state.catalog.delete(&key).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e @ DeleteError::InProgress(_)) => error_response(StatusCode::CONFLICT, e),
        Err(
            e @ DeleteError::Store {
                source: StoreError::NotFound(_),
                ..
            },
        ) => error_response(StatusCode::NOT_FOUND, e),
        Err(
            e @ DeleteError::Store {
                source: StoreError::InvalidKey(_),
                ..
            },
        ) => error_response(StatusCode::BAD_REQUEST, e),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e),
    }
}

/// GET /objects/*key?expires=..&signature=..
/// Serve an object through a signed URL
pub async fn serve_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedObjectQuery>,
) -> impl IntoResponse {
    let Some(store) = state.signed_objects.as_ref() else {
        return error_response(StatusCode::NOT_FOUND, "Signed URLs are not served here");
    };

    if !store.verify(&key, query.expires, &query.signature, Utc::now()) {
        warn!("Rejected signed URL for {}", key);
        return error_response(StatusCode::FORBIDDEN, "Invalid or expired signature");
    }

    match store.read(&key).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, CONTENT_TYPE_WEBM)],
            bytes,
        )
            .into_response(),
        Err(e @ StoreError::NotFound(_)) => error_response(StatusCode::NOT_FOUND, e),
        Err(e @ StoreError::InvalidKey(_)) => error_response(StatusCode::BAD_REQUEST, e),
        Err(e) => {
            error!("Failed to read {}: {}", key, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
