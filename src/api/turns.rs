//! Request/response turn API
//!
//! The HTTP counterpart of the relay: one POST carries one transcript and
//! returns the reply text with base64 audio. Sessions are addressed by a
//! client-chosen id, kept once a turn has been recorded, and dropped after
//! sitting idle past the configured TTL.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::Error;
use crate::error::FailureKind;
use crate::tutor::Turn;

/// Build turn router, nested under `/api/sessions`
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/{session_id}/turns", post(create_turn))
        .route("/{session_id}/history", get(history))
        .route("/{session_id}", delete(end_session))
        .with_state(state)
}

/// Turn request
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub text: String,
}

/// Successful turn response
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub reply_text: String,
    pub audio_base64: String,
    pub audio_format: &'static str,
    pub mime_type: &'static str,
}

/// Query parameters for the history endpoint
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// One turn as shown in the history
#[derive(Debug, Serialize)]
pub struct TurnSummary {
    pub input_text: String,
    pub reply_text: String,
    pub has_audio: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Turn> for TurnSummary {
    fn from(turn: &Turn) -> Self {
        Self {
            input_text: turn.input_text.clone(),
            reply_text: turn.reply_text.clone(),
            has_audio: turn.has_audio(),
            created_at: turn.created_at,
        }
    }
}

/// History response, oldest turn first
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub total_turns: usize,
    pub turns: Vec<TurnSummary>,
}

/// Run one turn
///
/// Blank text is a no-op answered with `204 No Content`.
async fn create_turn(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<String>,
    Json(request): Json<TurnRequest>,
) -> Result<Response, TurnError> {
    if request.text.trim().is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let handle = state.session(&session_id).await;
    let mut session = handle.lock().await;

    let result = state.orchestrator.process_and_record(&mut session, &request.text).await;
    if session.is_empty() {
        state.discard_if_unused(&session_id, &handle).await;
    }
    drop(session);

    match result {
        Ok(reply) => {
            let format = state.orchestrator.output_format();
            Ok(Json(TurnResponse {
                reply_text: reply.reply_text,
                audio_base64: BASE64.encode(&reply.audio),
                audio_format: format.as_str(),
                mime_type: format.mime_type(),
            })
            .into_response())
        }
        Err(Error::EmptyInput) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(err) => {
            tracing::warn!(session_id = %session_id, code = err.code(), error = %err, "turn failed");
            Err(TurnError::Turn(err))
        }
    }
}

async fn history(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, TurnError> {
    let session = state
        .existing_session(&session_id)
        .await
        .ok_or(TurnError::SessionNotFound)?;
    let session = session.lock().await;

    let limit = query.limit.unwrap_or(state.history_limit);
    Ok(Json(HistoryResponse {
        session_id,
        total_turns: session.len(),
        turns: session.recent(limit).iter().map(TurnSummary::from).collect(),
    }))
}

/// Discard a session and its history
async fn end_session(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, TurnError> {
    let removed = state.sessions.write().await.remove(&session_id);
    if removed.is_none() {
        return Err(TurnError::SessionNotFound);
    }
    tracing::info!(session_id = %session_id, "session ended");
    Ok(StatusCode::NO_CONTENT)
}

/// Turn API errors
#[derive(Debug)]
pub enum TurnError {
    SessionNotFound,
    Turn(Error),
}

impl TurnError {
    fn status(&self) -> StatusCode {
        match self {
            Self::SessionNotFound => StatusCode::NOT_FOUND,
            Self::Turn(err) => match err.service_failure().map(|f| f.kind) {
                Some(FailureKind::Timeout) => StatusCode::GATEWAY_TIMEOUT,
                Some(FailureKind::Throttled) => StatusCode::SERVICE_UNAVAILABLE,
                Some(_) => StatusCode::BAD_GATEWAY,
                None if matches!(err, Error::EmptyInput) => StatusCode::BAD_REQUEST,
                None => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for TurnError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            kind: Option<FailureKind>,
            #[serde(skip_serializing_if = "Option::is_none")]
            reply_text: Option<String>,
        }

        let status = self.status();
        let body = match self {
            Self::SessionNotFound => ErrorBody {
                code: "session_not_found",
                message: "no such session".to_string(),
                kind: None,
                reply_text: None,
            },
            Self::Turn(err) => ErrorBody {
                code: err.code(),
                message: err
                    .service_failure()
                    .map_or_else(|| err.to_string(), |f| f.message.clone()),
                kind: err.service_failure().map(|f| f.kind),
                reply_text: err.reply_text().map(ToString::to_string),
            },
        };

        (status, Json(ErrorResponse { error: body })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceFailure;

    #[test]
    fn timeouts_map_to_gateway_timeout() {
        let err = TurnError::Turn(Error::Inference(ServiceFailure::new(FailureKind::Timeout, "slow")));
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn synthesis_failure_is_bad_gateway() {
        let err = TurnError::Turn(Error::Synthesis {
            reply_text: "Oi!".to_string(),
            failure: ServiceFailure::new(FailureKind::Unavailable, "down"),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn throttling_is_service_unavailable() {
        let err = TurnError::Turn(Error::Inference(ServiceFailure::new(FailureKind::Throttled, "quota")));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
