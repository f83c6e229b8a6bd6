//! WebSocket relay: one transcript frame in, one audio frame out
//!
//! Each connection owns a private [`Session`] and handles its frames
//! strictly in arrival order: the next frame is not read until the
//! current turn's reply has been sent. Connections are independent of
//! each other.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinError;

use super::ApiState;
use crate::Error;
use crate::transport::{ErrorFrame, TranscriptFrame};
use crate::tutor::{Reply, Session};

/// Lifecycle of one relay connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Upgrade completed, nothing sent yet
    Accepted,
    /// Waiting for the next transcript frame
    AwaitingInput,
    /// A turn is running; no further frames are read
    Processing,
    Closed,
}

/// Inputs that drive [`ConnectionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    /// A non-empty transcript was decoded
    TranscriptAccepted,
    /// The turn's reply (audio or error frame) was produced
    TurnFinished,
    /// Client closed, disconnected, or a send failed
    PeerGone,
    /// The turn task itself failed
    InternalFailure,
}

impl ConnectionState {
    /// Apply one event
    ///
    /// `Closed` is terminal. Events that do not apply to the current
    /// state leave it unchanged.
    #[must_use]
    pub const fn on(self, event: ConnectionEvent) -> Self {
        match (self, event) {
            (Self::Closed, _)
            | (_, ConnectionEvent::PeerGone)
            | (Self::Processing, ConnectionEvent::InternalFailure) => Self::Closed,
            (Self::Accepted, ConnectionEvent::Opened) => Self::AwaitingInput,
            (Self::AwaitingInput, ConnectionEvent::TranscriptAccepted) => Self::Processing,
            (Self::Processing, ConnectionEvent::TurnFinished) => Self::AwaitingInput,
            (state, _) => state,
        }
    }
}

/// Build relay router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ws", get(ws_upgrade)).with_state(state)
}

async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();

    let session_id = uuid::Uuid::new_v4().to_string();
    let session = Arc::new(Mutex::new(Session::new(session_id.clone())));

    let mut conn = ConnectionState::Accepted.on(ConnectionEvent::Opened);
    tracing::info!(session_id = %session_id, "relay connected");

    while conn != ConnectionState::Closed {
        let text = match receiver.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(data))) => {
                tracing::warn!(session_id = %session_id, len = data.len(), "rejected binary frame");
                let frame = ErrorFrame::invalid_message("expected a JSON text frame");
                conn = send_or_close(&mut sender, error_message(&frame), conn).await;
                continue;
            }
            Some(Ok(Message::Ping(data))) => {
                tracing::trace!(len = data.len(), "received ping");
                continue;
            }
            Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) => {
                tracing::info!(session_id = %session_id, "relay closed by client");
                conn = conn.on(ConnectionEvent::PeerGone);
                continue;
            }
            Some(Err(e)) => {
                tracing::debug!(session_id = %session_id, error = %e, "relay receive failed");
                conn = conn.on(ConnectionEvent::PeerGone);
                continue;
            }
            None => {
                conn = conn.on(ConnectionEvent::PeerGone);
                continue;
            }
        };

        let transcript = match serde_json::from_str::<TranscriptFrame>(text.as_str()) {
            Ok(frame) => frame.text,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "rejected malformed frame");
                let frame = ErrorFrame::invalid_message(format!("invalid message: {e}"));
                conn = send_or_close(&mut sender, error_message(&frame), conn).await;
                continue;
            }
        };

        if transcript.trim().is_empty() {
            tracing::debug!(session_id = %session_id, "ignoring empty transcript");
            continue;
        }

        conn = conn.on(ConnectionEvent::TranscriptAccepted);

        let outgoing = match run_turn(&state, &session, transcript).await {
            Ok(Ok(reply)) => {
                conn = conn.on(ConnectionEvent::TurnFinished);
                Message::Binary(reply.audio.into())
            }
            Ok(Err(Error::EmptyInput)) => {
                conn = conn.on(ConnectionEvent::TurnFinished);
                continue;
            }
            Ok(Err(err)) => {
                conn = conn.on(ConnectionEvent::TurnFinished);
                tracing::warn!(session_id = %session_id, code = err.code(), error = %err, "turn failed");
                error_message(&ErrorFrame::from(&err))
            }
            Err(e) => {
                conn = conn.on(ConnectionEvent::InternalFailure);
                tracing::error!(session_id = %session_id, error = %e, "turn task failed");
                error_message(&ErrorFrame {
                    code: "internal_error".to_string(),
                    message: "turn could not be completed".to_string(),
                    kind: None,
                    reply_text: None,
                })
            }
        };

        if sender.send(outgoing).await.is_err() {
            tracing::info!(session_id = %session_id, "client gone before reply was delivered");
            conn = conn.on(ConnectionEvent::PeerGone);
        }
    }

    let _ = sender.close().await;

    let turns = session.lock().await.len();
    tracing::info!(session_id = %session_id, turns, "relay disconnected");
}

/// Run one turn on a detached task
///
/// A client disconnect drops this connection's future but never cancels
/// service calls already in flight; their outcome is still recorded.
async fn run_turn(
    state: &ApiState,
    session: &Arc<Mutex<Session>>,
    transcript: String,
) -> Result<crate::Result<Reply>, JoinError> {
    let orchestrator = Arc::clone(&state.orchestrator);
    let session = Arc::clone(session);

    tokio::spawn(async move {
        let mut session = session.lock().await;
        orchestrator.process_and_record(&mut session, &transcript).await
    })
    .await
}

async fn send_or_close(
    sender: &mut SplitSink<WebSocket, Message>,
    message: Message,
    conn: ConnectionState,
) -> ConnectionState {
    if sender.send(message).await.is_err() {
        conn.on(ConnectionEvent::PeerGone)
    } else {
        conn
    }
}

fn error_message(frame: &ErrorFrame) -> Message {
    let json = serde_json::to_string(frame).unwrap_or_else(|_| {
        r#"{"type":"error","code":"internal_error","message":"unencodable error"}"#.to_string()
    });
    Message::Text(json.into())
}
