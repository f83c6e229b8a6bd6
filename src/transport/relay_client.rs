//! WebSocket client for a relay server

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::Transport;
use super::wire::{ErrorFrame, TranscriptFrame};
use crate::{Error, Result};

/// Sends transcripts to a relay and waits for one audio frame each
pub struct RelayClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl RelayClient {
    /// Connect to a relay endpoint such as `ws://localhost:8001/ws` or a
    /// `wss://` URL behind TLS
    ///
    /// # Errors
    ///
    /// Returns error if the WebSocket handshake fails
    pub async fn connect(url: &str) -> Result<Self> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| Error::Transport(format!("failed to connect to {url}: {e}")))?;
        tracing::debug!(url, "relay client connected");
        Ok(Self { socket })
    }

    /// Close the connection
    ///
    /// # Errors
    ///
    /// Returns error if the close frame cannot be sent
    pub async fn close(mut self) -> Result<()> {
        self.socket
            .close(None)
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

#[async_trait]
impl Transport for RelayClient {
    async fn deliver(&mut self, transcript: &str) -> Result<Vec<u8>> {
        // The server ignores blank transcripts without answering
        if transcript.trim().is_empty() {
            return Err(Error::EmptyInput);
        }

        let frame = serde_json::to_string(&TranscriptFrame {
            text: transcript.to_string(),
        })?;
        self.socket
            .send(Message::Text(frame))
            .await
            .map_err(|e| Error::Transport(format!("send failed: {e}")))?;

        while let Some(msg) = self.socket.next().await {
            match msg.map_err(|e| Error::Transport(format!("receive failed: {e}")))? {
                Message::Binary(audio) => return Ok(audio),
                Message::Text(text) => {
                    let frame: ErrorFrame = serde_json::from_str(&text).map_err(|e| {
                        Error::Transport(format!("unexpected text frame: {e}"))
                    })?;
                    return Err(frame.into_error());
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        Err(Error::Transport("relay closed the connection".to_string()))
    }
}
