//! Relay frame schema shared by the server and the client adapter

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::error::{FailureKind, ServiceFailure};

/// Inbound text frame: `{"text": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptFrame {
    pub text: String,
}

/// Outbound text frame reporting a failed turn or a rejected frame
///
/// Successful turns never produce one of these: their only output is a
/// single binary frame holding the audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "error")]
pub struct ErrorFrame {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    /// Present when the reply was generated but could not be spoken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_text: Option<String>,
}

impl ErrorFrame {
    /// Frame for an undecodable inbound message
    #[must_use]
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self {
            code: "invalid_message".to_string(),
            message: message.into(),
            kind: None,
            reply_text: None,
        }
    }

    /// Rebuild the typed error on the client side
    #[must_use]
    pub fn into_error(self) -> Error {
        let failure = || {
            ServiceFailure::new(self.kind.unwrap_or(FailureKind::Unavailable), self.message.clone())
        };
        match self.code.as_str() {
            "inference_failed" => Error::Inference(failure()),
            "synthesis_failed" => Error::Synthesis {
                failure: failure(),
                reply_text: self.reply_text.clone().unwrap_or_default(),
            },
            "empty_input" => Error::EmptyInput,
            _ => Error::Transport(format!("{}: {}", self.code, self.message)),
        }
    }
}

impl From<&Error> for ErrorFrame {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code().to_string(),
            message: err
                .service_failure()
                .map_or_else(|| err.to_string(), |f| f.message.clone()),
            kind: err.service_failure().map(|f| f.kind),
            reply_text: err.reply_text().map(ToString::to_string),
        }
    }
}
