//! Error types for Professora

use std::fmt;

use thiserror::Error;

/// Result type alias for Professora operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Professora
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing credentials, invalid values)
    #[error("configuration error: {0}")]
    Config(String),

    /// Transcript was empty or whitespace-only
    #[error("empty input")]
    EmptyInput,

    /// Inference service returned an error or unusable payload
    #[error("inference failed: {0}")]
    Inference(ServiceFailure),

    /// Synthesis failed after a reply was generated
    #[error("synthesis failed: {failure}")]
    Synthesis {
        /// Reply text produced by the inference step
        reply_text: String,
        /// Underlying synthesis failure
        failure: ServiceFailure,
    },

    /// Connection-level decode or disconnect condition
    #[error("transport error: {0}")]
    Transport(String),

    /// Local audio playback error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Reply text still available to the caller, if any
    ///
    /// Only a synthesis failure carries text: the inference step succeeded
    /// and its reply survives even though no audio was produced.
    #[must_use]
    pub fn reply_text(&self) -> Option<&str> {
        match self {
            Self::Synthesis { reply_text, .. } => Some(reply_text),
            _ => None,
        }
    }

    /// Stable machine-readable code used in wire error payloads
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::Inference(_) => "inference_failed",
            Self::Synthesis { .. } => "synthesis_failed",
            Self::Transport(_) => "transport_error",
            Self::Config(_) => "config_error",
            Self::Audio(_) | Self::Io(_) | Self::Http(_) | Self::Serialization(_) | Self::Toml(_) => {
                "internal_error"
            }
        }
    }

    /// Failure details for per-turn service errors
    #[must_use]
    pub const fn service_failure(&self) -> Option<&ServiceFailure> {
        match self {
            Self::Inference(failure) | Self::Synthesis { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

/// Category of an external service failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Credentials rejected or missing permissions
    Authentication,
    /// Quota exhausted or request rate throttled
    Throttled,
    /// Service rejected the request as malformed
    InvalidRequest,
    /// Service unreachable or returned a server error
    Unavailable,
    /// Call exceeded the configured deadline
    Timeout,
    /// Service answered without usable content
    EmptyResponse,
    /// Response body could not be decoded
    Malformed,
}

impl FailureKind {
    /// Snake-case name, matching the serde representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Throttled => "throttled",
            Self::InvalidRequest => "invalid_request",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::EmptyResponse => "empty_response",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed failure reported by the inference or synthesis service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ServiceFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ServiceFailure {
    /// Create a new failure
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify a transport-level `reqwest` error
    #[must_use]
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_decode() {
            FailureKind::Malformed
        } else {
            FailureKind::Unavailable
        };
        Self::new(kind, err.to_string())
    }
}
