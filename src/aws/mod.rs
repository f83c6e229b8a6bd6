//! AWS request plumbing shared by the Bedrock and Polly clients
//!
//! Both services speak JSON over HTTPS and authenticate with Signature
//! Version 4. This module owns the credential type, the signer and the
//! mapping from AWS error responses onto [`FailureKind`](crate::error::FailureKind).

mod errors;
mod sigv4;

pub use errors::{classify_error, error_type};
pub use sigv4::{SignableRequest, Signer};

use secrecy::{ExposeSecret, SecretString};

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Static AWS credentials
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: SecretString,
    session_token: Option<SecretString>,
}

impl Credentials {
    /// Create credentials from an access key pair
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::from(secret_access_key.into()),
            session_token: None,
        }
    }

    /// Attach a session token (temporary STS credentials)
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(SecretString::from(token.into()));
        self
    }

    /// Access key identifier
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub(crate) fn secret_access_key(&self) -> &str {
        self.secret_access_key.expose_secret()
    }

    pub(crate) fn session_token(&self) -> Option<&str> {
        self.session_token.as_ref().map(ExposeSecret::expose_secret)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
