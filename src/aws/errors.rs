//! Mapping of AWS JSON error responses onto failure kinds

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{FailureKind, ServiceFailure};

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Extract the short error code from an `x-amzn-ErrorType` header or
/// `__type` body field
///
/// Values arrive as `ThrottlingException`,
/// `ThrottlingException:http://internal.amazon.com/...` or
/// `com.amazon.coral.service#ThrottlingException`.
#[must_use]
pub fn error_type(raw: &str) -> &str {
    let raw = raw.split(':').next().unwrap_or(raw);
    raw.rsplit('#').next().unwrap_or(raw).trim()
}

/// Build a [`ServiceFailure`] from a non-success AWS response
#[must_use]
pub fn classify_error(status: StatusCode, header_type: Option<&str>, body: &str) -> ServiceFailure {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let code = header_type
        .map(error_type)
        .filter(|c| !c.is_empty())
        .or_else(|| parsed.as_ref().and_then(|b| b.kind.as_deref()).map(error_type))
        .unwrap_or_default()
        .to_string();
    let message = parsed
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.trim().to_string());

    let kind = kind_for(status, &code);
    let message = if code.is_empty() {
        format!("{status}: {message}")
    } else {
        format!("{code} ({status}): {message}")
    };
    ServiceFailure::new(kind, message)
}

fn kind_for(status: StatusCode, code: &str) -> FailureKind {
    match code {
        "UnrecognizedClientException"
        | "AccessDeniedException"
        | "InvalidSignatureException"
        | "ExpiredTokenException"
        | "IncompleteSignature"
        | "MissingAuthenticationToken" => FailureKind::Authentication,
        "ThrottlingException" | "ServiceQuotaExceededException" | "TooManyRequestsException" => {
            FailureKind::Throttled
        }
        "ModelTimeoutException" | "RequestTimeout" => FailureKind::Timeout,
        "ServiceUnavailableException" | "ServiceFailureException" | "InternalServerException"
        | "ModelNotReadyException" => FailureKind::Unavailable,
        _ => match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::Authentication,
            StatusCode::TOO_MANY_REQUESTS => FailureKind::Throttled,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => FailureKind::Timeout,
            s if s.is_server_error() => FailureKind::Unavailable,
            _ => FailureKind::InvalidRequest,
        },
    }
}
