//! Error taxonomy for authenticated API calls and status classification.

use reqwest::StatusCode;
use serde::Deserialize;

/// Errors surfaced by [`AuthenticatedHttpClient`](super::AuthenticatedHttpClient).
///
/// The type is `Clone` so a single refresh failure can be handed to every
/// request that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// 401 from an authentication endpoint (bad username/password).
    Credential { status: StatusCode, body: String },
    /// The refresh call failed; the user is logged out.
    ReauthenticationFailed(String),
    /// The refresh succeeded but the retried request was rejected again.
    RetryExhausted { path: String },
    /// Any other non-2xx response, passed through unchanged.
    Status { status: StatusCode, body: String },
    /// The request could not be built (bad header, bad URL).
    InvalidRequest(String),
    /// No response was received.
    Transport(String),
    /// A 2xx body did not decode into the requested type.
    Decode(String),
}

impl HttpError {
    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Credential { status, .. } | HttpError::Status { status, .. } => Some(*status),
            HttpError::RetryExhausted { .. } => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    /// True when the caller must treat the user as logged out.
    pub fn is_terminal_auth(&self) -> bool {
        matches!(
            self,
            HttpError::ReauthenticationFailed(_) | HttpError::RetryExhausted { .. }
        )
    }

    /// Extracts the backend's `detail` message from an error body, if present.
    pub fn detail(&self) -> Option<String> {
        #[derive(Deserialize)]
        struct Detail {
            detail: serde_json::Value,
        }

        let body = match self {
            HttpError::Credential { body, .. } | HttpError::Status { body, .. } => body,
            _ => return None,
        };
        let parsed: Detail = serde_json::from_str(body).ok()?;
        match parsed.detail {
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::Credential { .. } => match self.detail() {
                Some(detail) => write!(f, "Authentication failed: {}", detail),
                None => write!(f, "Authentication failed: invalid credentials"),
            },
            HttpError::ReauthenticationFailed(reason) => {
                write!(f, "Session could not be renewed ({}). Please log in again.", reason)
            }
            HttpError::RetryExhausted { path } => write!(
                f,
                "Request to {} was rejected again after renewing the session",
                path
            ),
            HttpError::Status { status, .. } => match self.detail() {
                Some(detail) => write!(f, "HTTP {}: {}", status.as_u16(), detail),
                None => write!(f, "HTTP {} error", status.as_u16()),
            },
            HttpError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            HttpError::Transport(msg) => write!(f, "Request failed: {}", msg),
            HttpError::Decode(msg) => write!(f, "Failed to decode response: {}", msg),
        }
    }
}

impl std::error::Error for HttpError {}

/// How the client should treat a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    /// 401 from an auth endpoint.
    CredentialError,
    /// First 401 on a regular endpoint; enter the refresh flow.
    SessionExpired,
    /// 401 on a request that was already retried.
    RetryExhausted,
    /// Any other error status.
    Failure,
}

/// Classifies a response status.
///
/// `auth_endpoint` marks login/register/refresh style routes that must never
/// enter the refresh flow; `retried` marks a request already resubmitted once.
pub fn classify(status: StatusCode, auth_endpoint: bool, retried: bool) -> Disposition {
    if status.is_success() {
        return Disposition::Success;
    }
    if status != StatusCode::UNAUTHORIZED {
        return Disposition::Failure;
    }
    if auth_endpoint {
        Disposition::CredentialError
    } else if retried {
        Disposition::RetryExhausted
    } else {
        Disposition::SessionExpired
    }
}
