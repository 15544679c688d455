use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Error envelope returned by the PhysioFlow API on non-2xx responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized ({0}): {1}")]
    Unauthorized(String, String),
    #[error("forbidden ({0}): {1}")]
    Forbidden(String, String),
    #[error("bad request ({0}): {1}")]
    BadRequest(String, String),
    #[error("not found ({0}): {1}")]
    NotFound(String, String),
    #[error("conflict ({0}): {1}")]
    Conflict(String, String),
    #[error("validation failed ({0}): {1}")]
    Validation(String, String),
    #[error("server error {status} ({code}): {message}")]
    Server {
        status: u16,
        code: String,
        message: String,
    },
    #[error("session expired")]
    SessionExpired,
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("response decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    pub fn session_expired() -> Self {
        ApiError::SessionExpired
    }

    /// Builds the error for a non-2xx response from its status and raw body.
    /// Bodies that are not the JSON error envelope fall back to the reason phrase.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let (code, message) = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(env) => (env.error.code, env.error.message),
            Err(_) => {
                let reason = status.canonical_reason().unwrap_or("unknown").to_string();
                let message = if body.trim().is_empty() {
                    reason.clone()
                } else {
                    body.trim().to_string()
                };
                (reason.to_uppercase().replace(' ', "_"), message)
            }
        };

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(code, message),
            StatusCode::FORBIDDEN => ApiError::Forbidden(code, message),
            StatusCode::BAD_REQUEST => ApiError::BadRequest(code, message),
            StatusCode::NOT_FOUND => ApiError::NotFound(code, message),
            StatusCode::CONFLICT => ApiError::Conflict(code, message),
            StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(code, message),
            other => ApiError::Server {
                status: other.as_u16(),
                code,
                message,
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(..) => Some(401),
            ApiError::Forbidden(..) => Some(403),
            ApiError::BadRequest(..) => Some(400),
            ApiError::NotFound(..) => Some(404),
            ApiError::Conflict(..) => Some(409),
            ApiError::Validation(..) => Some(422),
            ApiError::Server { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            ApiError::SessionExpired | ApiError::Decode(_) | ApiError::Config(_) => None,
        }
    }

    /// Machine-readable code: the server's code when there is one, otherwise a local one.
    pub fn code(&self) -> &str {
        match self {
            ApiError::Unauthorized(code, _)
            | ApiError::Forbidden(code, _)
            | ApiError::BadRequest(code, _)
            | ApiError::NotFound(code, _)
            | ApiError::Conflict(code, _)
            | ApiError::Validation(code, _) => code,
            ApiError::Server { code, .. } => code,
            ApiError::SessionExpired => "SESSION_EXPIRED",
            ApiError::Network(_) => "NETWORK",
            ApiError::Decode(_) => "DECODE",
            ApiError::Config(_) => "CONFIG",
        }
    }
}
