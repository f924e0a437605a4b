use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use solprod_shared::ErrorBody;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a model client.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider response was malformed: {0}")]
    Malformed(String),
    #[error("provider returned no reply text")]
    EmptyReply,
    #[error("provider blocked the prompt: {0}")]
    Blocked(String),
    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayErrorKind {
    Validation,
    Translation,
    Provider,
}

impl fmt::Display for RelayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayErrorKind::Validation => "validation",
            RelayErrorKind::Translation => "translation",
            RelayErrorKind::Provider => "provider",
        };
        f.write_str(name)
    }
}

/// Why a chat request could not be relayed.
///
/// Translation and provider failures share one HTTP shape (500 with the
/// message as `detail`); only validation failures are reported as client
/// errors.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RelayError {
    pub kind: RelayErrorKind,
    pub message: String,
}

impl RelayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: RelayErrorKind::Validation,
            message: message.into(),
        }
    }

    pub fn translation(message: impl Into<String>) -> Self {
        Self {
            kind: RelayErrorKind::Translation,
            message: message.into(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self {
            kind: RelayErrorKind::Provider,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            RelayErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            RelayErrorKind::Translation | RelayErrorKind::Provider => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ProviderError> for RelayError {
    fn from(err: ProviderError) -> Self {
        RelayError::provider(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorBody { detail: self.message })).into_response()
    }
}
