//! Typed outcomes for remote calls
//!
//! [`classify`] turns a status code and body into an [`ApiOutcome`]. Client
//! methods convert outcomes into `Result<T, ApiError>` so callers can use `?`
//! while still matching on the failure kind.

use std::fmt;

use thiserror::Error;

use crate::json;

const NO_ERROR_DETAILS: &str = "No error details";

/// Why a 4xx-or-other response was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    BadRequest,
    NotFound,
    Unexpected,
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClientErrorKind::BadRequest => "bad request",
            ClientErrorKind::NotFound => "not found",
            ClientErrorKind::Unexpected => "unexpected status",
        };
        f.write_str(label)
    }
}

/// Result of one HTTP exchange. Exactly one variant applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOutcome<T> {
    Success(T),
    ClientError {
        code: u16,
        kind: ClientErrorKind,
        message: String,
    },
    ServerError {
        code: u16,
        message: String,
    },
    TransportError {
        message: String,
    },
}

impl<T> ApiOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiOutcome::Success(_))
    }

    /// Transform the success payload, leaving failures untouched
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiOutcome<U> {
        match self {
            ApiOutcome::Success(value) => ApiOutcome::Success(f(value)),
            ApiOutcome::ClientError {
                code,
                kind,
                message,
            } => ApiOutcome::ClientError {
                code,
                kind,
                message,
            },
            ApiOutcome::ServerError { code, message } => {
                ApiOutcome::ServerError { code, message }
            }
            ApiOutcome::TransportError { message } => ApiOutcome::TransportError { message },
        }
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            ApiOutcome::Success(value) => Ok(value),
            ApiOutcome::ClientError {
                code,
                kind,
                message,
            } => Err(ApiError::Client {
                code,
                kind,
                message,
            }),
            ApiOutcome::ServerError { code, message } => Err(ApiError::Server { code, message }),
            ApiOutcome::TransportError { message } => Err(ApiError::Transport(message)),
        }
    }
}

/// Broad failure classes used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// DNS, connect, timeout, IO
    Transport,
    /// Unexpected status code or malformed URL
    Protocol,
    /// Expected field or array absent
    Parse,
    /// The response was well formed but the request cannot be satisfied
    BusinessRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("{kind} (HTTP {code}): {message}")]
    Client {
        code: u16,
        kind: ClientErrorKind,
        message: String,
    },

    #[error("server error (HTTP {code}): {message}")]
    Server { code: u16, message: String },

    #[error("parse failure: {0}")]
    Parse(String),

    #[error("{0}")]
    BusinessRule(String),
}

impl ApiError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ApiError::Transport(_) => FailureKind::Transport,
            ApiError::InvalidEndpoint(_) | ApiError::Client { .. } | ApiError::Server { .. } => {
                FailureKind::Protocol
            }
            ApiError::Parse(_) => FailureKind::Parse,
            ApiError::BusinessRule(_) => FailureKind::BusinessRule,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ApiError::Client {
                kind: ClientErrorKind::NotFound,
                ..
            }
        )
    }
}

/// Map a status code and body to an outcome
pub fn classify(status: u16, body: String) -> ApiOutcome<String> {
    match status {
        200..=299 => ApiOutcome::Success(body),
        400 => ApiOutcome::ClientError {
            code: status,
            kind: ClientErrorKind::BadRequest,
            message: error_message(&body),
        },
        404 => ApiOutcome::ClientError {
            code: status,
            kind: ClientErrorKind::NotFound,
            message: error_message(&body),
        },
        500.. => ApiOutcome::ServerError {
            code: status,
            message: error_message(&body),
        },
        _ => ApiOutcome::ClientError {
            code: status,
            kind: ClientErrorKind::Unexpected,
            message: error_message(&body),
        },
    }
}

/// Human-readable message for an error body: `"error"`, then `"message"`,
/// then the raw body, then a fixed placeholder.
pub fn error_message(body: &str) -> String {
    json::find_string_field(body, "error")
        .or_else(|| json::find_string_field(body, "message"))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                NO_ERROR_DETAILS.to_string()
            } else {
                trimmed.to_string()
            }
        })
}
