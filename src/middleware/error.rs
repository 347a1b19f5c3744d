use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::Error;

/// Authentication errors for the middleware layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed or missing request parameter (bad `mccmnc`, no `state`).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forged or replayed request (state or subject mismatch).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The provider refused, or its tokens or claims failed validation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Carrier or provider endpoint unreachable or misbehaving.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Config(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (status, "Internal error").into_response()
            }
            Self::Upstream(_) => {
                tracing::error!(error = %self, "Carrier endpoint failure");
                (status, self.to_string()).into_response()
            }
            _ => {
                tracing::warn!(error = %self, status = status.as_u16(), "Auth request rejected");
                (status, self.to_string()).into_response()
            }
        }
    }
}

impl From<Error> for AuthError {
    fn from(e: Error) -> Self {
        let msg = e.to_string();
        match e {
            Error::InvalidMccmnc(_) | Error::MissingParameter(_) | Error::ClientNotAllowed(_) => {
                Self::BadRequest(msg)
            }
            Error::Authorization(_) => Self::Forbidden(msg),
            Error::TokenValidation(_) | Error::UserInfo(_) | Error::TokenEndpoint(_) => {
                Self::Unauthorized(msg)
            }
            Error::Discovery(_) | Error::Http(_) | Error::Json(_) => Self::Upstream(msg),
            Error::Configuration(_) | Error::Url(_) => Self::Config(msg),
        }
    }
}
