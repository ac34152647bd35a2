//! HTTP error mapping.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::storage::StoreError;
use crate::summary::SummaryError;

/// Error returned by route handlers. Serialized as `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400.
    #[error("{0}")]
    BadRequest(String),
    /// 401.
    #[error("{0}")]
    Unauthorized(String),
    /// 403.
    #[error("{0}")]
    Forbidden(String),
    /// 404.
    #[error("{0}")]
    NotFound(String),
    /// 409.
    #[error("{0}")]
    Conflict(String),
    /// 502: the external summary service failed.
    #[error("{0}")]
    BadGateway(String),
    /// 500. The message is logged, never returned.
    #[error("{0}")]
    Internal(String),
}

/// Convenience result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            Self::Internal(message) => {
                error!(%message, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (status, Json(serde_json::json!({ "detail": detail }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

impl From<SummaryError> for ApiError {
    fn from(err: SummaryError) -> Self {
        match err {
            SummaryError::InvalidInput(message) => Self::BadRequest(message),
            SummaryError::UpstreamSummary(upstream) => {
                let timed_out = upstream.is_timeout();
                warn!(error = %upstream, timed_out, "external summary failed");
                if timed_out {
                    Self::BadGateway("Summary service timed out".to_string())
                } else {
                    Self::BadGateway("Summary service unavailable".to_string())
                }
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized("Incorrect email or password".to_string()),
            AuthError::InvalidToken | AuthError::TokenExpired => {
                Self::Unauthorized("Could not validate credentials".to_string())
            }
            AuthError::Forbidden(_) => Self::Forbidden(err.to_string()),
            AuthError::WeakPassword(_) | AuthError::InvalidRole(_) => Self::BadRequest(err.to_string()),
            AuthError::MalformedHash | AuthError::InvalidTtl | AuthError::Serialization(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => Self::Conflict("Email already registered".to_string()),
            StoreError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::UpstreamError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(SummaryError::InvalidInput("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SummaryError::UpstreamSummary(UpstreamError::Status(500))).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ApiError::from(AuthError::TokenExpired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(AuthError::Forbidden("doctor".into())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::from(StoreError::DuplicateEmail).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(StoreError::NotFound("record")).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(StoreError::InvalidRecord("bad".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_failure_detail() {
        let err = ApiError::from(SummaryError::UpstreamSummary(UpstreamError::Status(503)));
        assert_eq!(err.to_string(), "Summary service unavailable");
    }

    #[test]
    fn test_internal_detail_is_generic() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
