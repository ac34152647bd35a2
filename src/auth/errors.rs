//! Error types for authentication and authorization.

use thiserror::Error;

/// Authentication error type.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password.
    #[error("incorrect email or password")]
    InvalidCredentials,
    /// Token is malformed or its signature does not verify.
    #[error("invalid token")]
    InvalidToken,
    /// Token signature is valid but it has expired.
    #[error("token expired")]
    TokenExpired,
    /// Caller's role is not allowed for the operation.
    #[error("requires one of roles: {0}")]
    Forbidden(String),
    /// Password does not meet the minimum requirements.
    #[error("weak password: {0}")]
    WeakPassword(String),
    /// Stored password hash is not in the expected format.
    #[error("malformed password hash")]
    MalformedHash,
    /// Unknown role name.
    #[error("invalid role: {0}")]
    InvalidRole(String),
    /// Token lifetime cannot be represented.
    #[error("invalid token lifetime")]
    InvalidTtl,
    /// Claims serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result alias for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
