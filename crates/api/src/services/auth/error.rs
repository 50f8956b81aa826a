//! Authentication error types.

use thiserror::Error;

use super::token::TokenError;
use crate::db::RepositoryError;

/// Errors that can occur during sign-up, sign-in and session handling.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("email pattern is invalid: {0}")]
    InvalidEmail(#[from] ri_shop_core::EmailError),

    #[error("email has been used")]
    EmailTaken,

    #[error("username has been used")]
    UsernameTaken,

    #[error("username is required")]
    InvalidUsername,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    #[error("user not found")]
    UserNotFound,

    #[error("password is invalid")]
    InvalidPassword,

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("oauth session not found")]
    SessionNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    /// Whether the failure is the client's doing rather than the server's.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::PasswordHash | Self::Repository(_) | Self::Token(TokenError::Sign(_))
        )
    }
}
