//! Identity subsystem error taxonomy

use super::jwt::TokenError;
use super::password::PasswordError;
use super::store::{DuplicateField, StoreError};
use super::validation::ValidationError;

/// Broad class of an [`AuthError`], used for status mapping and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Conflict,
    Authentication,
    Authorization,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // Caller input
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // Uniqueness
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailAlreadyRegistered,

    // Authentication
    #[error("Invalid email/username or password")]
    InvalidCredentials,
    #[error("Authorization token required")]
    MissingToken,
    #[error("Malformed authorization token")]
    MalformedToken,
    #[error("Token signature is invalid")]
    BadSignature,
    #[error("Token has expired")]
    TokenExpired,

    // Authorization
    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::UsernameTaken | Self::EmailAlreadyRegistered => ErrorClass::Conflict,
            Self::InvalidCredentials
            | Self::MissingToken
            | Self::MalformedToken
            | Self::BadSignature
            | Self::TokenExpired => ErrorClass::Authentication,
            Self::Forbidden => ErrorClass::Authorization,
            Self::Internal(_) => ErrorClass::Internal,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            TokenError::BadSignature => Self::BadSignature,
            TokenError::Malformed => Self::MalformedToken,
            TokenError::WeakSecret | TokenError::Encoding(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(DuplicateField::Username) => Self::UsernameTaken,
            StoreError::Duplicate(DuplicateField::Email) => Self::EmailAlreadyRegistered,
            StoreError::Database(e) => {
                tracing::error!(error = ?e, "Credential store failure");
                Self::Internal("credential store failure".to_string())
            }
            StoreError::Unavailable(msg) => {
                tracing::error!(reason = %msg, "Credential store unavailable");
                Self::Internal("credential store unavailable".to_string())
            }
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooLong => Self::Validation(ValidationError::PasswordTooLong(
                super::password::MAX_PASSWORD_BYTES,
            )),
            PasswordError::Hashing(msg) => Self::Internal(format!("password hashing failed: {}", msg)),
        }
    }
}
