//! Error types for QuillHub domain values

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),
}
