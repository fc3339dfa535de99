use thiserror::Error;

use crate::types::Version;

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage unavailable: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid or expired session")]
    InvalidSession,

    #[error("version conflict: expected {expected}, found {}", slot_state(actual))]
    Conflict {
        expected: Version,
        actual: Option<Version>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid permission: {0}")]
    InvalidPermission(String),
}

impl Error {
    /// Storage and I/O failures may succeed on retry; every other variant is
    /// a definite outcome.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }
}

fn slot_state(actual: &Option<Version>) -> String {
    actual.map_or_else(|| "no tiddler".to_string(), |v| v.to_string())
}

pub type Result<T> = std::result::Result<T, Error>;
