//! Error taxonomy for the memory core.
//!
//! Every core operation returns [`MemoryResult`]. The variants are deliberately
//! coarse so the tool layer can tell a caller *what kind* of failure happened
//! without leaking SQLite or ONNX internals.

use thiserror::Error;

pub type MemoryResult<T> = Result<T, MemoryError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The embedding model could not be loaded or failed while running.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// Delete target or rename source does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rename target already holds entries, or an id is already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed input, rejected before touching the store.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The database could not be opened, read, or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl MemoryError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

impl From<rusqlite::Error> for MemoryError {
    fn from(e: rusqlite::Error) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(e: serde_json::Error) -> Self {
        Self::StorageUnavailable(format!("corrupt row data: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_errors_map_to_storage_unavailable() {
        let err: MemoryError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.kind(), "storage_unavailable");
    }

    #[test]
    fn display_includes_detail() {
        let err = MemoryError::Conflict("scope 'b' already has entries".into());
        assert_eq!(err.to_string(), "conflict: scope 'b' already has entries");
    }
}
