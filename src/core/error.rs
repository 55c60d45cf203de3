//! Error taxonomy for the vault
//!
//! Every fallible operation in the library returns [`VaultError`]. Storage
//! layer errors (SQLite, I/O, bincode) all collapse into
//! [`VaultError::StorageUnavailable`]; the vault never retries internally.

use serde::Serialize;
use thiserror::Error;

use super::item::IndexReport;

/// Result alias used across the library
pub type VaultResult<T> = std::result::Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Dimension mismatch, malformed filter, negative/NaN metrics
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("embedded item not found: id {0}")]
    NotFound(i64),

    /// The vector index and the metadata store disagree. Fatal for the caller.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A batch stopped part way. `report` holds what was committed before the
    /// failure and every item rejected by validation.
    #[error("batch aborted after {} committed item(s): {source}", .report.indexed_count)]
    BatchAborted {
        report: IndexReport,
        source: Box<VaultError>,
    },
}

/// Serializable discriminant of [`VaultError`], used in batch failure reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    ConsistencyViolation,
    StorageUnavailable,
}

impl VaultError {
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::InvalidInput(format!(
            "dimension mismatch: expected {}, got {}",
            expected, actual
        ))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ConsistencyViolation(_) => ErrorKind::ConsistencyViolation,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            Self::BatchAborted { source, .. } => source.kind(),
        }
    }

    /// Partial outcome of an aborted batch
    pub fn partial_report(&self) -> Option<&IndexReport> {
        match self {
            Self::BatchAborted { report, .. } => Some(report),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        Self::StorageUnavailable(format!("sqlite: {}", e))
    }
}

impl From<std::io::Error> for VaultError {
    fn from(e: std::io::Error) -> Self {
        Self::StorageUnavailable(format!("io: {}", e))
    }
}

impl From<bincode::Error> for VaultError {
    fn from(e: bincode::Error) -> Self {
        Self::StorageUnavailable(format!("index encoding: {}", e))
    }
}
