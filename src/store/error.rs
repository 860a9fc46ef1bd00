use std::path::PathBuf;

use thiserror::Error;

use super::record::RecordId;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on collection '{collection}' at '{}': {source}", .path.display())]
    Io {
        collection: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Collection '{collection}' is corrupt: {reason}")]
    Corrupt { collection: String, reason: String },

    #[error("Record with id {id} already exists in collection '{collection}'")]
    DuplicateKey { collection: String, id: RecordId },

    #[error("Record with {field} = {value} already exists in collection '{collection}'")]
    DuplicateField {
        collection: String,
        field: String,
        value: String,
    },

    #[error("Invalid record: {reason}")]
    InvalidRecord { reason: String },

    #[error("Invalid collection name '{name}'")]
    InvalidCollection { name: String },

    #[error("Store task failed: {0}")]
    Task(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub(crate) fn io(collection: &str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            collection: collection.to_string(),
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(collection: &str, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            collection: collection.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }

    /// True for failures caused by the caller's input rather than the storage.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::DuplicateKey { .. }
                | Self::DuplicateField { .. }
                | Self::InvalidRecord { .. }
                | Self::InvalidCollection { .. }
        )
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
