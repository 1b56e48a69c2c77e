use thiserror::Error;

use crate::types::Offset;

#[derive(Error, Debug)]
pub enum BucketError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid blob name: {reason}")]
    Validation { reason: String },

    #[error("Blob '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("Blob {key} not found")]
    NotFound { key: String },

    #[error("No space left in bucket: requested {requested} bytes, {available} bytes free")]
    OutOfSpace { requested: usize, available: usize },

    #[error("Corrupted bucket header: {reason}")]
    CorruptHeader { reason: String },

    #[error("Corrupted blob data at offset {offset}: {reason}")]
    CorruptData { offset: Offset, reason: String },

    #[error("Invalid bucket configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl BucketError {
    pub fn corrupt_data(offset: Offset, reason: impl Into<String>) -> Self {
        BucketError::CorruptData {
            offset,
            reason: reason.into(),
        }
    }

    pub fn corrupt_header(reason: impl Into<String>) -> Self {
        BucketError::CorruptHeader {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BucketError>;
