use std::collections::TryReserveError;
use thiserror::Error;

use crate::common::config::BucketId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashTableError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Bucket {0} is not live")]
    InvalidBucketId(BucketId),
    #[error("Splitting bucket {bucket_id} would grow the directory past max depth {max_depth}")]
    DepthExhausted { bucket_id: BucketId, max_depth: u32 },
    #[error("Failed to allocate: {0}")]
    ResourceExhausted(#[from] TryReserveError),
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),
}

pub type Result<T> = std::result::Result<T, HashTableError>;
