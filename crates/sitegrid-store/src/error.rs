//! Error types for the SiteGrid object store.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
///
/// `Conflict`, `NotFound`, `AlreadyExists`, and `Throttled` are part of
/// the client contract the controller programs against: a conflict is
/// retried after a re-read, a missing object on delete is treated as
/// success, and a throttle hint bounds the requeue delay.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("write conflict on {key}: stale resource version {provided}, current {current}")]
    Conflict {
        key: String,
        provided: u64,
        current: u64,
    },

    #[error("request throttled, retry after {retry_after_ms}ms")]
    Throttled { retry_after_ms: u64 },
}
