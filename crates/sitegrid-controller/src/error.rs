//! Controller error taxonomy.
//!
//! Classification drives the queue policy: fatal errors are surfaced as
//! a status condition and forgotten, everything else is requeued with
//! exponential backoff (or the server's throttle hint, when one exists).

use std::time::Duration;

use thiserror::Error;

use sitegrid_core::ValidationError;
use sitegrid_store::StoreError;

/// Result type alias for controller operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors that can fail a reconcile pass.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The topology read layer was unavailable. No partial reconcile is
    /// performed; the key is requeued.
    #[error("topology resolve failed: {0}")]
    Resolve(String),

    /// The embedded template failed local validation. Fatal: surfaced
    /// as a status condition, never retried.
    #[error("template invalid: {0}")]
    Expansion(#[from] ValidationError),

    /// A store operation outside the per-child apply loop failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// One or more child operations failed in the pass. The remaining
    /// children were still applied; the key is requeued.
    #[error("{failed} of {total} child operations failed: {first}")]
    Apply {
        failed: usize,
        total: usize,
        /// Message of the first failure, for the status condition.
        first: String,
        /// Largest server-provided throttle hint seen, if any.
        retry_after: Option<Duration>,
    },
}

impl ControllerError {
    /// Fatal errors are recorded and dropped instead of requeued.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ControllerError::Expansion(_))
    }

    /// Server-provided minimum delay before the next attempt.
    pub fn retry_hint(&self) -> Option<Duration> {
        match self {
            ControllerError::Store(StoreError::Throttled { retry_after_ms }) => {
                Some(Duration::from_millis(*retry_after_ms))
            }
            ControllerError::Apply { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
