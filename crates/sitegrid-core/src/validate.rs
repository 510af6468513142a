//! Local grid validation — runs before any store write.
//!
//! A grid that fails validation is never partially applied; the
//! controller surfaces the error as an `InvalidTemplate` condition and
//! drops the key without retrying.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::types::{GridSpec, WorkloadTemplate};

/// DNS-1123 label: lowercase alphanumerics and `-`, 63 chars max.
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$").expect("static regex")
});

/// Errors produced by local grid validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid grid name {0:?}: must be a DNS-1123 label")]
    InvalidName(String),

    #[error("invalid namespace {0:?}: must be a DNS-1123 label")]
    InvalidNamespace(String),

    #[error("grid_uniq_key must not be empty")]
    EmptyGridKey,

    #[error("deployment template has no image")]
    EmptyImage,

    #[error("service template port must be non-zero")]
    ZeroPort,
}

/// Validate a grid spec without touching the store.
pub fn validate_grid(grid: &GridSpec) -> Result<(), ValidationError> {
    if !NAME_RE.is_match(&grid.name) {
        return Err(ValidationError::InvalidName(grid.name.clone()));
    }
    if !NAME_RE.is_match(&grid.namespace) {
        return Err(ValidationError::InvalidNamespace(grid.namespace.clone()));
    }
    if grid.grid_uniq_key.trim().is_empty() {
        return Err(ValidationError::EmptyGridKey);
    }

    match &grid.template {
        WorkloadTemplate::Deployment(t) => {
            if t.image.trim().is_empty() {
                return Err(ValidationError::EmptyImage);
            }
        }
        WorkloadTemplate::Service(t) => {
            if t.port == 0 || t.target_port == 0 {
                return Err(ValidationError::ZeroPort);
            }
        }
    }

    Ok(())
}
