//! Grid value resolution — node labels → the current fan-out set.
//!
//! The set of live grid values is derived, never persisted: it is
//! recomputed from topology on every pass. Duplicate label values
//! collapse to one; an empty result is a valid answer (it means
//! "delete all children"), not an error.

use std::collections::BTreeSet;

use tracing::debug;

use crate::client::TopologyReader;
use crate::error::{ControllerError, ControllerResult};

/// Resolve the distinct values of `grid_uniq_key` across all nodes.
///
/// Only non-empty label values count. Fails with
/// [`ControllerError::Resolve`] when the read layer itself is
/// unavailable — never on "no matches".
pub fn resolve<T: TopologyReader + ?Sized>(
    topology: &T,
    grid_uniq_key: &str,
) -> ControllerResult<BTreeSet<String>> {
    let nodes = topology
        .list_nodes()
        .map_err(|e| ControllerError::Resolve(e.to_string()))?;

    let mut values = BTreeSet::new();
    for node in &nodes {
        if let Some(value) = node.labels.get(grid_uniq_key) {
            if !value.is_empty() {
                values.insert(value.clone());
            }
        }
    }

    debug!(key = grid_uniq_key, count = values.len(), "grid values resolved");
    Ok(values)
}
