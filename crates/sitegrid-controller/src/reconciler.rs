//! The reconcile pass — one full resolve → diff → apply → aggregate
//! cycle for a single grid key.
//!
//! A pass is a restartable state machine; nothing persists between
//! passes, so partial application from an interrupted pass is simply
//! corrected by the next one. Per-child apply errors are isolated: one
//! failing child never blocks the rest of the plan, and the pass
//! reports the aggregate failure for the queue to back off on.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use sitegrid_core::{
    ChildObject, Condition, ConditionKind, GRID_SELECTOR_LABEL, GridSpec, validate_grid,
};
use sitegrid_store::StoreError;

use crate::client::{ObjectClient, TopologyReader};
use crate::diff::{self, Plan};
use crate::error::{ControllerError, ControllerResult};
use crate::expand::expand;
use crate::resolver::resolve;
use crate::status::aggregate;

/// Phases of a single reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolving,
    Diffing,
    Applying,
    Aggregating,
    Idle,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Resolving => "resolving",
            Phase::Diffing => "diffing",
            Phase::Applying => "applying",
            Phase::Aggregating => "aggregating",
            Phase::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub grid_values: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// True when the plan was already empty — desired equals observed.
    pub converged: bool,
}

#[derive(Default)]
struct ApplyOutcome {
    created: usize,
    updated: usize,
    deleted: usize,
    errors: Vec<StoreError>,
    retry_after: Option<Duration>,
}

impl ApplyOutcome {
    fn record(&mut self, err: StoreError) {
        if let StoreError::Throttled { retry_after_ms } = &err {
            let hint = Duration::from_millis(*retry_after_ms);
            self.retry_after = Some(self.retry_after.map_or(hint, |h| h.max(hint)));
        }
        self.errors.push(err);
    }
}

/// Runs reconcile passes against an injected client.
pub struct Reconciler<C> {
    client: Arc<C>,
    conflict_retries: u32,
}

impl<C: ObjectClient + TopologyReader> Reconciler<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            conflict_retries: 3,
        }
    }

    /// Override the bounded immediate-retry count for write conflicts.
    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    /// Run one full pass for `key`.
    pub fn reconcile(&self, key: &str) -> ControllerResult<ReconcileSummary> {
        let Some(grid) = self.client.get_grid(key)? else {
            // Grid deleted; its children went with it (owner refs).
            debug!(%key, "grid gone, nothing to reconcile");
            return Ok(ReconcileSummary {
                converged: true,
                ..Default::default()
            });
        };

        if let Err(e) = validate_grid(&grid) {
            warn!(%key, error = %e, "template failed local validation");
            self.record_failure(&grid, ConditionKind::InvalidTemplate, &e.to_string());
            return Err(ControllerError::Expansion(e));
        }

        let mut phase = Phase::Resolving;
        debug!(%key, %phase, "pass started");
        let values = match resolve(self.client.as_ref(), &grid.grid_uniq_key) {
            Ok(values) => values,
            Err(e) => {
                self.record_failure(&grid, ConditionKind::ResolveFailed, &e.to_string());
                return Err(e);
            }
        };

        let desired: Vec<ChildObject> = values.iter().map(|v| expand(&grid, v)).collect();
        let observed = self.list_observed(&grid)?;

        phase = Phase::Diffing;
        let plan = diff::plan(&grid.name, &desired, &observed);
        let converged = plan.is_empty();
        let total = plan.len();
        debug!(
            %key, %phase,
            create = plan.create.len(),
            update = plan.update.len(),
            delete = plan.delete.len(),
            "plan computed"
        );

        phase = Phase::Applying;
        let outcome = self.apply(&plan);

        phase = Phase::Aggregating;
        let live = self.list_observed(&grid)?;
        let conditions = match outcome.errors.first() {
            None => vec![condition(ConditionKind::Ready, "all children reconciled")],
            Some(first) => vec![condition(ConditionKind::ApplyFailed, &first.to_string())],
        };
        let status = aggregate(&live, conditions);
        self.client.put_grid_status(key, &status)?;

        phase = Phase::Idle;
        if !outcome.errors.is_empty() {
            let first = outcome.errors[0].to_string();
            warn!(
                %key, %phase,
                failed = outcome.errors.len(),
                total,
                error = %first,
                "pass applied with failures"
            );
            return Err(ControllerError::Apply {
                failed: outcome.errors.len(),
                total,
                first,
                retry_after: outcome.retry_after,
            });
        }

        let summary = ReconcileSummary {
            grid_values: values.len(),
            created: outcome.created,
            updated: outcome.updated,
            deleted: outcome.deleted,
            converged,
        };
        if converged {
            debug!(%key, %phase, values = summary.grid_values, "already converged");
        } else {
            info!(
                %key, %phase,
                values = summary.grid_values,
                created = summary.created,
                updated = summary.updated,
                deleted = summary.deleted,
                "pass complete"
            );
        }
        Ok(summary)
    }

    /// Children are observed through the grid's own selector plus the
    /// well-known grid-selector label (which expansion always injects).
    fn list_observed(&self, grid: &GridSpec) -> ControllerResult<Vec<ChildObject>> {
        let mut selector: Vec<(&str, &str)> = vec![(GRID_SELECTOR_LABEL, &grid.name)];
        for (k, v) in &grid.selector.match_labels {
            selector.push((k.as_str(), v.as_str()));
        }
        Ok(self
            .client
            .list_children_selected(&grid.namespace, &selector)?)
    }

    /// Apply creates, then updates, then deletes. Every operation is
    /// independent; failures are collected, not propagated mid-loop.
    fn apply(&self, plan: &Plan) -> ApplyOutcome {
        let mut out = ApplyOutcome::default();

        for child in &plan.create {
            match self.client.create_child(child) {
                Ok(_) => out.created += 1,
                Err(StoreError::AlreadyExists(key)) => {
                    // Raced with an earlier partial pass; the next diff
                    // will reconcile whatever is actually stored.
                    debug!(%key, "create skipped, already exists");
                }
                Err(e) => out.record(e),
            }
        }

        for child in &plan.update {
            match self.update_with_retry(child) {
                Ok(true) => out.updated += 1,
                Ok(false) => {
                    debug!(key = %child.table_key(), "update target vanished mid-pass");
                }
                Err(e) => out.record(e),
            }
        }

        for key in &plan.delete {
            match self.client.delete_child(key) {
                Ok(existed) => {
                    if existed {
                        out.deleted += 1;
                    }
                }
                Err(StoreError::NotFound(_)) => {}
                Err(e) => out.record(e),
            }
        }

        out
    }

    /// Update with bounded conflict retries. On each conflict the
    /// current object is re-read and its version (and runtime status)
    /// carried forward. Returns Ok(false) if the target disappeared.
    fn update_with_retry(&self, child: &ChildObject) -> Result<bool, StoreError> {
        let mut next = child.clone();
        let mut attempt = 0;
        loop {
            match self.client.update_child(&next) {
                Ok(_) => return Ok(true),
                Err(StoreError::NotFound(_)) => return Ok(false),
                Err(e @ StoreError::Conflict { .. }) => {
                    if attempt >= self.conflict_retries {
                        return Err(e);
                    }
                    attempt += 1;
                    let Some(current) = self.client.get_child(&child.table_key())? else {
                        return Ok(false);
                    };
                    debug!(
                        key = %child.table_key(),
                        attempt,
                        version = current.resource_version,
                        "write conflict, retrying with current version"
                    );
                    next.resource_version = current.resource_version;
                    next.status = current.status;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Best-effort status write for a pass that failed before applying
    /// anything. Secondary failures are logged, never masked over the
    /// original error.
    fn record_failure(&self, grid: &GridSpec, kind: ConditionKind, message: &str) {
        let live = self.list_observed(grid).unwrap_or_default();
        let status = aggregate(&live, vec![condition(kind, message)]);
        if let Err(e) = self.client.put_grid_status(&grid.table_key(), &status) {
            warn!(key = %grid.table_key(), error = %e, "failed to record error condition");
        }
    }
}

fn condition(kind: ConditionKind, message: &str) -> Condition {
    Condition {
        kind,
        message: message.to_string(),
        observed_at: epoch_secs(),
    }
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
