//! Diff planning — desired vs observed children → create/update/delete.
//!
//! Children are matched by `(grid name, grid value)` read from their
//! labels, not by object name, so a renaming strategy change does not
//! orphan existing children. The comparison is semantic: only
//! template-derived fields (spec and injected/template labels) count;
//! server-populated fields (resource version, status, timestamps) and
//! labels added by external systems are ignored.

use std::collections::BTreeMap;

use tracing::debug;

use sitegrid_core::ChildObject;

/// Match key for desired/observed correlation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChildKey {
    pub grid: String,
    pub value: String,
}

impl ChildKey {
    fn of(child: &ChildObject) -> Option<Self> {
        Some(Self {
            grid: child.grid_name()?.to_string(),
            value: child.grid_value()?.to_string(),
        })
    }
}

/// The apply plan for one reconcile pass.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Desired children with no observed counterpart.
    pub create: Vec<ChildObject>,
    /// Observed children whose template-derived fields drifted. Each
    /// entry already carries the observed resource version and status,
    /// ready to be written.
    pub update: Vec<ChildObject>,
    /// Table keys of observed children to remove.
    pub delete: Vec<String>,
}

impl Plan {
    /// An empty plan means the grid has converged.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }
}

/// Compute the plan that drives `observed` to `desired` for the grid
/// named `grid_name`.
///
/// Observed children labeled with a different grid name are never
/// touched, even if the caller's listing leaked them in.
pub fn plan(grid_name: &str, desired: &[ChildObject], observed: &[ChildObject]) -> Plan {
    let mut plan = Plan::default();

    // Index observed by key. Duplicates sharing a key (possible after
    // manual label edits) tie-break on the lexicographically smallest
    // name; the rest are scheduled for deletion. Observed children that
    // carry our selector label but lost their value label cannot be
    // matched and are deleted.
    let mut observed_by_key: BTreeMap<ChildKey, &ChildObject> = BTreeMap::new();
    for child in observed {
        if child.grid_name() != Some(grid_name) {
            debug!(child = %child.table_key(), "foreign child ignored");
            continue;
        }
        let Some(key) = ChildKey::of(child) else {
            debug!(child = %child.table_key(), "unkeyed child scheduled for deletion");
            plan.delete.push(child.table_key());
            continue;
        };
        match observed_by_key.get(&key) {
            Some(kept) if kept.name <= child.name => {
                plan.delete.push(child.table_key());
            }
            Some(kept) => {
                plan.delete.push(kept.table_key());
                observed_by_key.insert(key, child);
            }
            None => {
                observed_by_key.insert(key, child);
            }
        }
    }

    for want in desired {
        let Some(key) = ChildKey::of(want) else {
            // Expansion always labels its output; an unkeyed desired
            // child would be a bug upstream, skip it defensively.
            continue;
        };
        match observed_by_key.remove(&key) {
            None => plan.create.push(want.clone()),
            Some(have) => {
                if spec_drifted(want, have) {
                    let mut next = want.clone();
                    next.name = have.name.clone();
                    next.id = have.id.clone();
                    next.resource_version = have.resource_version;
                    next.status = have.status.clone();
                    next.created_at = have.created_at;
                    plan.update.push(next);
                }
            }
        }
    }

    // Whatever observed keys remain have no desired counterpart: the
    // grid value went away.
    for (_, have) in observed_by_key {
        plan.delete.push(have.table_key());
    }

    plan
}

/// Semantic comparison of template-derived fields.
///
/// Extra labels added to the observed child by external systems do not
/// count as drift; missing or altered template labels do.
fn spec_drifted(want: &ChildObject, have: &ChildObject) -> bool {
    if want.spec != have.spec {
        return true;
    }
    want.labels
        .iter()
        .any(|(k, v)| have.labels.get(k) != Some(v))
}
