//! Status aggregation — live children → the grid's `states` map.
//!
//! Aggregation is idempotent: the same observed child set always yields
//! the same status map. Stale entries disappear simply because the map
//! is rebuilt from scratch each pass; nothing accumulates.

use std::collections::BTreeMap;

use sitegrid_core::{ChildObject, Condition, GridStatus, ObjectStatus, WorkloadSpec};

/// Extract the reportable status of one child, per workload kind.
pub fn extract_status(child: &ChildObject) -> ObjectStatus {
    match &child.spec {
        WorkloadSpec::Deployment(spec) => {
            let mut status = child.status.clone();
            // A child the runtime has not reported on yet still has a
            // desired replica count worth surfacing.
            if status.replicas == 0 {
                status.replicas = spec.replicas;
            }
            status
        }
        WorkloadSpec::Service(_) => child.status.clone(),
    }
}

/// Build the aggregate grid status from the currently observed children.
///
/// `conditions` is the outcome of the pass that just ran; it replaces
/// whatever conditions the previous pass recorded.
pub fn aggregate(children: &[ChildObject], conditions: Vec<Condition>) -> GridStatus {
    let mut states: BTreeMap<String, ObjectStatus> = BTreeMap::new();
    for child in children {
        let Some(value) = child.grid_value() else {
            continue;
        };
        // Mirror the diff tie-break: if duplicates share a value, the
        // smallest name wins.
        match states.get(value) {
            Some(_) if !replaces(children, value, child) => {}
            _ => {
                states.insert(value.to_string(), extract_status(child));
            }
        }
    }

    GridStatus { states, conditions }
}

/// True if `candidate` is the lexicographically-smallest-named child
/// among those sharing `value`.
fn replaces(children: &[ChildObject], value: &str, candidate: &ChildObject) -> bool {
    children
        .iter()
        .filter(|c| c.grid_value() == Some(value))
        .all(|c| candidate.name <= c.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitegrid_core::{
        DeploymentWorkload, GRID_SELECTOR_LABEL, GRID_UNIQ_KEY_LABEL, ServiceWorkload,
    };
    use std::collections::HashMap;

    fn child(name: &str, value: &str, ready: u32) -> ChildObject {
        let mut labels = HashMap::new();
        labels.insert(GRID_SELECTOR_LABEL.to_string(), "web".to_string());
        labels.insert(GRID_UNIQ_KEY_LABEL.to_string(), value.to_string());
        ChildObject {
            id: format!("default/{name}"),
            namespace: "default".to_string(),
            name: name.to_string(),
            labels,
            owner: None,
            resource_version: 1,
            spec: WorkloadSpec::Deployment(DeploymentWorkload {
                replicas: 2,
                image: "registry.local/web:1.0".to_string(),
                env: HashMap::new(),
                selector: HashMap::new(),
                node_affinity: HashMap::new(),
                resources: None,
            }),
            status: ObjectStatus {
                replicas: 2,
                ready_replicas: ready,
                conditions: Vec::new(),
            },
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn states_keys_equal_live_values() {
        let children = [child("web-east", "east", 2), child("web-west", "west", 1)];
        let status = aggregate(&children, Vec::new());

        let keys: Vec<&String> = status.states.keys().collect();
        assert_eq!(keys, ["east", "west"]);
        assert_eq!(status.states["east"].ready_replicas, 2);
        assert_eq!(status.states["west"].ready_replicas, 1);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let children = [child("web-east", "east", 2)];
        let a = aggregate(&children, Vec::new());
        let b = aggregate(&children, Vec::new());
        assert_eq!(a, b);
    }

    #[test]
    fn empty_children_empty_states() {
        let status = aggregate(&[], Vec::new());
        assert!(status.states.is_empty());
    }

    #[test]
    fn unlabeled_children_skipped() {
        let mut stray = child("stray", "east", 2);
        stray.labels.remove(GRID_UNIQ_KEY_LABEL);
        let status = aggregate(&[stray], Vec::new());
        assert!(status.states.is_empty());
    }

    #[test]
    fn duplicate_values_take_smallest_name() {
        let children = [child("web-east-b", "east", 0), child("web-east-a", "east", 2)];
        let status = aggregate(&children, Vec::new());
        assert_eq!(status.states.len(), 1);
        assert_eq!(status.states["east"].ready_replicas, 2);
    }

    #[test]
    fn unreported_deployment_surfaces_desired_replicas() {
        let mut fresh = child("web-east", "east", 0);
        fresh.status = ObjectStatus::default();
        let status = extract_status(&fresh);
        assert_eq!(status.replicas, 2);
        assert_eq!(status.ready_replicas, 0);
    }

    #[test]
    fn service_status_passes_through() {
        let mut svc = child("web-east", "east", 0);
        svc.spec = WorkloadSpec::Service(ServiceWorkload {
            port: 80,
            target_port: 8080,
            protocol: "tcp".to_string(),
            selector: HashMap::new(),
        });
        svc.status = ObjectStatus {
            replicas: 3,
            ready_replicas: 3,
            conditions: Vec::new(),
        };
        assert_eq!(extract_status(&svc).ready_replicas, 3);
    }
}
