//! Domain types for SiteGrid.
//!
//! These types represent the persisted state of grids, their expanded
//! child objects, and cluster nodes. All types are serializable to/from
//! JSON for storage in redb tables and for API payloads.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::labels::{GRID_SELECTOR_LABEL, GRID_UNIQ_KEY_LABEL};

/// Unique identifier for a grid (`{namespace}/{name}`).
pub type GridId = String;

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

/// Build the composite grid id from namespace and name.
pub fn grid_id(namespace: &str, name: &str) -> GridId {
    format!("{namespace}/{name}")
}

// ── Grid ──────────────────────────────────────────────────────────

/// Specification for a grid — one workload template fanned out per
/// distinct value of `grid_uniq_key` found on node labels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridSpec {
    pub id: GridId,
    pub namespace: String,
    pub name: String,
    /// Node label key whose distinct values drive the fan-out.
    pub grid_uniq_key: String,
    /// Selects the child objects this grid owns.
    #[serde(default)]
    pub selector: LabelSelector,
    /// The workload template expanded once per grid value.
    pub template: WorkloadTemplate,
    /// Unix timestamp (seconds) when this spec was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) when this spec was last updated.
    pub updated_at: u64,
}

impl GridSpec {
    /// Build the composite key for the grids table.
    pub fn table_key(&self) -> String {
        grid_id(&self.namespace, &self.name)
    }
}

/// Equality-based label selector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: HashMap<String, String>,
}

impl LabelSelector {
    /// True if every selector label is present with the same value.
    /// An empty selector matches everything.
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}

// ── Workload templates ────────────────────────────────────────────

/// The embedded object template of a grid, tagged by workload kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkloadTemplate {
    Deployment(DeploymentTemplate),
    Service(ServiceTemplate),
}

/// Template for a replicated workload child.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentTemplate {
    pub replicas: u32,
    /// Container image reference.
    pub image: String,
    /// Environment variables injected into each replica.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Extra labels copied onto the child and its pod selector.
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Resource limits per replica.
    #[serde(default)]
    pub resources: Option<ResourceLimits>,
}

/// Template for a service child routing to grid-labeled endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceTemplate {
    pub port: u16,
    pub target_port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Extra labels copied onto the child and its endpoint selector.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

/// Resource limits per workload replica.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceLimits {
    /// Memory limit in bytes.
    pub memory_bytes: u64,
    /// CPU weight (relative, higher = more CPU time).
    pub cpu_weight: u32,
}

// ── Child objects ─────────────────────────────────────────────────

/// Owner reference — the grid a child object belongs to.
///
/// Children carrying an owner are cascade-deleted when the grid is
/// removed from the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnerRef {
    pub grid: GridId,
}

/// One concrete workload object expanded for a specific grid value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChildObject {
    pub id: String,
    pub namespace: String,
    pub name: String,
    /// Object labels. Always carries `sitegrid.io/grid-selector` and
    /// `sitegrid.io/grid-uniq-key` after expansion.
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// The owning grid, if any.
    #[serde(default)]
    pub owner: Option<OwnerRef>,
    /// Server-populated write counter; 0 until first persisted.
    #[serde(default)]
    pub resource_version: u64,
    pub spec: WorkloadSpec,
    /// Server/runtime-populated observed status.
    #[serde(default)]
    pub status: ObjectStatus,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}

impl ChildObject {
    /// Build the composite key for the children table.
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// The grid value this child was expanded for, read from its labels.
    pub fn grid_value(&self) -> Option<&str> {
        self.labels.get(GRID_UNIQ_KEY_LABEL).map(String::as_str)
    }

    /// The name of the grid that produced this child, read from its labels.
    pub fn grid_name(&self) -> Option<&str> {
        self.labels.get(GRID_SELECTOR_LABEL).map(String::as_str)
    }
}

/// Concrete workload spec of a child object, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkloadSpec {
    Deployment(DeploymentWorkload),
    Service(ServiceWorkload),
}

/// Expanded replicated-workload spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentWorkload {
    pub replicas: u32,
    pub image: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Pod selector labels — only matches pods carrying the grid labels.
    pub selector: HashMap<String, String>,
    /// Node label requirements pinning replicas to the child's site.
    pub node_affinity: HashMap<String, String>,
    #[serde(default)]
    pub resources: Option<ResourceLimits>,
}

/// Expanded service spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceWorkload {
    pub port: u16,
    pub target_port: u16,
    pub protocol: String,
    /// Endpoint selector labels — only matches the grid-value endpoints.
    pub selector: HashMap<String, String>,
}

// ── Status ────────────────────────────────────────────────────────

/// Observed status of a single child object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ObjectStatus {
    pub replicas: u32,
    pub ready_replicas: u32,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Aggregate status of a grid, keyed by grid value.
///
/// `states` is a `BTreeMap` so serialized status is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GridStatus {
    #[serde(default)]
    pub states: BTreeMap<String, ObjectStatus>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// A typed condition with a human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub kind: ConditionKind,
    pub message: String,
    /// Unix timestamp (seconds) when this condition was observed.
    pub observed_at: u64,
}

/// Classes of conditions surfaced on a grid's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// Last reconcile pass applied cleanly.
    Ready,
    /// The topology read layer was unavailable.
    ResolveFailed,
    /// The embedded template failed local validation; not retried.
    InvalidTemplate,
    /// One or more child operations failed in the last pass.
    ApplyFailed,
}

// ── Nodes ─────────────────────────────────────────────────────────

/// A topology entity. Grid values are derived from node labels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeInfo {
    pub id: NodeId,
    /// Arbitrary labels; the grid's `grid_uniq_key` is looked up here.
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default = "default_ready")]
    pub ready: bool,
    /// Unix timestamp of last heartbeat.
    #[serde(default)]
    pub last_heartbeat: u64,
}

fn default_ready() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_grid(namespace: &str, name: &str) -> GridSpec {
        GridSpec {
            id: grid_id(namespace, name),
            namespace: namespace.to_string(),
            name: name.to_string(),
            grid_uniq_key: "zone".to_string(),
            selector: LabelSelector::default(),
            template: WorkloadTemplate::Deployment(DeploymentTemplate {
                replicas: 2,
                image: "registry.local/web:1.0".to_string(),
                env: HashMap::new(),
                labels: HashMap::new(),
                resources: None,
            }),
            created_at: 1000,
            updated_at: 1000,
        }
    }

    #[test]
    fn grid_table_key_is_namespace_name() {
        let grid = test_grid("default", "web");
        assert_eq!(grid.table_key(), "default/web");
    }

    #[test]
    fn selector_matches_superset() {
        let mut selector = LabelSelector::default();
        selector
            .match_labels
            .insert("app".to_string(), "web".to_string());

        let mut labels = HashMap::new();
        labels.insert("app".to_string(), "web".to_string());
        labels.insert("tier".to_string(), "edge".to_string());

        assert!(selector.matches(&labels));

        labels.insert("app".to_string(), "db".to_string());
        assert!(!selector.matches(&labels));
    }

    #[test]
    fn empty_selector_matches_everything() {
        let selector = LabelSelector::default();
        assert!(selector.matches(&HashMap::new()));
    }

    #[test]
    fn child_grid_labels_roundtrip() {
        let mut labels = HashMap::new();
        labels.insert(GRID_SELECTOR_LABEL.to_string(), "web".to_string());
        labels.insert(GRID_UNIQ_KEY_LABEL.to_string(), "east".to_string());

        let child = ChildObject {
            id: "default/web-east".to_string(),
            namespace: "default".to_string(),
            name: "web-east".to_string(),
            labels,
            owner: Some(OwnerRef {
                grid: "default/web".to_string(),
            }),
            resource_version: 0,
            spec: WorkloadSpec::Service(ServiceWorkload {
                port: 80,
                target_port: 8080,
                protocol: "tcp".to_string(),
                selector: HashMap::new(),
            }),
            status: ObjectStatus::default(),
            created_at: 1000,
            updated_at: 1000,
        };

        assert_eq!(child.grid_value(), Some("east"));
        assert_eq!(child.grid_name(), Some("web"));
        assert_eq!(child.table_key(), "default/web-east");
    }

    #[test]
    fn template_json_tagging() {
        let grid = test_grid("default", "web");
        let json = serde_json::to_string(&grid).unwrap();
        assert!(json.contains("\"kind\":\"deployment\""));

        let parsed: GridSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, grid);
    }

    #[test]
    fn grid_status_states_are_ordered() {
        let mut status = GridStatus::default();
        status
            .states
            .insert("west".to_string(), ObjectStatus::default());
        status
            .states
            .insert("east".to_string(), ObjectStatus::default());

        let keys: Vec<&String> = status.states.keys().collect();
        assert_eq!(keys, ["east", "west"]);
    }
}
