//! Template expansion — `(grid, value)` → one concrete child object.
//!
//! Expansion is a pure function: no I/O, no clock reads, so expanding
//! the same inputs twice yields byte-for-byte identical objects. The
//! grid's validity is checked separately (`sitegrid_core::validate_grid`)
//! before any expansion happens.
//!
//! Per-kind behavior is dispatched over the template's tagged variant:
//!
//! - **Deployment** — the child's pod selector gets the grid labels, and
//!   a node-affinity requirement pins replicas to nodes carrying
//!   `grid_uniq_key = value`.
//! - **Service** — the child's endpoint selector gets the grid labels;
//!   services have no affinity placeholder.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use sitegrid_core::{
    ChildObject, DeploymentWorkload, GRID_SELECTOR_LABEL, GRID_UNIQ_KEY_LABEL, GridSpec, OwnerRef,
    ServiceWorkload, WorkloadSpec, WorkloadTemplate,
};

/// Object names are DNS-1123 labels: 63 chars max.
const MAX_NAME_LEN: usize = 63;

/// Expand a grid's template for one grid value.
pub fn expand(grid: &GridSpec, value: &str) -> ChildObject {
    let name = child_name(&grid.name, value);
    let labels = grid_labels(grid, value);

    let spec = match &grid.template {
        WorkloadTemplate::Deployment(t) => {
            let mut node_affinity = HashMap::new();
            node_affinity.insert(grid.grid_uniq_key.clone(), value.to_string());
            WorkloadSpec::Deployment(DeploymentWorkload {
                replicas: t.replicas,
                image: t.image.clone(),
                env: t.env.clone(),
                selector: labels.clone(),
                node_affinity,
                resources: t.resources.clone(),
            })
        }
        WorkloadTemplate::Service(t) => WorkloadSpec::Service(ServiceWorkload {
            port: t.port,
            target_port: t.target_port,
            protocol: t.protocol.clone(),
            selector: labels.clone(),
        }),
    };

    ChildObject {
        id: format!("{}/{}", grid.namespace, name),
        namespace: grid.namespace.clone(),
        name,
        labels,
        owner: Some(OwnerRef {
            grid: grid.table_key(),
        }),
        resource_version: 0,
        spec,
        status: Default::default(),
        created_at: grid.updated_at,
        updated_at: grid.updated_at,
    }
}

/// Selector labels, then template labels, then the injected grid
/// labels. The injected labels win on key collisions; selector labels
/// are carried so the grid's own selector always matches its children.
fn grid_labels(grid: &GridSpec, value: &str) -> HashMap<String, String> {
    let template_labels = match &grid.template {
        WorkloadTemplate::Deployment(t) => &t.labels,
        WorkloadTemplate::Service(t) => &t.labels,
    };
    let mut labels = grid.selector.match_labels.clone();
    labels.extend(template_labels.clone());
    labels.insert(GRID_SELECTOR_LABEL.to_string(), grid.name.clone());
    labels.insert(GRID_UNIQ_KEY_LABEL.to_string(), value.to_string());
    labels
}

/// Deterministic child name: `{grid}-{value}`, sanitized to a DNS-1123
/// label. When sanitization loses information (the value contained
/// characters outside `[a-z0-9-]`) or the name overflows 63 chars, a
/// short digest of the raw value keeps distinct values collision-free.
pub fn child_name(grid_name: &str, value: &str) -> String {
    let sanitized = sanitize(value);
    let plain = format!("{grid_name}-{sanitized}");
    if sanitized == value && plain.len() <= MAX_NAME_LEN {
        return plain;
    }

    let digest = Sha256::digest(value.as_bytes());
    let suffix = hex::encode(&digest[..4]);
    let budget = MAX_NAME_LEN - suffix.len() - 1;
    let mut base: String = plain.chars().take(budget).collect();
    while base.ends_with('-') {
        base.pop();
    }
    format!("{base}-{suffix}")
}

fn sanitize(value: &str) -> String {
    let lowered = value.to_lowercase();
    let mapped: String = lowered
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    mapped.trim_matches('-').to_string()
}
