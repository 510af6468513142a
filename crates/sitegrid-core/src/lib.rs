//! sitegrid-core — domain types for the SiteGrid control plane.
//!
//! A **Grid** describes one workload template to be fanned out into one
//! concrete child object per site/zone value ("grid value") found on the
//! cluster's node labels. This crate holds the serde types shared by the
//! store, the controller, and the REST API:
//!
//! - [`GridSpec`] — the parent resource (template + selector + grid key)
//! - [`ChildObject`] — one expanded workload instance per grid value
//! - [`GridStatus`] — per-value status rollup written by the controller
//! - [`NodeInfo`] — topology entity carrying the grid value labels
//!
//! All types are JSON-serializable for storage and API payloads.

pub mod config;
pub mod labels;
pub mod types;
pub mod validate;

pub use config::{ControllerTuning, SiteGridConfig};
pub use labels::{GRID_SELECTOR_LABEL, GRID_UNIQ_KEY_LABEL};
pub use types::*;
pub use validate::{ValidationError, validate_grid};
