//! sitegrid-controller — the grid reconciliation engine.
//!
//! Turns one `GridSpec` into one child workload per grid value found on
//! the cluster's node labels, and keeps the two in sync:
//!
//! ```text
//! watch events ──► WorkQueue (deduped by grid key)
//!                     │
//!                     ▼  fixed worker pool
//!                 Reconciler (one pass per key)
//!                     ├── resolver: node labels → grid value set
//!                     ├── expand:   template × value → desired children
//!                     ├── diff:     desired vs observed → plan
//!                     ├── apply:    create, update, delete (best effort)
//!                     └── status:   children → states map, written back
//! ```
//!
//! One pass is a restartable state machine
//! (`Resolving → Diffing → Applying → Aggregating → Idle`); nothing is
//! persisted between passes, so a new event for the same key supersedes
//! stale in-flight work by simply re-running the pass. The queue
//! guarantees at most one in-flight pass per key; distinct grids
//! reconcile fully in parallel.

pub mod client;
pub mod controller;
pub mod diff;
pub mod error;
pub mod expand;
pub mod queue;
pub mod reconciler;
pub mod resolver;
pub mod status;

pub use client::{ObjectClient, TopologyReader};
pub use controller::Controller;
pub use diff::{Plan, plan};
pub use error::{ControllerError, ControllerResult};
pub use expand::expand;
pub use queue::WorkQueue;
pub use reconciler::{ReconcileSummary, Reconciler};
pub use resolver::resolve;
pub use status::aggregate;
