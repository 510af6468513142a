//! Watch events published by the store on every mutation.
//!
//! Child and node events carry the full object so the controller can
//! map them back to grid keys (owner label, node label set) without a
//! second read.

use sitegrid_core::{ChildObject, GridId, NodeInfo};

/// What happened to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Updated,
    Deleted,
}

/// A single mutation observed through the store's watch channel.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Grid { kind: EventKind, id: GridId },
    Child { kind: EventKind, child: ChildObject },
    Node { kind: EventKind, node: NodeInfo },
}
