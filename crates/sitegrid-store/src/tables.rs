//! redb table definitions for the SiteGrid object store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized
//! domain types). Composite keys follow the pattern `{namespace}/{name}`.

use redb::TableDefinition;

/// Grid specs keyed by `{namespace}/{name}`.
pub const GRIDS: TableDefinition<&str, &[u8]> = TableDefinition::new("grids");

/// Grid status keyed by the owning grid's `{namespace}/{name}`.
pub const GRID_STATUS: TableDefinition<&str, &[u8]> = TableDefinition::new("grid_status");

/// Expanded child objects keyed by `{namespace}/{name}`.
pub const CHILDREN: TableDefinition<&str, &[u8]> = TableDefinition::new("children");

/// Node info keyed by `{node_id}`.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");
