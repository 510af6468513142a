//! GridStore — redb-backed object store for SiteGrid.
//!
//! Provides typed CRUD over grids, child objects, grid status, and
//! nodes. All values are JSON-serialized into redb's `&[u8]` value
//! columns. The store supports both on-disk and in-memory backends
//! (the latter for testing), publishes a watch event for every
//! mutation, and enforces resource-version optimistic concurrency on
//! child writes.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tokio::sync::broadcast;
use tracing::debug;

use sitegrid_core::{ChildObject, GridSpec, GridStatus, NodeInfo, ObjectStatus};

use crate::error::{StoreError, StoreResult};
use crate::events::{EventKind, WatchEvent};
use crate::tables::*;

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Watch channel capacity. Slow subscribers observe a lagged error and
/// resync by listing.
const WATCH_CAPACITY: usize = 256;

/// Thread-safe object store backed by redb.
#[derive(Clone)]
pub struct GridStore {
    db: Arc<Database>,
    events: broadcast::Sender<WatchEvent>,
}

impl GridStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self::with_db(db)?;
        debug!(?path, "object store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self::with_db(db)?;
        debug!("in-memory object store opened");
        Ok(store)
    }

    fn with_db(db: Database) -> StoreResult<Self> {
        let (events, _) = broadcast::channel(WATCH_CAPACITY);
        let store = Self {
            db: Arc::new(db),
            events,
        };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Subscribe to the watch stream. Every mutation after this call is
    /// observed as a [`WatchEvent`].
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: WatchEvent) {
        // No receivers is fine — the daemon may not have started the
        // controller yet.
        let _ = self.events.send(event);
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(GRIDS).map_err(map_err!(Table))?;
        txn.open_table(GRID_STATUS).map_err(map_err!(Table))?;
        txn.open_table(CHILDREN).map_err(map_err!(Table))?;
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Grids ──────────────────────────────────────────────────────

    /// Insert or update a grid spec.
    pub fn put_grid(&self, spec: &GridSpec) -> StoreResult<()> {
        let key = spec.table_key();
        let value = serde_json::to_vec(spec).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(GRIDS).map_err(map_err!(Table))?;
            existed = table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?
                .is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "grid stored");

        let kind = if existed {
            EventKind::Updated
        } else {
            EventKind::Added
        };
        self.publish(WatchEvent::Grid { kind, id: key });
        Ok(())
    }

    /// Get a grid by `{namespace}/{name}` key.
    pub fn get_grid(&self, key: &str) -> StoreResult<Option<GridSpec>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(GRIDS).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let spec: GridSpec =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(spec))
            }
            None => Ok(None),
        }
    }

    /// List all grids.
    pub fn list_grids(&self) -> StoreResult<Vec<GridSpec>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(GRIDS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let spec: GridSpec =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(spec);
        }
        Ok(results)
    }

    /// Delete a grid by key, cascade-deleting every child that carries
    /// an owner reference to it, along with its status record.
    /// Returns true if the grid existed.
    pub fn delete_grid(&self, key: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        let mut orphans: Vec<ChildObject> = Vec::new();
        {
            let mut grids = txn.open_table(GRIDS).map_err(map_err!(Table))?;
            existed = grids.remove(key).map_err(map_err!(Write))?.is_some();

            let mut status = txn.open_table(GRID_STATUS).map_err(map_err!(Table))?;
            status.remove(key).map_err(map_err!(Write))?;

            let mut children = txn.open_table(CHILDREN).map_err(map_err!(Table))?;
            for entry in children.iter().map_err(map_err!(Read))? {
                let (_, value) = entry.map_err(map_err!(Read))?;
                let child: ChildObject =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                if child.owner.as_ref().is_some_and(|o| o.grid == key) {
                    orphans.push(child);
                }
            }
            for child in &orphans {
                children
                    .remove(child.table_key().as_str())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, cascaded = orphans.len(), "grid deleted");

        if existed {
            self.publish(WatchEvent::Grid {
                kind: EventKind::Deleted,
                id: key.to_string(),
            });
        }
        for child in orphans {
            self.publish(WatchEvent::Child {
                kind: EventKind::Deleted,
                child,
            });
        }
        Ok(existed)
    }

    // ── Grid status ────────────────────────────────────────────────

    /// Write the aggregate status for a grid.
    pub fn put_grid_status(&self, key: &str, status: &GridStatus) -> StoreResult<()> {
        let value = serde_json::to_vec(status).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(GRID_STATUS).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Read the aggregate status for a grid.
    pub fn get_grid_status(&self, key: &str) -> StoreResult<Option<GridStatus>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(GRID_STATUS).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let status: GridStatus =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    // ── Children ───────────────────────────────────────────────────

    /// Create a child object. Fails with `AlreadyExists` if the key is
    /// taken. The stored copy (resource_version = 1) is returned.
    pub fn create_child(&self, child: &ChildObject) -> StoreResult<ChildObject> {
        let key = child.table_key();
        let mut stored = child.clone();
        stored.resource_version = 1;
        let value = serde_json::to_vec(&stored).map_err(map_err!(Serialize))?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CHILDREN).map_err(map_err!(Table))?;
            if table.get(key.as_str()).map_err(map_err!(Read))?.is_some() {
                return Err(StoreError::AlreadyExists(key));
            }
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "child created");

        self.publish(WatchEvent::Child {
            kind: EventKind::Added,
            child: stored.clone(),
        });
        Ok(stored)
    }

    /// Update a child object. The caller's `resource_version` must match
    /// the stored one, otherwise the write fails with `Conflict` and the
    /// caller re-reads. The stored copy (bumped version) is returned.
    pub fn update_child(&self, child: &ChildObject) -> StoreResult<ChildObject> {
        let key = child.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored;
        {
            let mut table = txn.open_table(CHILDREN).map_err(map_err!(Table))?;
            let current: ChildObject = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StoreError::NotFound(key)),
            };

            if current.resource_version != child.resource_version {
                return Err(StoreError::Conflict {
                    key,
                    provided: child.resource_version,
                    current: current.resource_version,
                });
            }

            let mut next = child.clone();
            next.resource_version = current.resource_version + 1;
            next.created_at = current.created_at;
            let value = serde_json::to_vec(&next).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            stored = next;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(key = %stored.table_key(), version = stored.resource_version, "child updated");

        self.publish(WatchEvent::Child {
            kind: EventKind::Updated,
            child: stored.clone(),
        });
        Ok(stored)
    }

    /// Overwrite only a child's observed status, bypassing the spec
    /// version check. This is the write path of the runtime that
    /// actually runs the workload.
    pub fn update_child_status(&self, key: &str, status: &ObjectStatus) -> StoreResult<ChildObject> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored;
        {
            let mut table = txn.open_table(CHILDREN).map_err(map_err!(Table))?;
            let mut current: ChildObject = match table.get(key).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StoreError::NotFound(key.to_string())),
            };
            current.status = status.clone();
            current.resource_version += 1;
            let value = serde_json::to_vec(&current).map_err(map_err!(Serialize))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
            stored = current;
        }
        txn.commit().map_err(map_err!(Transaction))?;

        self.publish(WatchEvent::Child {
            kind: EventKind::Updated,
            child: stored.clone(),
        });
        Ok(stored)
    }

    /// Get a child by `{namespace}/{name}` key.
    pub fn get_child(&self, key: &str) -> StoreResult<Option<ChildObject>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CHILDREN).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let child: ChildObject =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(child))
            }
            None => Ok(None),
        }
    }

    /// Delete a child by key. Returns true if it existed; a missing
    /// child is not an error (idempotent delete).
    pub fn delete_child(&self, key: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed;
        {
            let mut table = txn.open_table(CHILDREN).map_err(map_err!(Table))?;
            removed = match table.remove(key).map_err(map_err!(Write))? {
                Some(guard) => Some(
                    serde_json::from_slice::<ChildObject>(guard.value())
                        .map_err(map_err!(Deserialize))?,
                ),
                None => None,
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed = removed.is_some(), "child deleted");

        match removed {
            Some(child) => {
                self.publish(WatchEvent::Child {
                    kind: EventKind::Deleted,
                    child,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// List children in a namespace whose labels carry all of the given
    /// `(key, value)` pairs.
    pub fn list_children_selected(
        &self,
        namespace: &str,
        selector: &[(&str, &str)],
    ) -> StoreResult<Vec<ChildObject>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CHILDREN).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let child: ChildObject =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if child.namespace != namespace {
                continue;
            }
            let matched = selector
                .iter()
                .all(|(k, v)| child.labels.get(*k).map(String::as_str) == Some(*v));
            if matched {
                results.push(child);
            }
        }
        Ok(results)
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a node.
    pub fn put_node(&self, node: &NodeInfo) -> StoreResult<()> {
        let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            existed = table
                .insert(node.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?
                .is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;

        let kind = if existed {
            EventKind::Updated
        } else {
            EventKind::Added
        };
        self.publish(WatchEvent::Node {
            kind,
            node: node.clone(),
        });
        Ok(())
    }

    /// Get a node by id.
    pub fn get_node(&self, id: &str) -> StoreResult<Option<NodeInfo>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let node: NodeInfo =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// List all nodes.
    pub fn list_nodes(&self) -> StoreResult<Vec<NodeInfo>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let node: NodeInfo =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(node);
        }
        Ok(results)
    }

    /// Delete a node by id. Returns true if it existed.
    pub fn delete_node(&self, id: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            removed = match table.remove(id).map_err(map_err!(Write))? {
                Some(guard) => Some(
                    serde_json::from_slice::<NodeInfo>(guard.value())
                        .map_err(map_err!(Deserialize))?,
                ),
                None => None,
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;

        match removed {
            Some(node) => {
                self.publish(WatchEvent::Node {
                    kind: EventKind::Deleted,
                    node,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
