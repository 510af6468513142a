//! The contract the engine requires from the object-store layer.
//!
//! The reconciler never touches storage directly; it goes through these
//! two capabilities, which `GridStore` implements. Tests inject wrappers
//! that fail on demand (conflicts, throttles, unavailable topology).

use sitegrid_core::{ChildObject, GridSpec, GridStatus, NodeInfo};
use sitegrid_store::{GridStore, StoreResult};

/// Read-only access to topology entities.
pub trait TopologyReader: Send + Sync {
    fn list_nodes(&self) -> StoreResult<Vec<NodeInfo>>;
}

/// Read/write access to grids and their children.
///
/// `update_child` carries optimistic-concurrency semantics: the write
/// fails with `StoreError::Conflict` when the caller's resource version
/// is stale, and the caller retries after a re-read.
pub trait ObjectClient: Send + Sync {
    fn get_grid(&self, key: &str) -> StoreResult<Option<GridSpec>>;
    fn list_grids(&self) -> StoreResult<Vec<GridSpec>>;

    fn get_child(&self, key: &str) -> StoreResult<Option<ChildObject>>;
    fn list_children_selected(
        &self,
        namespace: &str,
        selector: &[(&str, &str)],
    ) -> StoreResult<Vec<ChildObject>>;
    fn create_child(&self, child: &ChildObject) -> StoreResult<ChildObject>;
    fn update_child(&self, child: &ChildObject) -> StoreResult<ChildObject>;
    /// Idempotent: deleting an absent child returns `Ok(false)`.
    fn delete_child(&self, key: &str) -> StoreResult<bool>;

    fn put_grid_status(&self, key: &str, status: &GridStatus) -> StoreResult<()>;
}

impl TopologyReader for GridStore {
    fn list_nodes(&self) -> StoreResult<Vec<NodeInfo>> {
        GridStore::list_nodes(self)
    }
}

impl ObjectClient for GridStore {
    fn get_grid(&self, key: &str) -> StoreResult<Option<GridSpec>> {
        GridStore::get_grid(self, key)
    }

    fn list_grids(&self) -> StoreResult<Vec<GridSpec>> {
        GridStore::list_grids(self)
    }

    fn get_child(&self, key: &str) -> StoreResult<Option<ChildObject>> {
        GridStore::get_child(self, key)
    }

    fn list_children_selected(
        &self,
        namespace: &str,
        selector: &[(&str, &str)],
    ) -> StoreResult<Vec<ChildObject>> {
        GridStore::list_children_selected(self, namespace, selector)
    }

    fn create_child(&self, child: &ChildObject) -> StoreResult<ChildObject> {
        GridStore::create_child(self, child)
    }

    fn update_child(&self, child: &ChildObject) -> StoreResult<ChildObject> {
        GridStore::update_child(self, child)
    }

    fn delete_child(&self, key: &str) -> StoreResult<bool> {
        GridStore::delete_child(self, key)
    }

    fn put_grid_status(&self, key: &str, status: &GridStatus) -> StoreResult<()> {
        GridStore::put_grid_status(self, key, status)
    }
}
