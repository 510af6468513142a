//! Controller — the event-driven loop around the reconciler.
//!
//! Watches the store's event stream, maps every event back to the grid
//! keys it affects, and drains the deduplicated work queue with a fixed
//! pool of workers. Each worker runs full passes via [`Reconciler`];
//! failed keys come back with exponential backoff, fatal keys are
//! dropped after their condition is recorded.
//!
//! Shutdown follows the `watch`-channel pattern: flipping the signal
//! stops the router, the resync loop, and every worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use sitegrid_core::{ControllerTuning, grid_id};
use sitegrid_store::{EventKind, WatchEvent};

use crate::client::{ObjectClient, TopologyReader};
use crate::queue::WorkQueue;
use crate::reconciler::Reconciler;

/// The grid controller. Owns the queue and the worker pool.
pub struct Controller<C> {
    client: Arc<C>,
    tuning: ControllerTuning,
    queue: Arc<WorkQueue>,
}

impl<C: ObjectClient + TopologyReader + 'static> Controller<C> {
    pub fn new(client: Arc<C>, tuning: ControllerTuning) -> Self {
        let queue = WorkQueue::new(
            Duration::from_millis(tuning.backoff_base_ms),
            Duration::from_millis(tuning.backoff_max_ms),
        );
        Self {
            client,
            tuning,
            queue,
        }
    }

    /// Handle to the queue, for manual enqueueing (tests, admin nudges).
    pub fn queue(&self) -> Arc<WorkQueue> {
        Arc::clone(&self.queue)
    }

    /// Run until the shutdown signal flips (or its sender is dropped).
    pub async fn run(
        self,
        mut events: broadcast::Receiver<WatchEvent>,
        shutdown: watch::Receiver<bool>,
    ) {
        let Self {
            client,
            tuning,
            queue,
        } = self;
        info!(workers = tuning.workers, "grid controller starting");

        // Seed with every existing grid so a restart converges without
        // waiting for fresh events.
        enqueue_all(client.as_ref(), &queue);

        let mut handles = Vec::new();

        // Event router.
        {
            let client = Arc::clone(&client);
            let queue = Arc::clone(&queue);
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        event = events.recv() => match event {
                            Ok(event) => route_event(client.as_ref(), &queue, event),
                            Err(broadcast::error::RecvError::Lagged(missed)) => {
                                warn!(missed, "watch stream lagged, resyncing all grids");
                                enqueue_all(client.as_ref(), &queue);
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        },
                        _ = shutdown.changed() => break,
                    }
                }
                debug!("event router stopped");
            }));
        }

        // Periodic resync.
        if tuning.resync_interval_secs > 0 {
            let client = Arc::clone(&client);
            let queue = Arc::clone(&queue);
            let mut shutdown = shutdown.clone();
            let interval = Duration::from_secs(tuning.resync_interval_secs);
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {
                            debug!("periodic resync");
                            enqueue_all(client.as_ref(), &queue);
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }

        // Worker pool.
        for worker in 0..tuning.workers.max(1) {
            let queue = Arc::clone(&queue);
            let reconciler = Reconciler::new(Arc::clone(&client))
                .with_conflict_retries(tuning.conflict_retries);
            handles.push(tokio::spawn(async move {
                while let Some(key) = queue.next().await {
                    match reconciler.reconcile(&key) {
                        Ok(_) => queue.forget(&key),
                        Err(e) if e.is_fatal() => {
                            warn!(%key, worker, error = %e, "fatal reconcile error, dropping key");
                            queue.forget(&key);
                        }
                        Err(e) => {
                            let delay = queue.requeue_after(key.clone(), e.retry_hint());
                            debug!(%key, worker, error = %e, ?delay, "reconcile failed, requeued");
                        }
                    }
                    queue.done(&key);
                }
                debug!(worker, "worker stopped");
            }));
        }

        // Propagate shutdown into the queue so parked workers wake.
        {
            let queue = Arc::clone(&queue);
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let _ = shutdown.changed().await;
                queue.shutdown();
            }));
        }
        drop(shutdown);

        for handle in handles {
            let _ = handle.await;
        }
        info!("grid controller stopped");
    }
}

/// Enqueue every grid (startup seed, lag recovery, periodic resync).
fn enqueue_all<C: ObjectClient>(client: &C, queue: &WorkQueue) {
    match client.list_grids() {
        Ok(grids) => {
            for grid in grids {
                queue.add(grid.table_key());
            }
        }
        Err(e) => warn!(error = %e, "grid listing for resync failed"),
    }
}

/// Map one watch event to the grid keys it affects.
fn route_event<C: ObjectClient>(client: &C, queue: &WorkQueue, event: WatchEvent) {
    match event {
        WatchEvent::Grid { id, .. } => queue.add(id),
        WatchEvent::Child { child, .. } => {
            if let Some(name) = child.grid_name() {
                queue.add(grid_id(&child.namespace, name));
            } else if let Some(owner) = &child.owner {
                queue.add(owner.grid.clone());
            }
        }
        WatchEvent::Node { kind, node } => match client.list_grids() {
            Ok(grids) => {
                for grid in grids {
                    // A removed label is invisible in the post-state, so
                    // updates and deletions re-trigger every grid; adds
                    // only the grids whose key the node carries.
                    let touches = node.labels.contains_key(&grid.grid_uniq_key);
                    if touches || kind != EventKind::Added {
                        queue.add(grid.table_key());
                    }
                }
            }
            Err(e) => warn!(error = %e, "node event routing failed"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitegrid_core::{
        DeploymentTemplate, GridSpec, LabelSelector, NodeInfo, WorkloadTemplate, grid_id,
    };
    use sitegrid_store::GridStore;
    use std::collections::HashMap;

    fn tuning() -> ControllerTuning {
        ControllerTuning {
            workers: 2,
            backoff_base_ms: 10,
            backoff_max_ms: 100,
            conflict_retries: 3,
            resync_interval_secs: 0,
        }
    }

    fn node(id: &str, key: &str, value: &str) -> NodeInfo {
        let mut labels = HashMap::new();
        labels.insert(key.to_string(), value.to_string());
        NodeInfo {
            id: id.to_string(),
            labels,
            ready: true,
            last_heartbeat: 1000,
        }
    }

    fn web_grid() -> GridSpec {
        GridSpec {
            id: grid_id("default", "web"),
            namespace: "default".to_string(),
            name: "web".to_string(),
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

    /// Poll `check` every 20ms for up to ~4s.
    async fn wait_until<F: Fn() -> bool>(check: F) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn loop_reconciles_on_grid_and_node_events() {
        let store = Arc::new(GridStore::open_in_memory().unwrap());
        let controller = Controller::new(Arc::clone(&store), tuning());
        let events = store.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(controller.run(events, shutdown_rx));

        // Creating topology and grid drives the fan-out.
        store.put_node(&node("n1", "zone", "east")).unwrap();
        store.put_grid(&web_grid()).unwrap();
        assert!(
            wait_until(|| store.get_child("default/web-east").unwrap().is_some()).await,
            "child for east never appeared"
        );

        // A new zone appearing drives another child.
        store.put_node(&node("n2", "zone", "west")).unwrap();
        assert!(
            wait_until(|| store.get_child("default/web-west").unwrap().is_some()).await,
            "child for west never appeared"
        );

        // The zone going away deletes exactly that child.
        store.delete_node("n2").unwrap();
        assert!(
            wait_until(|| store.get_child("default/web-west").unwrap().is_none()).await,
            "child for west never deleted"
        );
        assert!(store.get_child("default/web-east").unwrap().is_some());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn startup_seed_converges_preexisting_grids() {
        let store = Arc::new(GridStore::open_in_memory().unwrap());
        // Grid and topology exist before the controller starts.
        store.put_node(&node("n1", "zone", "east")).unwrap();
        store.put_grid(&web_grid()).unwrap();

        let controller = Controller::new(Arc::clone(&store), tuning());
        let events = store.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(controller.run(events, shutdown_rx));

        assert!(
            wait_until(|| store.get_child("default/web-east").unwrap().is_some()).await,
            "seeded grid never reconciled"
        );

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn child_events_route_to_owning_grid() {
        let store = Arc::new(GridStore::open_in_memory().unwrap());
        let queue = WorkQueue::new(Duration::from_millis(10), Duration::from_millis(100));

        let mut labels = HashMap::new();
        labels.insert(
            sitegrid_core::GRID_SELECTOR_LABEL.to_string(),
            "web".to_string(),
        );
        labels.insert(
            sitegrid_core::GRID_UNIQ_KEY_LABEL.to_string(),
            "east".to_string(),
        );
        let child = sitegrid_core::ChildObject {
            id: "default/web-east".to_string(),
            namespace: "default".to_string(),
            name: "web-east".to_string(),
            labels,
            owner: None,
            resource_version: 1,
            spec: sitegrid_core::WorkloadSpec::Service(sitegrid_core::ServiceWorkload {
                port: 80,
                target_port: 8080,
                protocol: "tcp".to_string(),
                selector: HashMap::new(),
            }),
            status: Default::default(),
            created_at: 0,
            updated_at: 0,
        };

        route_event(
            store.as_ref(),
            &queue,
            WatchEvent::Child {
                kind: EventKind::Updated,
                child,
            },
        );
        assert_eq!(queue.next().await.unwrap(), "default/web");
    }

    #[tokio::test]
    async fn node_updates_retrigger_all_grids() {
        let store = Arc::new(GridStore::open_in_memory().unwrap());
        store.put_grid(&web_grid()).unwrap();
        let mut other = web_grid();
        other.name = "db".to_string();
        other.id = grid_id("default", "db");
        other.grid_uniq_key = "region".to_string();
        store.put_grid(&other).unwrap();

        let queue = WorkQueue::new(Duration::from_millis(10), Duration::from_millis(100));

        // An added node only touches grids whose key it carries.
        route_event(
            store.as_ref(),
            &queue,
            WatchEvent::Node {
                kind: EventKind::Added,
                node: node("n1", "zone", "east"),
            },
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next().await.unwrap(), "default/web");
        queue.done("default/web");

        // A deleted node may have carried any key: everything requeues.
        route_event(
            store.as_ref(),
            &queue,
            WatchEvent::Node {
                kind: EventKind::Deleted,
                node: node("n1", "zone", "east"),
            },
        );
        assert_eq!(queue.len(), 2);
    }
}
