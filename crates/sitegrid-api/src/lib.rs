//! sitegrid-api — REST API for SiteGrid.
//!
//! Provides axum route handlers for managing grids and nodes and for
//! reading back per-site rollout status. Writing a grid or a node
//! through this API emits watch events the controller picks up; there
//! is no direct coupling between the API and the reconciler.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/grids` | List all grids |
//! | POST | `/api/v1/grids` | Create or update a grid |
//! | GET | `/api/v1/grids/{namespace}/{name}` | Get grid details |
//! | DELETE | `/api/v1/grids/{namespace}/{name}` | Delete a grid (cascades) |
//! | GET | `/api/v1/grids/{namespace}/{name}/status` | Per-site status map |
//! | GET | `/api/v1/grids/{namespace}/{name}/children` | List expanded children |
//! | GET | `/api/v1/nodes` | List nodes |
//! | POST | `/api/v1/nodes` | Register or update a node |
//! | DELETE | `/api/v1/nodes/{id}` | Remove a node |

pub mod handlers;

use axum::Router;
use axum::routing::get;

use sitegrid_store::GridStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: GridStore,
}

/// Build the complete API router.
pub fn build_router(store: GridStore) -> Router {
    let state = ApiState { store };

    let api_routes = Router::new()
        .route(
            "/grids",
            get(handlers::list_grids).post(handlers::put_grid),
        )
        .route(
            "/grids/{namespace}/{name}",
            get(handlers::get_grid).delete(handlers::delete_grid),
        )
        .route(
            "/grids/{namespace}/{name}/status",
            get(handlers::get_grid_status),
        )
        .route(
            "/grids/{namespace}/{name}/children",
            get(handlers::list_grid_children),
        )
        .route("/nodes", get(handlers::list_nodes).post(handlers::put_node))
        .route("/nodes/{id}", axum::routing::delete(handlers::delete_node))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
