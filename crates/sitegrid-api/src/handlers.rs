//! REST API handlers.
//!
//! Each handler reads/writes via `GridStore` and returns JSON
//! responses in a consistent envelope.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use sitegrid_core::{GRID_SELECTOR_LABEL, GridSpec, NodeInfo, grid_id, validate_grid};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Grids ──────────────────────────────────────────────────────────

/// GET /api/v1/grids
pub async fn list_grids(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_grids() {
        Ok(grids) => ApiResponse::ok(grids).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// POST /api/v1/grids
///
/// Upserts a grid. The spec is validated before it is admitted so an
/// unexpandable template never reaches the controller.
pub async fn put_grid(
    State(state): State<ApiState>,
    Json(mut spec): Json<GridSpec>,
) -> impl IntoResponse {
    spec.id = grid_id(&spec.namespace, &spec.name);
    if let Err(e) = validate_grid(&spec) {
        return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }
    match state.store.put_grid(&spec) {
        Ok(()) => (StatusCode::CREATED, ApiResponse::ok(spec)).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/grids/:namespace/:name
pub async fn get_grid(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.get_grid(&grid_id(&namespace, &name)) {
        Ok(Some(spec)) => ApiResponse::ok(spec).into_response(),
        Ok(None) => error_response("grid not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// DELETE /api/v1/grids/:namespace/:name
pub async fn delete_grid(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.delete_grid(&grid_id(&namespace, &name)) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("grid not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/grids/:namespace/:name/status
pub async fn get_grid_status(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    let key = grid_id(&namespace, &name);
    // A grid that exists but has not been reconciled yet reports an
    // empty status rather than 404.
    match state.store.get_grid(&key) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response("grid not found", StatusCode::NOT_FOUND).into_response();
        }
        Err(e) => {
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }
    }
    match state.store.get_grid_status(&key) {
        Ok(status) => ApiResponse::ok(status.unwrap_or_default()).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/grids/:namespace/:name/children
pub async fn list_grid_children(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state
        .store
        .list_children_selected(&namespace, &[(GRID_SELECTOR_LABEL, &name)])
    {
        Ok(children) => ApiResponse::ok(children).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Nodes ──────────────────────────────────────────────────────────

/// GET /api/v1/nodes
pub async fn list_nodes(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_nodes() {
        Ok(nodes) => ApiResponse::ok(nodes).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// POST /api/v1/nodes
pub async fn put_node(
    State(state): State<ApiState>,
    Json(node): Json<NodeInfo>,
) -> impl IntoResponse {
    if node.id.trim().is_empty() {
        return error_response("node id must not be empty", StatusCode::BAD_REQUEST)
            .into_response();
    }
    match state.store.put_node(&node) {
        Ok(()) => (StatusCode::CREATED, ApiResponse::ok(node)).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// DELETE /api/v1/nodes/:id
pub async fn delete_node(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_node(&id) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("node not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}
