//! Node management HTTP handlers
//!
//! Bodies and responses are camelCase JSON. Batch endpoints answer with an
//! `OperationResult`; a rejected request answers with the error body of
//! `AppError`.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use tracing::info;

use crate::application::services::node_manage::MoveSlotRequest;
use crate::domain::entities::{ClusterId, OperationResult, RedisNode};
use crate::error::Result;
use crate::AppState;

/// Node listing wrapped like an operation result
#[derive(Debug, Serialize)]
pub struct NodeListResponse {
    pub success: bool,
    pub message: String,
    pub data: Vec<RedisNode>,
}

pub async fn get_all_node_list(
    State(state): State<AppState>,
    Path(cluster_id): Path<ClusterId>,
) -> Result<Json<NodeListResponse>> {
    info!(cluster_id = cluster_id, "Listing nodes from cluster view");
    let nodes = state.node_manage.list_nodes(cluster_id).await?;
    Ok(Json(NodeListResponse {
        success: true,
        message: String::new(),
        data: nodes,
    }))
}

pub async fn get_all_node_list_with_status(
    State(state): State<AppState>,
    Path(cluster_id): Path<ClusterId>,
) -> Result<Json<NodeListResponse>> {
    info!(cluster_id = cluster_id, "Listing registered nodes");
    let nodes = state.node_manage.list_nodes_with_status(cluster_id).await?;
    Ok(Json(NodeListResponse {
        success: true,
        message: String::new(),
        data: nodes,
    }))
}

pub async fn purge_memory(
    State(state): State<AppState>,
    Json(nodes): Json<Vec<RedisNode>>,
) -> Result<Json<OperationResult>> {
    Ok(Json(state.node_manage.purge_memory(nodes).await?))
}

pub async fn edit_config(
    State(state): State<AppState>,
    Json(nodes): Json<Vec<RedisNode>>,
) -> Result<Json<OperationResult>> {
    Ok(Json(state.node_manage.edit_config(nodes).await?))
}

pub async fn forget(
    State(state): State<AppState>,
    Json(nodes): Json<Vec<RedisNode>>,
) -> Result<Json<OperationResult>> {
    info!(nodes = nodes.len(), "Received forget request");
    Ok(Json(state.node_manage.forget(nodes).await?))
}

pub async fn move_slot(
    State(state): State<AppState>,
    Json(request): Json<MoveSlotRequest>,
) -> Result<Json<OperationResult>> {
    info!(node = %request.redis_node.address(), "Received moveSlot request");
    Ok(Json(state.node_manage.move_slot(request).await?))
}

pub async fn replicate_of(
    State(state): State<AppState>,
    Json(nodes): Json<Vec<RedisNode>>,
) -> Result<Json<OperationResult>> {
    info!(nodes = nodes.len(), "Received replicateOf request");
    Ok(Json(state.node_manage.replicate_of(nodes).await?))
}

pub async fn fail_over(
    State(state): State<AppState>,
    Json(nodes): Json<Vec<RedisNode>>,
) -> Result<Json<OperationResult>> {
    info!(nodes = nodes.len(), "Received failOver request");
    Ok(Json(state.node_manage.fail_over(nodes).await?))
}

pub async fn start(
    State(state): State<AppState>,
    Json(nodes): Json<Vec<RedisNode>>,
) -> Result<Json<OperationResult>> {
    info!(nodes = nodes.len(), "Received start request");
    Ok(Json(state.node_manage.start(nodes).await?))
}

pub async fn stop(
    State(state): State<AppState>,
    Json(nodes): Json<Vec<RedisNode>>,
) -> Result<Json<OperationResult>> {
    info!(nodes = nodes.len(), "Received stop request");
    Ok(Json(state.node_manage.stop(nodes).await?))
}

pub async fn restart(
    State(state): State<AppState>,
    Json(nodes): Json<Vec<RedisNode>>,
) -> Result<Json<OperationResult>> {
    info!(nodes = nodes.len(), "Received restart request");
    Ok(Json(state.node_manage.restart(nodes).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Json(nodes): Json<Vec<RedisNode>>,
) -> Result<Json<OperationResult>> {
    info!(nodes = nodes.len(), "Received delete request");
    Ok(Json(state.node_manage.delete(nodes).await?))
}

pub async fn import_node(
    State(state): State<AppState>,
    Json(nodes): Json<Vec<RedisNode>>,
) -> Result<Json<OperationResult>> {
    info!(nodes = nodes.len(), "Received importNode request");
    Ok(Json(state.node_manage.import_node(nodes).await?))
}
