use crate::{
    application::handlers::node_manage::{
        delete, edit_config, fail_over, forget, get_all_node_list, get_all_node_list_with_status,
        import_node, move_slot, purge_memory, replicate_of, restart, start, stop,
    },
    AppState,
};
use axum::{
    routing::{get, post},
    Router,
};

/// Create the node management router
///
/// Mounted under `/nodeManage`. Every batch endpoint takes a JSON array of
/// node descriptors belonging to one cluster.
pub fn node_manage_router() -> Router<AppState> {
    Router::new()
        // Inventory
        .route("/getAllNodeList/:cluster_id", get(get_all_node_list))
        .route(
            "/getAllNodeListWithStatus/:cluster_id",
            get(get_all_node_list_with_status),
        )
        .route("/purgeMemory", post(purge_memory))
        .route("/editConfig", post(edit_config))
        // Topology
        .route("/forget", post(forget))
        .route("/moveSlot", post(move_slot))
        .route("/replicateOf", post(replicate_of))
        .route("/failOver", post(fail_over))
        .route("/importNode", post(import_node))
        // Lifecycle
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/restart", post(restart))
        .route("/delete", post(delete))
}
