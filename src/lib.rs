//! Redis fleet control plane
//!
//! Starts, stops, restarts and deletes Redis processes across installation
//! environments and reshapes cluster topology (meet, forget, slot moves,
//! replication, failover) for batches of nodes.

use std::sync::Arc;

pub mod application;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;

// Re-export commonly used types
pub use error::{AppError, Result};

use application::services::NodeManageService;
use infrastructure::repositories::{InMemoryClusterRepository, InMemoryRedisNodeRepository};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub node_manage: Arc<NodeManageService>,
}

impl AppState {
    /// State backed by in-memory registries seeded from `config.clusters`
    pub fn from_config(config: &config::AppConfiguration) -> Result<Self> {
        let clusters = Arc::new(InMemoryClusterRepository::with_clusters(
            config.clusters.iter().map(|seed| seed.cluster.clone()),
        ));
        let nodes = Arc::new(InMemoryRedisNodeRepository::with_nodes(
            config
                .clusters
                .iter()
                .flat_map(|seed| seed.redis_nodes.iter().cloned()),
        ));
        let node_manage = NodeManageService::from_config(config, clusters, nodes)?;

        Ok(Self {
            node_manage: Arc::new(node_manage),
        })
    }
}
