//! In-memory registry implementations
//!
//! Back the binary when no external store is wired in, and serve as the
//! registry in tests. Seeded from the `clusters` section of the configuration.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::entities::{Cluster, ClusterId, RedisNode, RedisNodeId};
use crate::domain::repositories::{ClusterRepository, RedisNodeRepository};
use crate::error::{utils::ErrorUtils, AppError, Result};

/// In-memory cluster repository
#[derive(Clone, Default)]
pub struct InMemoryClusterRepository {
    clusters: Arc<RwLock<HashMap<ClusterId, Cluster>>>,
}

impl InMemoryClusterRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clusters(clusters: impl IntoIterator<Item = Cluster>) -> Self {
        let clusters = clusters
            .into_iter()
            .map(|cluster| (cluster.cluster_id, cluster))
            .collect();
        Self {
            clusters: Arc::new(RwLock::new(clusters)),
        }
    }
}

#[async_trait]
impl ClusterRepository for InMemoryClusterRepository {
    async fn find_by_id(&self, cluster_id: ClusterId) -> Result<Option<Cluster>> {
        Ok(self.clusters.read().await.get(&cluster_id).cloned())
    }
}

/// In-memory Redis node registry, ordered by identifier
#[derive(Clone, Default)]
pub struct InMemoryRedisNodeRepository {
    nodes: Arc<RwLock<BTreeMap<RedisNodeId, RedisNode>>>,
}

impl InMemoryRedisNodeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: impl IntoIterator<Item = RedisNode>) -> Self {
        let nodes = nodes
            .into_iter()
            .map(|node| (node.redis_node_id, node.without_derived()))
            .collect();
        Self {
            nodes: Arc::new(RwLock::new(nodes)),
        }
    }
}

#[async_trait]
impl RedisNodeRepository for InMemoryRedisNodeRepository {
    async fn create(&self, node: &RedisNode) -> Result<RedisNode> {
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&node.redis_node_id) {
            return Err(ErrorUtils::persistence_error(format!(
                "Redis node {} already exists",
                node.redis_node_id
            )));
        }
        let stored = node.without_derived();
        nodes.insert(stored.redis_node_id, stored.clone());
        debug!(redis_node_id = stored.redis_node_id, "Registered redis node");
        Ok(stored)
    }

    async fn find_by_id(&self, node_id: RedisNodeId) -> Result<Option<RedisNode>> {
        Ok(self.nodes.read().await.get(&node_id).cloned())
    }

    async fn find_by_cluster_id(&self, cluster_id: ClusterId) -> Result<Vec<RedisNode>> {
        Ok(self
            .nodes
            .read()
            .await
            .values()
            .filter(|node| node.cluster_id == cluster_id)
            .cloned()
            .collect())
    }

    async fn update(&self, node: &RedisNode) -> Result<RedisNode> {
        let mut nodes = self.nodes.write().await;
        match nodes.get_mut(&node.redis_node_id) {
            Some(existing) => {
                *existing = node.without_derived();
                Ok(existing.clone())
            }
            None => Err(ErrorUtils::not_found_error(
                "Redis node",
                &node.redis_node_id.to_string(),
            )),
        }
    }

    async fn delete(&self, node_id: RedisNodeId) -> Result<()> {
        self.nodes
            .write()
            .await
            .remove(&node_id)
            .map(|_| debug!(redis_node_id = node_id, "Deleted redis node"))
            .ok_or_else(|| AppError::NotFound(format!("Redis node {} not found", node_id)))
    }
}
