//! Redis node registry interface
//!
//! The registry is a cache of cluster membership. It is reconciled by the
//! orchestrator after meet/forget and never by itself.

use async_trait::async_trait;

use crate::domain::entities::{ClusterId, RedisNode, RedisNodeId};
use crate::error::Result;

/// Repository interface for registered Redis nodes
#[async_trait]
pub trait RedisNodeRepository: Send + Sync {
    /// Register a node. Fails if the identifier is already taken.
    async fn create(&self, node: &RedisNode) -> Result<RedisNode>;

    /// Find a node by its ID
    async fn find_by_id(&self, node_id: RedisNodeId) -> Result<Option<RedisNode>>;

    /// Find nodes owned by a cluster
    async fn find_by_cluster_id(&self, cluster_id: ClusterId) -> Result<Vec<RedisNode>>;

    /// Update a registered node
    async fn update(&self, node: &RedisNode) -> Result<RedisNode>;

    /// Delete a node
    async fn delete(&self, node_id: RedisNodeId) -> Result<()>;

    /// Check if a node exists
    async fn exists(&self, node_id: RedisNodeId) -> Result<bool> {
        Ok(self.find_by_id(node_id).await?.is_some())
    }
}
