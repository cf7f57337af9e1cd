//! Cluster repository interface
//!
//! Lookup of the cluster metadata the orchestrator works against. Storage is
//! provided by the embedding application.

use async_trait::async_trait;

use crate::domain::entities::{Cluster, ClusterId};
use crate::error::Result;

/// Repository interface for managed clusters
#[async_trait]
pub trait ClusterRepository: Send + Sync {
    /// Find a cluster by its ID
    async fn find_by_id(&self, cluster_id: ClusterId) -> Result<Option<Cluster>>;
}
