//! Node lifecycle state machine
//!
//! | action  | needs       | otherwise                         |
//! |---------|-------------|-----------------------------------|
//! | start   | unreachable | already running, nothing to do    |
//! | stop    | reachable   | fails                             |
//! | restart | reachable   | falls back to start               |
//! | remove  | unreachable | fails, the node must be stopped   |
//!
//! Reachability is probed right before acting and is never stored.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::entities::{Cluster, RedisNode};
use crate::domain::repositories::RedisNodeRepository;
use crate::error::{AppError, Result};
use crate::infrastructure::health_checks::LivenessProbe;
use crate::infrastructure::lifecycle::NodeLifecycleOperation;

pub struct NodeLifecycleController {
    probe: Arc<dyn LivenessProbe>,
    nodes: Arc<dyn RedisNodeRepository>,
}

impl NodeLifecycleController {
    pub fn new(probe: Arc<dyn LivenessProbe>, nodes: Arc<dyn RedisNodeRepository>) -> Self {
        Self { probe, nodes }
    }

    async fn is_running(&self, node: &RedisNode) -> bool {
        self.probe.reachable(&node.host, node.port).await
    }

    pub async fn start(
        &self,
        cluster: &Cluster,
        node: &RedisNode,
        operation: &dyn NodeLifecycleOperation,
    ) -> Result<bool> {
        if self.is_running(node).await {
            info!(node = %node.address(), "Node already running, skipping start");
            return Ok(true);
        }
        operation.start(cluster, node).await
    }

    pub async fn stop(
        &self,
        cluster: &Cluster,
        node: &RedisNode,
        operation: &dyn NodeLifecycleOperation,
    ) -> Result<bool> {
        if !self.is_running(node).await {
            warn!(node = %node.address(), "Cannot stop a node that is not running");
            return Ok(false);
        }
        operation.stop(cluster, node).await
    }

    pub async fn restart(
        &self,
        cluster: &Cluster,
        node: &RedisNode,
        operation: &dyn NodeLifecycleOperation,
    ) -> Result<bool> {
        if self.is_running(node).await {
            operation.restart(cluster, node).await
        } else {
            info!(node = %node.address(), "Node not running, starting instead of restarting");
            operation.start(cluster, node).await
        }
    }

    /// Remove the node's process and then its registry record. The record
    /// stays when the environment could not remove the process.
    pub async fn remove(
        &self,
        cluster: &Cluster,
        node: &RedisNode,
        operation: &dyn NodeLifecycleOperation,
    ) -> Result<bool> {
        if self.is_running(node).await {
            warn!(node = %node.address(), "Refusing to remove a running node, stop it first");
            return Ok(false);
        }
        if !operation.remove(cluster, node).await? {
            return Ok(false);
        }

        match self.nodes.delete(node.redis_node_id).await {
            Ok(()) => {
                info!(node = %node.address(), redis_node_id = node.redis_node_id, "Node removed");
                Ok(true)
            }
            Err(AppError::NotFound(_)) => {
                debug!(redis_node_id = node.redis_node_id, "Node was not registered");
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }
}
