//! Batch fan-out over a node list
//!
//! Every batch endpoint funnels through [`BatchOperationCoordinator`]: the
//! owning cluster is resolved once, the per-node handler runs isolated on a
//! bounded pool, and per-node outcomes are merged into a single
//! [`OperationResult`] in node-list order.

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument, Span};

use crate::domain::entities::{Cluster, OperationResult, RedisNode};
use crate::domain::repositories::ClusterRepository;
use crate::error::{utils::ErrorUtils, Result};
use crate::infrastructure::lifecycle::{NodeLifecycleOperation, NodeOperationRegistry};

/// Per-invocation settings of a batch
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub operation: &'static str,
    /// Once cancelled, nodes not yet launched are reported as cancelled
    pub cancel: CancellationToken,
}

impl BatchContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(operation: &'static str, cancel: CancellationToken) -> Self {
        Self { operation, cancel }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeOutcome {
    Succeeded,
    Failed(String),
    Cancelled(String),
}

impl NodeOutcome {
    fn failure_line(self) -> Option<String> {
        match self {
            NodeOutcome::Succeeded => None,
            NodeOutcome::Failed(line) | NodeOutcome::Cancelled(line) => Some(line),
        }
    }
}

pub struct BatchOperationCoordinator {
    clusters: Arc<dyn ClusterRepository>,
    max_concurrency: usize,
}

impl BatchOperationCoordinator {
    pub fn new(clusters: Arc<dyn ClusterRepository>, max_concurrency: usize) -> Self {
        Self {
            clusters,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// The cluster of the first node, shared by the whole batch
    pub async fn resolve_cluster(
        &self,
        operation: &str,
        nodes: &[RedisNode],
    ) -> Result<Arc<Cluster>> {
        let first = nodes
            .first()
            .ok_or_else(|| ErrorUtils::empty_batch_error(operation))?;
        let cluster = self
            .clusters
            .find_by_id(first.cluster_id)
            .await?
            .ok_or_else(|| ErrorUtils::cluster_not_found(first.cluster_id))?;
        Ok(Arc::new(cluster))
    }

    /// Apply a cluster-level handler to every node
    pub async fn cluster_operate<F, Fut>(
        &self,
        ctx: &BatchContext,
        nodes: Vec<RedisNode>,
        handler: F,
    ) -> Result<OperationResult>
    where
        F: Fn(Arc<Cluster>, RedisNode) -> Fut + Send + Sync,
        Fut: Future<Output = Result<bool>> + Send,
    {
        let cluster = self.resolve_cluster(ctx.operation, &nodes).await?;
        Ok(self.run(ctx, cluster, nodes, handler).await)
    }

    /// Apply a lifecycle handler to every node. The lifecycle implementation
    /// is picked once from the cluster's installation environment.
    pub async fn node_operate<F, Fut>(
        &self,
        ctx: &BatchContext,
        nodes: Vec<RedisNode>,
        registry: &NodeOperationRegistry,
        handler: F,
    ) -> Result<OperationResult>
    where
        F: Fn(Arc<Cluster>, RedisNode, Arc<dyn NodeLifecycleOperation>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<bool>> + Send,
    {
        let cluster = self.resolve_cluster(ctx.operation, &nodes).await?;
        let operation = registry.get(cluster.installation_environment)?;
        Ok(self
            .run(ctx, cluster, nodes, move |cluster, node| {
                handler(cluster, node, operation.clone())
            })
            .await)
    }

    async fn run<F, Fut>(
        &self,
        ctx: &BatchContext,
        cluster: Arc<Cluster>,
        nodes: Vec<RedisNode>,
        handler: F,
    ) -> OperationResult
    where
        F: Fn(Arc<Cluster>, RedisNode) -> Fut + Send + Sync,
        Fut: Future<Output = Result<bool>> + Send,
    {
        let span = info_span!(
            "batch",
            operation = ctx.operation,
            cluster_id = cluster.cluster_id,
            size = nodes.len()
        );
        info!(parent: &span, "Starting batch operation");

        let handler = &handler;
        let outcomes: Vec<NodeOutcome> = stream::iter(nodes)
            .map(|node| {
                Self::run_node(
                    ctx.cancel.clone(),
                    cluster.clone(),
                    node,
                    handler,
                    span.clone(),
                )
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let failures: String = outcomes
            .into_iter()
            .filter_map(NodeOutcome::failure_line)
            .map(|line| line + "\n")
            .collect();

        let result = OperationResult::from_failures(failures);
        if result.is_success() {
            info!(parent: &span, "Batch operation succeeded");
        } else {
            warn!(
                parent: &span,
                failures = %result.message.trim_end(),
                "Batch operation finished with failures"
            );
        }
        result
    }

    async fn run_node<F, Fut>(
        cancel: CancellationToken,
        cluster: Arc<Cluster>,
        node: RedisNode,
        handler: &F,
        span: Span,
    ) -> NodeOutcome
    where
        F: Fn(Arc<Cluster>, RedisNode) -> Fut + Send + Sync,
        Fut: Future<Output = Result<bool>> + Send,
    {
        let address = node.address();
        async move {
            if cancel.is_cancelled() {
                warn!(node = %address, "Batch cancelled before node was processed");
                return NodeOutcome::Cancelled(format!("{} operation cancelled.", address));
            }

            let task = async move { handler(cluster, node).await };
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(true)) => NodeOutcome::Succeeded,
                Ok(Ok(false)) => {
                    warn!(node = %address, "Node operation reported failure");
                    NodeOutcome::Failed(format!("{} operation failed.", address))
                }
                Ok(Err(e)) => {
                    error!(node = %address, error = %e, "Node operation failed");
                    NodeOutcome::Failed(format!("{} operation failed: {}", address, e))
                }
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    error!(node = %address, panic = %reason, "Node operation panicked");
                    NodeOutcome::Failed(format!("{} operation failed: {}", address, reason))
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
