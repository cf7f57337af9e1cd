//! Node management operations exposed to the HTTP layer
//!
//! Every batch operation takes a list of node descriptors. The owning cluster
//! is taken from the first node; the result is success, or failure with one
//! line per failed node.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

use crate::config::AppConfiguration;
use crate::core::cluster::{
    BatchContext, BatchOperationCoordinator, ClusterTopologyClient, NodeLifecycleController,
};
use crate::domain::entities::{
    Cluster, ClusterId, NodeRole, OperationResult, RedisNode, RedisNodeId, RunStatus, SlotRange,
};
use crate::domain::repositories::{ClusterRepository, RedisNodeRepository};
use crate::error::{utils::ErrorUtils, AppError, Result};
use crate::infrastructure::health_checks::{LivenessProbe, ProbeConfig, TcpLivenessProbe};
use crate::infrastructure::lifecycle::NodeOperationRegistry;
use crate::infrastructure::redis::{
    ClusterCommandExecutor, ClusterNodeInfo, RedisClusterCommandExecutor,
};

/// Batch operations driven through the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    Forget,
    ReplicateOf,
    FailOver,
    Start,
    Stop,
    Restart,
    Delete,
}

impl BatchOperation {
    pub fn name(&self) -> &'static str {
        match self {
            BatchOperation::Forget => "forget",
            BatchOperation::ReplicateOf => "replicateOf",
            BatchOperation::FailOver => "failOver",
            BatchOperation::Start => "start",
            BatchOperation::Stop => "stop",
            BatchOperation::Restart => "restart",
            BatchOperation::Delete => "delete",
        }
    }
}

/// Slot reassignment request for a single node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSlotRequest {
    pub redis_node: RedisNode,
    pub slot_range: SlotRange,
}

pub struct NodeManageService {
    clusters: Arc<dyn ClusterRepository>,
    nodes: Arc<dyn RedisNodeRepository>,
    probe: Arc<dyn LivenessProbe>,
    registry: NodeOperationRegistry,
    coordinator: BatchOperationCoordinator,
    lifecycle: NodeLifecycleController,
    topology: ClusterTopologyClient,
    max_concurrency: usize,
}

impl NodeManageService {
    pub fn new(
        config: &AppConfiguration,
        clusters: Arc<dyn ClusterRepository>,
        nodes: Arc<dyn RedisNodeRepository>,
        probe: Arc<dyn LivenessProbe>,
        executor: Arc<dyn ClusterCommandExecutor>,
        registry: NodeOperationRegistry,
    ) -> Self {
        let orchestrator = &config.orchestrator;
        Self {
            coordinator: BatchOperationCoordinator::new(
                clusters.clone(),
                orchestrator.max_concurrency,
            ),
            lifecycle: NodeLifecycleController::new(probe.clone(), nodes.clone()),
            topology: ClusterTopologyClient::new(executor, nodes.clone(), orchestrator),
            clusters,
            nodes,
            probe,
            registry,
            max_concurrency: orchestrator.max_concurrency.max(1),
        }
    }

    /// Service wired with the TCP probe, the `redis` command executor and the
    /// built-in lifecycle implementations
    pub fn from_config(
        config: &AppConfiguration,
        clusters: Arc<dyn ClusterRepository>,
        nodes: Arc<dyn RedisNodeRepository>,
    ) -> Result<Self> {
        let probe = Arc::new(TcpLivenessProbe::new(ProbeConfig {
            timeout_ms: config.orchestrator.probe_timeout_ms,
        }));
        let executor = Arc::new(RedisClusterCommandExecutor::new(
            config.orchestrator.command_timeout_ms,
        ));
        let registry = NodeOperationRegistry::from_config(&config.environments)?;
        Ok(Self::new(config, clusters, nodes, probe, executor, registry))
    }

    async fn find_cluster(&self, cluster_id: ClusterId) -> Result<Cluster> {
        self.clusters
            .find_by_id(cluster_id)
            .await?
            .ok_or_else(|| ErrorUtils::cluster_not_found(cluster_id))
    }

    /// Nodes as the cluster itself sees them, asked from the first listed
    /// member that answers and merged with the registry. Nodes the registry
    /// does not know carry id 0.
    pub async fn list_nodes(&self, cluster_id: ClusterId) -> Result<Vec<RedisNode>> {
        let cluster = self.find_cluster(cluster_id).await?;
        let view = self.topology.cluster_view(&cluster).await?;
        let registered = self.nodes.find_by_cluster_id(cluster_id).await?;
        Ok(merge_cluster_view(&cluster, sort_cluster_view(view), &registered))
    }

    /// Registered nodes of a cluster with their probed run state
    pub async fn list_nodes_with_status(&self, cluster_id: ClusterId) -> Result<Vec<RedisNode>> {
        let cluster = self.find_cluster(cluster_id).await?;
        let registered = self.nodes.find_by_cluster_id(cluster_id).await?;

        let cluster = &cluster;
        let probed: Vec<RedisNode> = stream::iter(registered)
            .map(|mut node| async move {
                let reachable = self.probe.reachable(&node.host, node.port).await;
                node.run_status = Some(reachable.into());
                node.in_cluster = Some(cluster.lists_member(&node.address()));
                node
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        Ok(sort_nodes(probed))
    }

    /// Accepted for compatibility, nothing is purged
    pub async fn purge_memory(&self, nodes: Vec<RedisNode>) -> Result<OperationResult> {
        if nodes.is_empty() {
            return Err(ErrorUtils::empty_batch_error("purgeMemory"));
        }
        info!(nodes = nodes.len(), "purgeMemory requested, nothing to do");
        Ok(OperationResult::success())
    }

    /// Accepted for compatibility, no configuration is rewritten
    pub async fn edit_config(&self, nodes: Vec<RedisNode>) -> Result<OperationResult> {
        if nodes.is_empty() {
            return Err(ErrorUtils::empty_batch_error("editConfig"));
        }
        info!(nodes = nodes.len(), "editConfig requested, nothing to do");
        Ok(OperationResult::success())
    }

    pub async fn forget(&self, nodes: Vec<RedisNode>) -> Result<OperationResult> {
        self.execute(BatchOperation::Forget, nodes, CancellationToken::new())
            .await
    }

    pub async fn move_slot(&self, request: MoveSlotRequest) -> Result<OperationResult> {
        request.slot_range.validate()?;
        let slot_range = &request.slot_range;
        self.coordinator
            .cluster_operate(
                &BatchContext::new("moveSlot"),
                vec![request.redis_node.clone()],
                |cluster, node| async move {
                    self.topology.move_slot(&cluster, &node, slot_range).await
                },
            )
            .await
    }

    pub async fn replicate_of(&self, nodes: Vec<RedisNode>) -> Result<OperationResult> {
        self.execute(BatchOperation::ReplicateOf, nodes, CancellationToken::new())
            .await
    }

    pub async fn fail_over(&self, nodes: Vec<RedisNode>) -> Result<OperationResult> {
        self.execute(BatchOperation::FailOver, nodes, CancellationToken::new())
            .await
    }

    pub async fn start(&self, nodes: Vec<RedisNode>) -> Result<OperationResult> {
        self.execute(BatchOperation::Start, nodes, CancellationToken::new())
            .await
    }

    pub async fn stop(&self, nodes: Vec<RedisNode>) -> Result<OperationResult> {
        self.execute(BatchOperation::Stop, nodes, CancellationToken::new())
            .await
    }

    pub async fn restart(&self, nodes: Vec<RedisNode>) -> Result<OperationResult> {
        self.execute(BatchOperation::Restart, nodes, CancellationToken::new())
            .await
    }

    pub async fn delete(&self, nodes: Vec<RedisNode>) -> Result<OperationResult> {
        self.execute(BatchOperation::Delete, nodes, CancellationToken::new())
            .await
    }

    /// Run a batch operation that stops launching nodes once `cancel` fires
    pub async fn execute(
        &self,
        operation: BatchOperation,
        nodes: Vec<RedisNode>,
        cancel: CancellationToken,
    ) -> Result<OperationResult> {
        let ctx = BatchContext::with_cancellation(operation.name(), cancel);
        let coordinator = &self.coordinator;
        let topology = &self.topology;
        let lifecycle = &self.lifecycle;

        match operation {
            BatchOperation::Forget => {
                coordinator
                    .cluster_operate(&ctx, nodes, |cluster, node| async move {
                        topology.forget(&cluster, &node).await
                    })
                    .await
            }
            BatchOperation::ReplicateOf => {
                coordinator
                    .cluster_operate(&ctx, nodes, |cluster, node| async move {
                        topology.replicate_of(&cluster, &node).await
                    })
                    .await
            }
            BatchOperation::FailOver => {
                coordinator
                    .cluster_operate(&ctx, nodes, |cluster, node| async move {
                        topology.fail_over(&cluster, &node).await
                    })
                    .await
            }
            BatchOperation::Start => {
                coordinator
                    .node_operate(&ctx, nodes, &self.registry, |cluster, node, env| async move {
                        lifecycle.start(&cluster, &node, env.as_ref()).await
                    })
                    .await
            }
            BatchOperation::Stop => {
                coordinator
                    .node_operate(&ctx, nodes, &self.registry, |cluster, node, env| async move {
                        lifecycle.stop(&cluster, &node, env.as_ref()).await
                    })
                    .await
            }
            BatchOperation::Restart => {
                coordinator
                    .node_operate(&ctx, nodes, &self.registry, |cluster, node, env| async move {
                        lifecycle.restart(&cluster, &node, env.as_ref()).await
                    })
                    .await
            }
            BatchOperation::Delete => {
                coordinator
                    .node_operate(&ctx, nodes, &self.registry, |cluster, node, env| async move {
                        lifecycle.remove(&cluster, &node, env.as_ref()).await
                    })
                    .await
            }
        }
    }

    /// Join new nodes to the cluster of the first node, through its first
    /// listed member
    pub async fn import_node(&self, nodes: Vec<RedisNode>) -> Result<OperationResult> {
        let cluster = self.coordinator.resolve_cluster("importNode", &nodes).await?;
        let ambassador = cluster.ambassador().ok_or_else(|| {
            AppError::ValidationError(format!(
                "Cluster {} has no member to introduce new nodes",
                cluster.cluster_id
            ))
        })?;

        let span = info_span!(
            "batch",
            operation = "importNode",
            cluster_id = cluster.cluster_id,
            size = nodes.len()
        );
        let failures = self
            .topology
            .meet(&cluster, &ambassador, &nodes)
            .instrument(span)
            .await;
        Ok(OperationResult::from_failures(failures))
    }
}

/// Same ordering as [`sort_nodes`], keyed by the ids Redis assigned
fn sort_cluster_view(mut view: Vec<ClusterNodeInfo>) -> Vec<ClusterNodeInfo> {
    view.sort_by(|a, b| {
        (&a.endpoint.host, a.endpoint.port).cmp(&(&b.endpoint.host, b.endpoint.port))
    });

    let master_ids: HashSet<String> = view
        .iter()
        .filter(|info| info.master_id.is_none())
        .map(|info| info.id.clone())
        .collect();

    let mut masters = Vec::new();
    let mut replicas: HashMap<String, Vec<ClusterNodeInfo>> = HashMap::new();
    let mut orphans = Vec::new();
    for info in view {
        match info.master_id.clone() {
            None => masters.push(info),
            Some(master_id) if master_ids.contains(&master_id) => {
                replicas.entry(master_id).or_default().push(info)
            }
            Some(_) => orphans.push(info),
        }
    }

    let mut sorted = Vec::new();
    for master in masters {
        let children = replicas.remove(&master.id);
        sorted.push(master);
        sorted.extend(children.unwrap_or_default());
    }
    sorted.extend(orphans);
    sorted
}

/// Registry records overlaid with the roles, master links and slots of the
/// live view
fn merge_cluster_view(
    cluster: &Cluster,
    view: Vec<ClusterNodeInfo>,
    registered: &[RedisNode],
) -> Vec<RedisNode> {
    let by_address: HashMap<String, &RedisNode> = registered
        .iter()
        .map(|node| (node.address(), node))
        .collect();
    let registry_ids: HashMap<&str, RedisNodeId> = view
        .iter()
        .filter_map(|info| {
            by_address
                .get(&info.endpoint.to_string())
                .map(|node| (info.id.as_str(), node.redis_node_id))
        })
        .collect();

    view.iter()
        .map(|info| {
            let address = info.endpoint.to_string();
            let mut node = match by_address.get(&address) {
                Some(record) => (*record).clone(),
                None => RedisNode::new(
                    0,
                    cluster.cluster_id,
                    info.endpoint.host.clone(),
                    info.endpoint.port,
                ),
            };
            node.node_role = if info.is_master() {
                NodeRole::Master
            } else if info.is_replica() {
                NodeRole::Replica
            } else {
                NodeRole::Unknown
            };
            node.master_id = info
                .master_id
                .as_deref()
                .and_then(|id| registry_ids.get(id).copied());
            node.run_status = Some(if info.is_failed() || info.link_state != "connected" {
                RunStatus::Stopped
            } else {
                RunStatus::Running
            });
            node.in_cluster = Some(cluster.lists_member(&address));
            node.node_id = Some(info.id.clone());
            node.link_state = Some(info.link_state.clone());
            node.slots = Some(info.slots.clone());
            node
        })
        .collect()
}

/// Masters ordered by address, each followed by its replicas; replicas whose
/// master is not listed come last
pub fn sort_nodes(mut nodes: Vec<RedisNode>) -> Vec<RedisNode> {
    nodes.sort_by(|a, b| (&a.host, a.port).cmp(&(&b.host, b.port)));

    let master_ids: HashSet<RedisNodeId> = nodes
        .iter()
        .filter(|node| node.master_id.is_none())
        .map(|node| node.redis_node_id)
        .collect();

    let mut masters = Vec::new();
    let mut replicas: BTreeMap<RedisNodeId, Vec<RedisNode>> = BTreeMap::new();
    let mut orphans = Vec::new();
    for node in nodes {
        match node.master_id {
            None => masters.push(node),
            Some(master_id) if master_ids.contains(&master_id) => {
                replicas.entry(master_id).or_default().push(node)
            }
            Some(_) => orphans.push(node),
        }
    }

    let mut sorted = Vec::new();
    for master in masters {
        let id = master.redis_node_id;
        sorted.push(master);
        if let Some(children) = replicas.remove(&id) {
            sorted.extend(children);
        }
    }
    sorted.extend(orphans);
    sorted
}
