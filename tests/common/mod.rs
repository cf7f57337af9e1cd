#![allow(dead_code)]

pub mod mocks;

use std::sync::Arc;

use redis_fleet::application::services::NodeManageService;
use redis_fleet::config::AppConfiguration;
use redis_fleet::domain::entities::{
    Cluster, ClusterId, InstallationEnvironment, RedisNode, RedisNodeId,
};
use redis_fleet::infrastructure::lifecycle::NodeOperationRegistry;
use redis_fleet::infrastructure::repositories::{
    InMemoryClusterRepository, InMemoryRedisNodeRepository,
};

use mocks::{FaultyNodeRepository, MockClusterExecutor, MockLivenessProbe, MockNodeOperation};

pub const CLUSTER_ID: ClusterId = 7;

pub fn node(id: RedisNodeId, host: &str, port: u16) -> RedisNode {
    RedisNode::new(id, CLUSTER_ID, host, port)
}

pub fn replica(id: RedisNodeId, host: &str, port: u16, master_id: RedisNodeId) -> RedisNode {
    let mut replica = node(id, host, port);
    replica.master_id = Some(master_id);
    replica
}

/// Service wired to in-memory registries and mocks
pub struct TestHarness {
    pub service: NodeManageService,
    pub clusters: InMemoryClusterRepository,
    pub nodes: InMemoryRedisNodeRepository,
    /// The registry as the service sees it; inject write failures here
    pub faulty_nodes: FaultyNodeRepository<InMemoryRedisNodeRepository>,
    pub probe: MockLivenessProbe,
    pub operation: MockNodeOperation,
    pub executor: MockClusterExecutor,
}

impl TestHarness {
    /// Cluster `CLUSTER_ID` with membership string `members`, plus the given
    /// registered nodes
    pub fn new(members: &str, registered: Vec<RedisNode>) -> Self {
        let clusters = InMemoryClusterRepository::with_clusters(vec![Cluster::new(
            CLUSTER_ID,
            members,
            InstallationEnvironment::Machine,
        )]);
        let nodes = InMemoryRedisNodeRepository::with_nodes(registered);
        let faulty = FaultyNodeRepository::new(nodes.clone());
        let probe = MockLivenessProbe::new();
        let operation = MockNodeOperation::new(InstallationEnvironment::Machine);
        let executor = MockClusterExecutor::new();

        let mut registry = NodeOperationRegistry::new();
        registry.register(Arc::new(operation.clone()));

        let mut config = AppConfiguration::default();
        config.orchestrator.failover_confirm_attempts = 3;
        config.orchestrator.failover_confirm_interval_ms = 10;

        let service = NodeManageService::new(
            &config,
            Arc::new(clusters.clone()),
            Arc::new(faulty.clone()),
            Arc::new(probe.clone()),
            Arc::new(executor.clone()),
            registry,
        );

        Self {
            service,
            clusters,
            nodes,
            faulty_nodes: faulty,
            probe,
            operation,
            executor,
        }
    }
}
