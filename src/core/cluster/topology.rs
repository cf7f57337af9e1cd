//! Cluster membership, slot ownership and replication changes
//!
//! None of these calls retries. Each returns whether the cluster accepted the
//! change, or an error naming the endpoint that refused it.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::domain::entities::{Cluster, Endpoint, NodeRole, RedisNode, SlotRange};
use crate::domain::repositories::RedisNodeRepository;
use crate::error::{utils::ErrorUtils, AppError, Result};
use crate::infrastructure::redis::{
    find_by_endpoint, slot_owner, ClusterCommandExecutor, ClusterNodeInfo, SetSlot,
};

/// A meet reply is an error text; an empty text means the candidate was accepted.
pub fn meet_succeeded(reply: &str) -> bool {
    reply.is_empty()
}

pub struct ClusterTopologyClient {
    executor: Arc<dyn ClusterCommandExecutor>,
    nodes: Arc<dyn RedisNodeRepository>,
    migrate_batch_size: usize,
    migrate_timeout_ms: u64,
    failover_confirm_attempts: u32,
    failover_confirm_interval: Duration,
}

impl ClusterTopologyClient {
    pub fn new(
        executor: Arc<dyn ClusterCommandExecutor>,
        nodes: Arc<dyn RedisNodeRepository>,
        settings: &OrchestratorConfig,
    ) -> Self {
        Self {
            executor,
            nodes,
            migrate_batch_size: settings.migrate_batch_size.max(1),
            migrate_timeout_ms: settings.migrate_timeout_ms,
            failover_confirm_attempts: settings.failover_confirm_attempts.max(1),
            failover_confirm_interval: Duration::from_millis(settings.failover_confirm_interval_ms),
        }
    }

    /// The cluster's own view of its nodes, from the first listed member
    /// that answers
    pub async fn cluster_view(&self, cluster: &Cluster) -> Result<Vec<ClusterNodeInfo>> {
        let members = cluster.member_endpoints();
        if members.is_empty() {
            return Err(AppError::ValidationError(format!(
                "Cluster {} has no member to ask for its nodes",
                cluster.cluster_id
            )));
        }
        self.first_view(cluster, &members).await
    }

    async fn first_view(
        &self,
        cluster: &Cluster,
        members: &[Endpoint],
    ) -> Result<Vec<ClusterNodeInfo>> {
        let mut last_error = None;
        for member in members {
            match self.executor.cluster_nodes(cluster, member).await {
                Ok(view) => return Ok(view),
                Err(e) => {
                    warn!(member = %member, error = %e, "Member did not answer CLUSTER NODES");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            AppError::ProtocolError("no member answered CLUSTER NODES".to_string())
        }))
    }

    /// Introduce every candidate through `ambassador`. Accepted candidates
    /// that are not registered yet get registered. Returns the failure lines,
    /// empty when every candidate joined.
    pub async fn meet(
        &self,
        cluster: &Cluster,
        ambassador: &Endpoint,
        candidates: &[RedisNode],
    ) -> String {
        let mut failures = String::new();
        for candidate in candidates {
            let address = candidate.address();
            let reply = match self
                .executor
                .cluster_meet(cluster, ambassador, &candidate.endpoint())
                .await
            {
                Ok(()) => String::new(),
                Err(e) => e.to_string(),
            };

            if !meet_succeeded(&reply) {
                warn!(candidate = %address, ambassador = %ambassador, reply = %reply, "Meet rejected");
                failures.push_str(&format!("{} operation failed: {}\n", address, reply));
                continue;
            }

            info!(candidate = %address, ambassador = %ambassador, "Candidate joined cluster");
            if let Err(e) = self.register(candidate).await {
                warn!(candidate = %address, error = %e, "Failed to register joined node");
                failures.push_str(&format!("{} operation failed: {}\n", address, e));
            }
        }
        failures
    }

    async fn register(&self, candidate: &RedisNode) -> Result<()> {
        if self.nodes.exists(candidate.redis_node_id).await? {
            debug!(redis_node_id = candidate.redis_node_id, "Node already registered");
            return Ok(());
        }
        self.nodes.create(&candidate.without_derived()).await?;
        Ok(())
    }

    /// Make the remaining members forget `node`. Refused while the node is
    /// still part of the cluster's membership string.
    pub async fn forget(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        let address = node.address();
        if cluster.lists_member(&address) {
            return Err(AppError::PreconditionError(format!(
                "{} is still listed in cluster {} membership",
                address, cluster.cluster_id
            )));
        }

        let endpoint = node.endpoint();
        let members: Vec<Endpoint> = cluster
            .member_endpoints()
            .into_iter()
            .filter(|member| member != &endpoint)
            .collect();
        if members.is_empty() {
            return Err(AppError::PreconditionError(format!(
                "Cluster {} has no remaining member to forget {}",
                cluster.cluster_id, address
            )));
        }

        let view = self.first_view(cluster, &members).await?;
        let Some(node_id) = find_by_endpoint(&view, &endpoint).map(|info| info.id.clone()) else {
            info!(node = %address, "No member knows the node, nothing to forget");
            return Ok(true);
        };

        let replies = join_all(
            members
                .iter()
                .map(|member| self.executor.cluster_forget(cluster, member, &node_id)),
        )
        .await;

        let rejected: Vec<String> = members
            .iter()
            .zip(replies)
            .filter_map(|(member, reply)| reply.err().map(|e| format!("{} ({})", member, e)))
            .collect();
        if !rejected.is_empty() {
            return Err(ErrorUtils::protocol_error(
                &address,
                format!("FORGET rejected by {}", rejected.join(", ")),
            ));
        }

        info!(node = %address, node_id = %node_id, members = members.len(), "Node forgotten");
        Ok(true)
    }

    /// Give the slots of `slot_range` to `node`. Slots it already serves are
    /// left alone, unassigned slots are added, owned slots are migrated.
    pub async fn move_slot(
        &self,
        cluster: &Cluster,
        node: &RedisNode,
        slot_range: &SlotRange,
    ) -> Result<bool> {
        slot_range.validate()?;
        let target = node.endpoint();
        let view = self.executor.cluster_nodes(cluster, &target).await?;
        let target_id = find_by_endpoint(&view, &target)
            .map(|info| info.id.clone())
            .ok_or_else(|| {
                AppError::PreconditionError(format!("{} does not know itself", target))
            })?;

        let mut unassigned = Vec::new();
        let mut owned_elsewhere: BTreeMap<String, (Endpoint, Vec<u16>)> = BTreeMap::new();
        for slot in slot_range.slots() {
            match slot_owner(&view, slot) {
                Some(owner) if owner.id == target_id => {}
                Some(owner) => owned_elsewhere
                    .entry(owner.id.clone())
                    .or_insert_with(|| (owner.endpoint.clone(), Vec::new()))
                    .1
                    .push(slot),
                None => unassigned.push(slot),
            }
        }

        if unassigned.is_empty() && owned_elsewhere.is_empty() {
            info!(node = %target, "Slots already served by node");
            return Ok(true);
        }

        if !unassigned.is_empty() {
            info!(node = %target, slots = unassigned.len(), "Assigning unassigned slots");
            self.executor
                .cluster_add_slots(cluster, &target, &unassigned)
                .await?;
        }

        let masters: Vec<&ClusterNodeInfo> = view
            .iter()
            .filter(|info| info.is_master() && !info.is_failed())
            .collect();
        for (source_id, (source, slots)) in &owned_elsewhere {
            info!(
                node = %target,
                source = %source,
                slots = slots.len(),
                "Migrating slots"
            );
            for slot in slots {
                self.migrate_slot(cluster, *slot, source_id, source, &target_id, &target, &masters)
                    .await?;
            }
        }
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    async fn migrate_slot(
        &self,
        cluster: &Cluster,
        slot: u16,
        source_id: &str,
        source: &Endpoint,
        target_id: &str,
        target: &Endpoint,
        masters: &[&ClusterNodeInfo],
    ) -> Result<()> {
        self.executor
            .cluster_set_slot(cluster, target, slot, SetSlot::Importing(source_id.to_string()))
            .await?;
        self.executor
            .cluster_set_slot(cluster, source, slot, SetSlot::Migrating(target_id.to_string()))
            .await?;

        if let Err(e) = self.migrate_keys(cluster, slot, source, target).await {
            for endpoint in [target, source] {
                if let Err(reset) = self
                    .executor
                    .cluster_set_slot(cluster, endpoint, slot, SetSlot::Stable)
                    .await
                {
                    warn!(endpoint = %endpoint, slot = slot, error = %reset, "Failed to reset slot state");
                }
            }
            return Err(e);
        }

        let owner = SetSlot::Node(target_id.to_string());
        self.executor
            .cluster_set_slot(cluster, target, slot, owner.clone())
            .await?;
        self.executor
            .cluster_set_slot(cluster, source, slot, owner.clone())
            .await?;
        for master in masters
            .iter()
            .filter(|master| master.id != source_id && master.id != target_id)
        {
            // gossip converges the others anyway
            if let Err(e) = self
                .executor
                .cluster_set_slot(cluster, &master.endpoint, slot, owner.clone())
                .await
            {
                warn!(master = %master.endpoint, slot = slot, error = %e, "Failed to announce slot owner");
            }
        }
        Ok(())
    }

    async fn migrate_keys(
        &self,
        cluster: &Cluster,
        slot: u16,
        source: &Endpoint,
        target: &Endpoint,
    ) -> Result<()> {
        loop {
            let keys = self
                .executor
                .cluster_get_keys_in_slot(cluster, source, slot, self.migrate_batch_size)
                .await?;
            if keys.is_empty() {
                return Ok(());
            }
            debug!(slot = slot, keys = keys.len(), "Migrating key batch");
            self.executor
                .migrate(cluster, source, target, &keys, self.migrate_timeout_ms)
                .await?;
        }
    }

    /// Attach `node` as a replica of its registered master
    pub async fn replicate_of(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        let master_id = node.master_id.ok_or_else(|| {
            AppError::PreconditionError(format!("{} has no masterId", node.address()))
        })?;
        let master = self
            .nodes
            .find_by_id(master_id)
            .await?
            .ok_or_else(|| ErrorUtils::not_found_error("Redis node", &master_id.to_string()))?;

        let master_endpoint = master.endpoint();
        let view = self.executor.cluster_nodes(cluster, &master_endpoint).await?;
        let cluster_master_id = find_by_endpoint(&view, &master_endpoint)
            .map(|info| info.id.clone())
            .ok_or_else(|| {
                AppError::PreconditionError(format!(
                    "Master {} is not part of the cluster",
                    master_endpoint
                ))
            })?;

        self.executor
            .cluster_replicate(cluster, &node.endpoint(), &cluster_master_id)
            .await?;
        info!(node = %node.address(), master = %master_endpoint, "Replication configured");

        match self.nodes.find_by_id(node.redis_node_id).await? {
            Some(mut record) => {
                record.node_role = NodeRole::Replica;
                record.master_id = Some(master_id);
                self.nodes.update(&record).await?;
            }
            None => warn!(
                redis_node_id = node.redis_node_id,
                "Replica is not registered, registry left unchanged"
            ),
        }
        Ok(true)
    }

    /// Promote `node` over its master with an unforced failover. Redis
    /// completes the failover asynchronously, so the registry is only updated
    /// once the node reports itself as master.
    pub async fn fail_over(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        let endpoint = node.endpoint();
        self.executor.cluster_failover(cluster, &endpoint).await?;
        info!(node = %endpoint, "Failover accepted, waiting for promotion");

        if !self.await_promotion(cluster, &endpoint).await {
            warn!(node = %endpoint, "Failover not confirmed, registry left unchanged");
            return Err(ErrorUtils::protocol_error(
                &endpoint.to_string(),
                format!(
                    "failover not confirmed after {} checks",
                    self.failover_confirm_attempts
                ),
            ));
        }

        let Some(mut promoted) = self.nodes.find_by_id(node.redis_node_id).await? else {
            warn!(
                redis_node_id = node.redis_node_id,
                "Promoted node is not registered, registry left unchanged"
            );
            return Ok(true);
        };
        let former_master = promoted.master_id.take();
        promoted.node_role = NodeRole::Master;
        self.nodes.update(&promoted).await?;

        if let Some(master_id) = former_master {
            if let Some(mut demoted) = self.nodes.find_by_id(master_id).await? {
                demoted.node_role = NodeRole::Replica;
                demoted.master_id = Some(promoted.redis_node_id);
                self.nodes.update(&demoted).await?;
            }
        }
        info!(node = %endpoint, "Failover confirmed");
        Ok(true)
    }

    /// Poll the node's own view until it lists itself as master
    async fn await_promotion(&self, cluster: &Cluster, endpoint: &Endpoint) -> bool {
        for attempt in 1..=self.failover_confirm_attempts {
            match self.executor.cluster_nodes(cluster, endpoint).await {
                Ok(view) => {
                    if find_by_endpoint(&view, endpoint).is_some_and(|info| info.is_master()) {
                        return true;
                    }
                }
                Err(e) => debug!(node = %endpoint, attempt = attempt, error = %e, "Promotion check failed"),
            }
            if attempt < self.failover_confirm_attempts {
                tokio::time::sleep(self.failover_confirm_interval).await;
            }
        }
        false
    }
}
