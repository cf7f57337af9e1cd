use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use redis_fleet::domain::entities::{
    Cluster, ClusterId, Endpoint, InstallationEnvironment, RedisNode, RedisNodeId,
};
use redis_fleet::domain::repositories::RedisNodeRepository;
use redis_fleet::error::{AppError, Result};
use redis_fleet::infrastructure::health_checks::LivenessProbe;
use redis_fleet::infrastructure::lifecycle::NodeLifecycleOperation;
use redis_fleet::infrastructure::redis::{ClusterCommandExecutor, ClusterNodeInfo, SetSlot};

/// Probe answering from a fixed reachability table; unknown endpoints are down
#[derive(Clone, Default)]
pub struct MockLivenessProbe {
    reachable: Arc<RwLock<HashMap<String, bool>>>,
    call_count: Arc<RwLock<usize>>,
}

impl MockLivenessProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_reachable(&self, address: &str, reachable: bool) {
        self.reachable
            .write()
            .await
            .insert(address.to_string(), reachable);
    }

    pub async fn get_call_count(&self) -> usize {
        *self.call_count.read().await
    }
}

#[async_trait]
impl LivenessProbe for MockLivenessProbe {
    async fn reachable(&self, host: &str, port: u16) -> bool {
        *self.call_count.write().await += 1;
        self.reachable
            .read()
            .await
            .get(&format!("{}:{}", host, port))
            .copied()
            .unwrap_or(false)
    }
}

#[derive(Clone)]
enum MockOutcome {
    Result(bool),
    Error(String),
}

/// Lifecycle implementation recording `(action, host:port)` calls
#[derive(Clone)]
pub struct MockNodeOperation {
    environment: InstallationEnvironment,
    calls: Arc<RwLock<Vec<(String, String)>>>,
    outcomes: Arc<RwLock<HashMap<(String, String), MockOutcome>>>,
}

impl MockNodeOperation {
    pub fn new(environment: InstallationEnvironment) -> Self {
        Self {
            environment,
            calls: Arc::new(RwLock::new(Vec::new())),
            outcomes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn set_result(&self, action: &str, address: &str, result: bool) {
        self.outcomes.write().await.insert(
            (action.to_string(), address.to_string()),
            MockOutcome::Result(result),
        );
    }

    pub async fn set_error(&self, action: &str, address: &str, message: &str) {
        self.outcomes.write().await.insert(
            (action.to_string(), address.to_string()),
            MockOutcome::Error(message.to_string()),
        );
    }

    pub async fn calls(&self) -> Vec<(String, String)> {
        self.calls.read().await.clone()
    }

    pub async fn calls_for(&self, action: &str) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|(called, _)| called == action)
            .map(|(_, address)| address.clone())
            .collect()
    }

    async fn record(&self, action: &str, node: &RedisNode) -> Result<bool> {
        let key = (action.to_string(), node.address());
        self.calls.write().await.push(key.clone());
        match self.outcomes.read().await.get(&key).cloned() {
            Some(MockOutcome::Result(result)) => Ok(result),
            Some(MockOutcome::Error(message)) => Err(AppError::ExternalServiceError(message)),
            None => Ok(true),
        }
    }
}

#[async_trait]
impl NodeLifecycleOperation for MockNodeOperation {
    fn environment(&self) -> InstallationEnvironment {
        self.environment
    }

    async fn start(&self, _cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.record("start", node).await
    }

    async fn stop(&self, _cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.record("stop", node).await
    }

    async fn restart(&self, _cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.record("restart", node).await
    }

    async fn remove(&self, _cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.record("remove", node).await
    }
}

/// In-process stand-in for a Redis Cluster. Slot ownership and keys change as
/// commands arrive, so repeated calls observe earlier effects.
#[derive(Clone, Default)]
pub struct MockClusterExecutor {
    view: Arc<RwLock<Vec<ClusterNodeInfo>>>,
    keys: Arc<RwLock<HashMap<u16, Vec<Vec<u8>>>>>,
    commands: Arc<RwLock<Vec<String>>>,
    meet_failures: Arc<RwLock<HashMap<String, String>>>,
    unreachable: Arc<RwLock<HashSet<String>>>,
    migrate_failure: Arc<RwLock<Option<String>>>,
    failover_stalled: Arc<RwLock<bool>>,
}

impl MockClusterExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the cluster view. `slots` are inclusive ranges.
    pub async fn add_node(
        &self,
        id: &str,
        address: &str,
        master_id: Option<&str>,
        slots: &[(u16, u16)],
    ) {
        let role = if master_id.is_some() { "slave" } else { "master" };
        let endpoint: Endpoint = address.parse().unwrap();
        self.view.write().await.push(ClusterNodeInfo {
            id: id.to_string(),
            endpoint,
            flags: vec![role.to_string()],
            master_id: master_id.map(str::to_string),
            link_state: "connected".to_string(),
            slots: slots.to_vec(),
        });
    }

    pub async fn add_keys(&self, slot: u16, keys: &[&str]) {
        self.keys
            .write()
            .await
            .entry(slot)
            .or_default()
            .extend(keys.iter().map(|key| key.as_bytes().to_vec()));
    }

    pub async fn set_meet_failure(&self, candidate: &str, message: &str) {
        self.meet_failures
            .write()
            .await
            .insert(candidate.to_string(), message.to_string());
    }

    pub async fn set_unreachable(&self, address: &str) {
        self.unreachable.write().await.insert(address.to_string());
    }

    pub async fn set_migrate_failure(&self, message: &str) {
        *self.migrate_failure.write().await = Some(message.to_string());
    }

    /// FAILOVER is accepted but the roles never change
    pub async fn set_failover_stalled(&self) {
        *self.failover_stalled.write().await = true;
    }

    pub async fn commands(&self) -> Vec<String> {
        self.commands.read().await.clone()
    }

    pub async fn commands_starting_with(&self, prefix: &str) -> Vec<String> {
        self.commands
            .read()
            .await
            .iter()
            .filter(|command| command.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub async fn owner_of(&self, slot: u16) -> Option<String> {
        self.view
            .read()
            .await
            .iter()
            .find(|info| info.owns_slot(slot))
            .map(|info| info.id.clone())
    }

    pub async fn remaining_keys(&self, slot: u16) -> usize {
        self.keys.read().await.get(&slot).map(Vec::len).unwrap_or(0)
    }

    async fn log(&self, endpoint: &Endpoint, command: String) -> Result<()> {
        self.commands.write().await.push(command);
        if self.unreachable.read().await.contains(&endpoint.to_string()) {
            return Err(AppError::ProtocolError(format!(
                "{}: connection refused",
                endpoint
            )));
        }
        Ok(())
    }

    async fn assign_slot(&self, slot: u16, owner_id: &str) {
        let mut view = self.view.write().await;
        for info in view.iter_mut() {
            let mut slots: Vec<u16> = info
                .slots
                .iter()
                .flat_map(|(start, end)| *start..=*end)
                .filter(|owned| *owned != slot)
                .collect();
            if info.id == owner_id {
                slots.push(slot);
                slots.sort_unstable();
            }
            info.slots = slots.into_iter().map(|owned| (owned, owned)).collect();
        }
    }

    async fn id_of(&self, endpoint: &Endpoint) -> Option<String> {
        self.view
            .read()
            .await
            .iter()
            .find(|info| &info.endpoint == endpoint)
            .map(|info| info.id.clone())
    }
}

#[async_trait]
impl ClusterCommandExecutor for MockClusterExecutor {
    async fn cluster_nodes(
        &self,
        _cluster: &Cluster,
        endpoint: &Endpoint,
    ) -> Result<Vec<ClusterNodeInfo>> {
        self.log(endpoint, format!("NODES {}", endpoint)).await?;
        Ok(self.view.read().await.clone())
    }

    async fn cluster_meet(
        &self,
        _cluster: &Cluster,
        endpoint: &Endpoint,
        candidate: &Endpoint,
    ) -> Result<()> {
        self.log(endpoint, format!("MEET {} {}", endpoint, candidate))
            .await?;
        match self.meet_failures.read().await.get(&candidate.to_string()) {
            Some(message) => Err(AppError::ProtocolError(message.clone())),
            None => Ok(()),
        }
    }

    async fn cluster_forget(
        &self,
        _cluster: &Cluster,
        endpoint: &Endpoint,
        node_id: &str,
    ) -> Result<()> {
        self.log(endpoint, format!("FORGET {} {}", endpoint, node_id))
            .await
    }

    async fn cluster_add_slots(
        &self,
        _cluster: &Cluster,
        endpoint: &Endpoint,
        slots: &[u16],
    ) -> Result<()> {
        self.log(endpoint, format!("ADDSLOTS {} {}", endpoint, slots.len()))
            .await?;
        if let Some(id) = self.id_of(endpoint).await {
            for slot in slots {
                self.assign_slot(*slot, &id).await;
            }
        }
        Ok(())
    }

    async fn cluster_set_slot(
        &self,
        _cluster: &Cluster,
        endpoint: &Endpoint,
        slot: u16,
        state: SetSlot,
    ) -> Result<()> {
        self.log(endpoint, format!("SETSLOT {} {} {:?}", endpoint, slot, state))
            .await?;
        if let SetSlot::Node(owner) = state {
            self.assign_slot(slot, &owner).await;
        }
        Ok(())
    }

    async fn cluster_get_keys_in_slot(
        &self,
        _cluster: &Cluster,
        endpoint: &Endpoint,
        slot: u16,
        count: usize,
    ) -> Result<Vec<Vec<u8>>> {
        self.log(endpoint, format!("GETKEYSINSLOT {} {}", endpoint, slot))
            .await?;
        Ok(self
            .keys
            .read()
            .await
            .get(&slot)
            .map(|keys| keys.iter().take(count).cloned().collect())
            .unwrap_or_default())
    }

    async fn migrate(
        &self,
        _cluster: &Cluster,
        source: &Endpoint,
        target: &Endpoint,
        keys: &[Vec<u8>],
        _timeout_ms: u64,
    ) -> Result<()> {
        self.log(source, format!("MIGRATE {} {} {}", source, target, keys.len()))
            .await?;
        if let Some(message) = self.migrate_failure.read().await.clone() {
            return Err(AppError::ProtocolError(message));
        }
        for slot_keys in self.keys.write().await.values_mut() {
            slot_keys.retain(|key| !keys.contains(key));
        }
        Ok(())
    }

    async fn cluster_replicate(
        &self,
        _cluster: &Cluster,
        endpoint: &Endpoint,
        master_id: &str,
    ) -> Result<()> {
        self.log(endpoint, format!("REPLICATE {} {}", endpoint, master_id))
            .await
    }

    async fn cluster_failover(&self, _cluster: &Cluster, endpoint: &Endpoint) -> Result<()> {
        self.log(endpoint, format!("FAILOVER {}", endpoint)).await?;
        if *self.failover_stalled.read().await {
            return Ok(());
        }

        let mut view = self.view.write().await;
        let Some(promoted) = view.iter().position(|info| &info.endpoint == endpoint) else {
            return Ok(());
        };
        let Some(master_id) = view[promoted].master_id.take() else {
            return Ok(());
        };
        let promoted_id = view[promoted].id.clone();
        view[promoted].flags = vec!["master".to_string()];
        for info in view.iter_mut().filter(|info| info.id == master_id) {
            info.flags = vec!["slave".to_string()];
            info.master_id = Some(promoted_id.clone());
            info.slots.clear();
        }
        Ok(())
    }
}

/// Node registry delegating to an inner one, with per-node write failures
#[derive(Clone)]
pub struct FaultyNodeRepository<R: RedisNodeRepository + Clone> {
    inner: R,
    create_failures: Arc<RwLock<HashMap<RedisNodeId, String>>>,
    delete_failures: Arc<RwLock<HashMap<RedisNodeId, String>>>,
}

impl<R: RedisNodeRepository + Clone> FaultyNodeRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            create_failures: Arc::new(RwLock::new(HashMap::new())),
            delete_failures: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn fail_create(&self, node_id: RedisNodeId, message: &str) {
        self.create_failures
            .write()
            .await
            .insert(node_id, message.to_string());
    }

    pub async fn fail_delete(&self, node_id: RedisNodeId, message: &str) {
        self.delete_failures
            .write()
            .await
            .insert(node_id, message.to_string());
    }
}

#[async_trait]
impl<R: RedisNodeRepository + Clone> RedisNodeRepository for FaultyNodeRepository<R> {
    async fn create(&self, node: &RedisNode) -> Result<RedisNode> {
        if let Some(message) = self.create_failures.read().await.get(&node.redis_node_id) {
            return Err(AppError::PersistenceError(message.clone()));
        }
        self.inner.create(node).await
    }

    async fn find_by_id(&self, node_id: RedisNodeId) -> Result<Option<RedisNode>> {
        self.inner.find_by_id(node_id).await
    }

    async fn find_by_cluster_id(&self, cluster_id: ClusterId) -> Result<Vec<RedisNode>> {
        self.inner.find_by_cluster_id(cluster_id).await
    }

    async fn update(&self, node: &RedisNode) -> Result<RedisNode> {
        self.inner.update(node).await
    }

    async fn delete(&self, node_id: RedisNodeId) -> Result<()> {
        if let Some(message) = self.delete_failures.read().await.get(&node_id) {
            return Err(AppError::PersistenceError(message.clone()));
        }
        self.inner.delete(node_id).await
    }
}
