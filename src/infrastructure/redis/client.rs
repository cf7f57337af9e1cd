use async_trait::async_trait;
use redis::{Cmd, ConnectionInfo, FromRedisValue, IntoConnectionInfo};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use super::nodes_parser::{parse_cluster_nodes, ClusterNodeInfo};
use crate::domain::entities::{Cluster, Endpoint};
use crate::error::{utils::ErrorUtils, Result};

/// Argument of `CLUSTER SETSLOT <slot> ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetSlot {
    /// `IMPORTING <source-id>`
    Importing(String),
    /// `MIGRATING <target-id>`
    Migrating(String),
    /// `NODE <owner-id>`
    Node(String),
    /// `STABLE`, drops importing and migrating state
    Stable,
}

/// Low-level cluster commands, each sent to a single member.
///
/// Every call is bounded by the executor's command timeout; failures and
/// timeouts surface as `AppError::ProtocolError`.
#[async_trait]
pub trait ClusterCommandExecutor: Send + Sync {
    async fn cluster_nodes(
        &self,
        cluster: &Cluster,
        endpoint: &Endpoint,
    ) -> Result<Vec<ClusterNodeInfo>>;

    async fn cluster_meet(
        &self,
        cluster: &Cluster,
        endpoint: &Endpoint,
        candidate: &Endpoint,
    ) -> Result<()>;

    async fn cluster_forget(&self, cluster: &Cluster, endpoint: &Endpoint, node_id: &str)
        -> Result<()>;

    async fn cluster_add_slots(
        &self,
        cluster: &Cluster,
        endpoint: &Endpoint,
        slots: &[u16],
    ) -> Result<()>;

    async fn cluster_set_slot(
        &self,
        cluster: &Cluster,
        endpoint: &Endpoint,
        slot: u16,
        state: SetSlot,
    ) -> Result<()>;

    async fn cluster_get_keys_in_slot(
        &self,
        cluster: &Cluster,
        endpoint: &Endpoint,
        slot: u16,
        count: usize,
    ) -> Result<Vec<Vec<u8>>>;

    /// `MIGRATE` a batch of keys from `source` to `target`
    async fn migrate(
        &self,
        cluster: &Cluster,
        source: &Endpoint,
        target: &Endpoint,
        keys: &[Vec<u8>],
        timeout_ms: u64,
    ) -> Result<()>;

    async fn cluster_replicate(
        &self,
        cluster: &Cluster,
        endpoint: &Endpoint,
        master_id: &str,
    ) -> Result<()>;

    /// Unforced `CLUSTER FAILOVER`
    async fn cluster_failover(&self, cluster: &Cluster, endpoint: &Endpoint) -> Result<()>;
}

/// `redis` crate implementation: one short-lived multiplexed connection per
/// command.
pub struct RedisClusterCommandExecutor {
    command_timeout: Duration,
}

impl RedisClusterCommandExecutor {
    pub fn new(command_timeout_ms: u64) -> Self {
        Self {
            command_timeout: Duration::from_millis(command_timeout_ms),
        }
    }

    fn connection_info(cluster: &Cluster, endpoint: &Endpoint) -> Result<ConnectionInfo> {
        let mut info = (endpoint.host.as_str(), endpoint.port)
            .into_connection_info()
            .map_err(|e| ErrorUtils::protocol_error(&endpoint.to_string(), e))?;
        info.redis.password = cluster.redis_password.clone();
        Ok(info)
    }

    async fn query<T>(&self, cluster: &Cluster, endpoint: &Endpoint, cmd: Cmd) -> Result<T>
    where
        T: FromRedisValue + Send,
    {
        let address = endpoint.to_string();
        let info = Self::connection_info(cluster, endpoint)?;
        debug!(endpoint = %address, "Sending cluster command");

        let exchange = async {
            let client = redis::Client::open(info)?;
            let mut conn = client.get_multiplexed_async_connection().await?;
            cmd.query_async::<_, T>(&mut conn).await
        };

        match timeout(self.command_timeout, exchange).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ErrorUtils::protocol_error(&address, e)),
            Err(_) => Err(ErrorUtils::protocol_error(
                &address,
                format!(
                    "command timed out after {}ms",
                    self.command_timeout.as_millis()
                ),
            )),
        }
    }
}

fn cluster_cmd(subcommand: &str) -> Cmd {
    let mut cmd = redis::cmd("CLUSTER");
    cmd.arg(subcommand);
    cmd
}

pub(crate) fn set_slot_cmd(slot: u16, state: &SetSlot) -> Cmd {
    let mut cmd = cluster_cmd("SETSLOT");
    cmd.arg(slot);
    match state {
        SetSlot::Importing(id) => cmd.arg("IMPORTING").arg(id),
        SetSlot::Migrating(id) => cmd.arg("MIGRATING").arg(id),
        SetSlot::Node(id) => cmd.arg("NODE").arg(id),
        SetSlot::Stable => cmd.arg("STABLE"),
    };
    cmd
}

pub(crate) fn migrate_cmd(
    target: &Endpoint,
    keys: &[Vec<u8>],
    timeout_ms: u64,
    password: Option<&str>,
) -> Cmd {
    let mut cmd = redis::cmd("MIGRATE");
    cmd.arg(&target.host).arg(target.port).arg("").arg(0).arg(timeout_ms);
    if let Some(password) = password {
        cmd.arg("AUTH").arg(password);
    }
    cmd.arg("KEYS");
    for key in keys {
        cmd.arg(key.as_slice());
    }
    cmd
}

#[async_trait]
impl ClusterCommandExecutor for RedisClusterCommandExecutor {
    async fn cluster_nodes(
        &self,
        cluster: &Cluster,
        endpoint: &Endpoint,
    ) -> Result<Vec<ClusterNodeInfo>> {
        let listing: String = self.query(cluster, endpoint, cluster_cmd("NODES")).await?;
        Ok(parse_cluster_nodes(&listing))
    }

    async fn cluster_meet(
        &self,
        cluster: &Cluster,
        endpoint: &Endpoint,
        candidate: &Endpoint,
    ) -> Result<()> {
        let mut cmd = cluster_cmd("MEET");
        cmd.arg(&candidate.host).arg(candidate.port);
        self.query(cluster, endpoint, cmd).await
    }

    async fn cluster_forget(
        &self,
        cluster: &Cluster,
        endpoint: &Endpoint,
        node_id: &str,
    ) -> Result<()> {
        let mut cmd = cluster_cmd("FORGET");
        cmd.arg(node_id);
        self.query(cluster, endpoint, cmd).await
    }

    async fn cluster_add_slots(
        &self,
        cluster: &Cluster,
        endpoint: &Endpoint,
        slots: &[u16],
    ) -> Result<()> {
        let mut cmd = cluster_cmd("ADDSLOTS");
        for slot in slots {
            cmd.arg(*slot);
        }
        self.query(cluster, endpoint, cmd).await
    }

    async fn cluster_set_slot(
        &self,
        cluster: &Cluster,
        endpoint: &Endpoint,
        slot: u16,
        state: SetSlot,
    ) -> Result<()> {
        self.query(cluster, endpoint, set_slot_cmd(slot, &state)).await
    }

    async fn cluster_get_keys_in_slot(
        &self,
        cluster: &Cluster,
        endpoint: &Endpoint,
        slot: u16,
        count: usize,
    ) -> Result<Vec<Vec<u8>>> {
        let mut cmd = cluster_cmd("GETKEYSINSLOT");
        cmd.arg(slot).arg(count);
        self.query(cluster, endpoint, cmd).await
    }

    async fn migrate(
        &self,
        cluster: &Cluster,
        source: &Endpoint,
        target: &Endpoint,
        keys: &[Vec<u8>],
        timeout_ms: u64,
    ) -> Result<()> {
        let cmd = migrate_cmd(target, keys, timeout_ms, cluster.redis_password.as_deref());
        self.query(cluster, source, cmd).await
    }

    async fn cluster_replicate(
        &self,
        cluster: &Cluster,
        endpoint: &Endpoint,
        master_id: &str,
    ) -> Result<()> {
        let mut cmd = cluster_cmd("REPLICATE");
        cmd.arg(master_id);
        self.query(cluster, endpoint, cmd).await
    }

    async fn cluster_failover(&self, cluster: &Cluster, endpoint: &Endpoint) -> Result<()> {
        self.query(cluster, endpoint, cluster_cmd("FAILOVER")).await
    }
}
