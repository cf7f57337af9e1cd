//! Redis node entity as stored in the control plane registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cluster::ClusterId;
use super::endpoint::{deserialize_host, Endpoint};

/// Unique identifier for a registered Redis node
pub type RedisNodeId = u64;

/// Replication role of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Master,
    Replica,
    #[default]
    Unknown,
}

/// Derived process state, computed from a liveness probe and never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Stopped,
}

impl From<bool> for RunStatus {
    fn from(reachable: bool) -> Self {
        if reachable {
            RunStatus::Running
        } else {
            RunStatus::Stopped
        }
    }
}

/// A Redis process known to the control plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisNode {
    /// Registry identifier
    pub redis_node_id: RedisNodeId,
    /// Owning cluster
    pub cluster_id: ClusterId,
    #[serde(deserialize_with = "deserialize_host")]
    pub host: String,
    pub port: u16,
    /// Registry identifier of the master this node replicates, if any
    #[serde(default)]
    pub master_id: Option<RedisNodeId>,
    #[serde(default)]
    pub node_role: NodeRole,
    /// Derived on read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_status: Option<RunStatus>,
    /// Derived on read: whether the cluster membership string lists this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_cluster: Option<bool>,
    /// Derived on read from a live cluster view: the id Redis assigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Derived on read from a live cluster view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_state: Option<String>,
    /// Derived on read from a live cluster view: inclusive slot ranges served
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<(u16, u16)>>,
    #[serde(default = "Utc::now")]
    pub insert_time: DateTime<Utc>,
}

impl RedisNode {
    pub fn new(
        redis_node_id: RedisNodeId,
        cluster_id: ClusterId,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            redis_node_id,
            cluster_id,
            host: host.into(),
            port,
            master_id: None,
            node_role: NodeRole::Unknown,
            run_status: None,
            in_cluster: None,
            node_id: None,
            link_state: None,
            slots: None,
            insert_time: Utc::now(),
        }
    }

    /// `host:port`, the form used in membership strings and failure lines
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Copy with the derived fields cleared, as persisted by registries
    pub fn without_derived(&self) -> Self {
        Self {
            run_status: None,
            in_cluster: None,
            node_id: None,
            link_state: None,
            slots: None,
            ..self.clone()
        }
    }
}
