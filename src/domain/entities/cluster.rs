//! Cluster domain entities
//!
//! A `Cluster` carries the membership string reported by Redis itself. That
//! string, not the node registry, decides whether an endpoint is a member.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::endpoint::Endpoint;

/// Unique identifier for a managed cluster
pub type ClusterId = u64;

/// How the Redis processes of a cluster were installed. Selects the lifecycle
/// implementation used for every node of the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallationEnvironment {
    /// Bare `redis-server` processes driven over ssh
    Machine,
    /// Containers on a remote Docker daemon
    Docker,
    /// Containers managed through the Humpback platform API
    Humpback,
}

impl fmt::Display for InstallationEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallationEnvironment::Machine => "machine",
            InstallationEnvironment::Docker => "docker",
            InstallationEnvironment::Humpback => "humpback",
        };
        f.write_str(name)
    }
}

/// Cluster entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Unique cluster identifier
    pub cluster_id: ClusterId,
    /// Display name
    #[serde(default)]
    pub cluster_name: String,
    /// Comma separated `host:port` members, as reported by the cluster
    #[serde(default)]
    pub nodes: String,
    /// Installation environment shared by every node of the cluster
    pub installation_environment: InstallationEnvironment,
    /// Password sent with every cluster command, if the cluster requires one
    #[serde(default, skip_serializing)]
    pub redis_password: Option<String>,
}

impl Cluster {
    pub fn new(
        cluster_id: ClusterId,
        nodes: impl Into<String>,
        installation_environment: InstallationEnvironment,
    ) -> Self {
        Self {
            cluster_id,
            cluster_name: format!("cluster-{}", cluster_id),
            nodes: nodes.into(),
            installation_environment,
            redis_password: None,
        }
    }

    /// Whether the membership string still mentions `address`. Plain
    /// substring test, so `10.0.0.1:700` also matches `10.0.0.1:7000`.
    pub fn lists_member(&self, address: &str) -> bool {
        self.nodes.contains(address)
    }

    /// Members parsed from the membership string, in listed order.
    /// Entries that do not parse as `host:port` are skipped.
    pub fn member_endpoints(&self) -> Vec<Endpoint> {
        self.nodes
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| entry.parse().ok())
            .collect()
    }

    /// The member that receives membership-join commands on behalf of new
    /// candidates.
    pub fn ambassador(&self) -> Option<Endpoint> {
        self.member_endpoints().into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(nodes: &str) -> Cluster {
        Cluster::new(7, nodes, InstallationEnvironment::Machine)
    }

    #[test]
    fn test_member_endpoints_in_listed_order() {
        let cluster = cluster("10.0.0.1:7000,10.0.0.2:7000, 10.0.0.3:7001");
        let members = cluster.member_endpoints();
        assert_eq!(members.len(), 3);
        assert_eq!(members[0], Endpoint::new("10.0.0.1", 7000));
        assert_eq!(members[2], Endpoint::new("10.0.0.3", 7001));
    }

    #[test]
    fn test_member_endpoints_skips_invalid_entries() {
        let cluster = cluster("10.0.0.1:7000,,garbage,10.0.0.2:7000");
        assert_eq!(cluster.member_endpoints().len(), 2);
    }

    #[test]
    fn test_ambassador_is_first_member() {
        assert_eq!(
            cluster("10.0.0.9:7005,10.0.0.1:7000").ambassador(),
            Some(Endpoint::new("10.0.0.9", 7005))
        );
        assert_eq!(cluster("").ambassador(), None);
    }

    #[test]
    fn test_lists_member_is_substring_match() {
        let cluster = cluster("10.0.0.1:7000,10.0.0.2:7000");
        assert!(cluster.lists_member("10.0.0.2:7000"));
        assert!(!cluster.lists_member("10.0.0.3:7000"));
    }

    #[test]
    fn test_environment_serde_names() {
        let env: InstallationEnvironment = serde_json::from_str("\"DOCKER\"").unwrap();
        assert_eq!(env, InstallationEnvironment::Docker);
        assert_eq!(env.to_string(), "docker");
    }
}
