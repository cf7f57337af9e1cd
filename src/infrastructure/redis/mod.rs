//! Redis Cluster protocol access

pub mod client;
pub mod nodes_parser;

pub use client::{ClusterCommandExecutor, RedisClusterCommandExecutor, SetSlot};
pub use nodes_parser::{find_by_endpoint, parse_cluster_nodes, slot_owner, ClusterNodeInfo};
