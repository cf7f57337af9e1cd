pub mod cluster;
pub mod endpoint;
pub mod operation;
pub mod redis_node;
pub mod slot;

pub use cluster::{Cluster, ClusterId, InstallationEnvironment};
pub use endpoint::{validate_host, Endpoint};
pub use operation::OperationResult;
pub use redis_node::{NodeRole, RedisNode, RedisNodeId, RunStatus};
pub use slot::{SlotRange, CLUSTER_SLOTS};
