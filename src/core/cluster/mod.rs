//! Node lifecycle and topology orchestration
//!
//! Batch operations resolve their cluster once, then drive either the
//! lifecycle state machine or the topology client for every node.

pub mod batch;
pub mod lifecycle;
pub mod topology;

pub use batch::{BatchContext, BatchOperationCoordinator};
pub use lifecycle::NodeLifecycleController;
pub use topology::{meet_succeeded, ClusterTopologyClient};
