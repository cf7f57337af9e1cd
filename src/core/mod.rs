//! Core orchestration logic

pub mod cluster;

pub use cluster::{
    BatchContext, BatchOperationCoordinator, ClusterTopologyClient, NodeLifecycleController,
};
