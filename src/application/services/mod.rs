pub mod node_manage;

// Re-export commonly used services
pub use node_manage::{BatchOperation, MoveSlotRequest, NodeManageService};
