pub mod health;
pub mod node_manage;

pub use health::health_check_handler;
