pub mod cluster;
pub mod redis_node;

pub use cluster::ClusterRepository;
pub use redis_node::RedisNodeRepository;
