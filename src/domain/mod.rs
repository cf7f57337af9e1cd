//! Domain layer: the Redis fleet model and the registry interfaces the
//! orchestrator consumes.

pub mod entities;
pub mod repositories;
