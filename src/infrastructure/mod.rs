pub mod health_checks;
pub mod lifecycle;
pub mod redis;
pub mod repositories;
