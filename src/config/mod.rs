pub mod app_config;

pub use app_config::{
    AppConfiguration, ClusterSeed, ConfigManager, DockerConfig, EnvironmentsConfig,
    HumpbackConfig, MachineConfig, ObservabilityConfig, OrchestratorConfig, ServerConfig,
};
