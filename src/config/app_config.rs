use crate::domain::entities::{Cluster, RedisNode};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfiguration {
    pub server: ServerConfig,
    pub orchestrator: OrchestratorConfig,
    pub environments: EnvironmentsConfig,
    pub observability: ObservabilityConfig,
    /// Clusters and registered nodes loaded into the in-memory registry
    pub clusters: Vec<ClusterSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Bound on a single liveness probe
    pub probe_timeout_ms: u64,
    /// Bound on a single cluster command round trip
    pub command_timeout_ms: u64,
    /// Per-node tasks running at once within one batch
    pub max_concurrency: usize,
    /// Keys moved per MIGRATE during slot migration
    pub migrate_batch_size: usize,
    /// Timeout handed to MIGRATE itself
    pub migrate_timeout_ms: u64,
    /// CLUSTER NODES polls spent waiting for a failover to take effect
    pub failover_confirm_attempts: u32,
    pub failover_confirm_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentsConfig {
    pub machine: MachineConfig,
    pub docker: DockerConfig,
    pub humpback: HumpbackConfig,
}

/// Bare-process installs driven over ssh.
///
/// Command templates accept `{host}`, `{port}`, `{cluster_id}` and
/// `{install_dir}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub ssh_user: String,
    pub ssh_port: u16,
    pub install_dir: String,
    pub start_command: String,
    pub stop_command: String,
    pub remove_command: String,
    pub command_timeout_seconds: u64,
}

/// Containers on a remote Docker daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    pub docker_binary: String,
    pub daemon_port: u16,
    pub container_name_template: String,
    pub command_timeout_seconds: u64,
}

/// Containers managed through the Humpback API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HumpbackConfig {
    pub api_port: u16,
    pub container_name_template: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

/// A cluster plus the nodes already registered for it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSeed {
    #[serde(flatten)]
    pub cluster: Cluster,
    #[serde(default)]
    pub redis_nodes: Vec<RedisNode>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 2000,
            command_timeout_ms: 5000,
            max_concurrency: 8,
            migrate_batch_size: 100,
            migrate_timeout_ms: 5000,
            failover_confirm_attempts: 10,
            failover_confirm_interval_ms: 500,
        }
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            ssh_user: "redis".to_string(),
            ssh_port: 22,
            install_dir: "/data/redis".to_string(),
            start_command: "redis-server {install_dir}/{port}/redis.conf".to_string(),
            stop_command: "redis-cli -h {host} -p {port} shutdown nosave".to_string(),
            remove_command: "rm -rf {install_dir}/{port}".to_string(),
            command_timeout_seconds: 30,
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            docker_binary: "docker".to_string(),
            daemon_port: 2375,
            container_name_template: "redis-{port}".to_string(),
            command_timeout_seconds: 30,
        }
    }
}

impl Default for HumpbackConfig {
    fn default() -> Self {
        Self {
            api_port: 8500,
            container_name_template: "redis-{port}".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Configuration manager: defaults, then `CONFIG_FILE`, then environment
/// overrides, then validation.
pub struct ConfigManager {
    config: Arc<RwLock<AppConfiguration>>,
    config_path: Option<String>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfiguration::default())),
            config_path: None,
        }
    }

    /// Load configuration from an optional config file and the environment
    pub async fn load(&mut self) -> Result<()> {
        let mut config = AppConfiguration::default();

        if let Ok(config_path) = std::env::var("CONFIG_FILE") {
            config = Self::load_from_file(&config_path).await?;
            self.config_path = Some(config_path);
        }

        Self::apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        Self::validate_config(&config)?;

        let mut current_config = self.config.write().await;
        *current_config = config;

        info!(config_path = ?self.config_path, "Configuration loaded");
        Ok(())
    }

    /// Apply overrides from a key lookup (the process environment in `load`)
    pub fn apply_overrides<F>(config: &mut AppConfiguration, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SERVER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.server.port = parse_override("PORT", &port)?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            config.observability.log_level = level;
        }
        if let Some(timeout) = lookup("PROBE_TIMEOUT_MS") {
            config.orchestrator.probe_timeout_ms = parse_override("PROBE_TIMEOUT_MS", &timeout)?;
        }
        if let Some(timeout) = lookup("COMMAND_TIMEOUT_MS") {
            config.orchestrator.command_timeout_ms =
                parse_override("COMMAND_TIMEOUT_MS", &timeout)?;
        }
        if let Some(concurrency) = lookup("MAX_CONCURRENCY") {
            config.orchestrator.max_concurrency = parse_override("MAX_CONCURRENCY", &concurrency)?;
        }

        debug!("Configuration overrides applied from environment");
        Ok(())
    }

    /// Load configuration from file
    pub async fn load_from_file(path: &str) -> Result<AppConfiguration> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::ConfigError(format!("Failed to read config file {}: {}", path, e))
        })?;

        let file_config: AppConfiguration = if path.ends_with(".yaml") || path.ends_with(".yml") {
            serde_yaml::from_str(&content)
                .map_err(|e| AppError::ConfigError(format!("Invalid YAML config: {}", e)))?
        } else if path.ends_with(".json") {
            serde_json::from_str(&content)
                .map_err(|e| AppError::ConfigError(format!("Invalid JSON config: {}", e)))?
        } else {
            return Err(AppError::ConfigError(
                "Config file must be .yaml, .yml, or .json".to_string(),
            ));
        };

        debug!(path = path, "Configuration loaded from file");
        Ok(file_config)
    }

    /// Validate configuration
    pub fn validate_config(config: &AppConfiguration) -> Result<()> {
        if config.server.port == 0 {
            return Err(AppError::ConfigError("Invalid server port".to_string()));
        }

        let orchestrator = &config.orchestrator;
        if orchestrator.probe_timeout_ms == 0 || orchestrator.command_timeout_ms == 0 {
            return Err(AppError::ConfigError(
                "Probe and command timeouts must be positive".to_string(),
            ));
        }
        if orchestrator.max_concurrency == 0 {
            return Err(AppError::ConfigError(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if orchestrator.failover_confirm_attempts == 0 {
            return Err(AppError::ConfigError(
                "failover_confirm_attempts must be at least 1".to_string(),
            ));
        }
        if orchestrator.migrate_batch_size == 0 {
            return Err(AppError::ConfigError(
                "migrate_batch_size must be at least 1".to_string(),
            ));
        }

        match config.observability.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(AppError::ConfigError("Invalid log level".to_string())),
        }

        let mut cluster_ids = HashSet::new();
        let mut node_ids = HashSet::new();
        for seed in &config.clusters {
            if !cluster_ids.insert(seed.cluster.cluster_id) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate cluster id {}",
                    seed.cluster.cluster_id
                )));
            }
            for node in &seed.redis_nodes {
                if node.cluster_id != seed.cluster.cluster_id {
                    return Err(AppError::ConfigError(format!(
                        "Redis node {} is listed under cluster {} but belongs to cluster {}",
                        node.redis_node_id, seed.cluster.cluster_id, node.cluster_id
                    )));
                }
                if !node_ids.insert(node.redis_node_id) {
                    return Err(AppError::ConfigError(format!(
                        "Duplicate redis node id {}",
                        node.redis_node_id
                    )));
                }
            }
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    /// Get current configuration
    pub async fn get(&self) -> AppConfiguration {
        self.config.read().await.clone()
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::InstallationEnvironment;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfiguration::default();
        assert!(ConfigManager::validate_config(&config).is_ok());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.orchestrator.probe_timeout_ms, 2000);
        assert_eq!(config.orchestrator.max_concurrency, 8);
    }

    #[tokio::test]
    async fn test_config_from_yaml_file() {
        let mut temp_file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            temp_file,
            r#"
server:
  port: 9000
orchestrator:
  probe_timeout_ms: 500
environments:
  docker:
    daemon_port: 2376
clusters:
  - clusterId: 7
    clusterName: orders
    nodes: "10.0.0.1:7000,10.0.0.2:7000"
    installationEnvironment: DOCKER
    redisNodes:
      - redisNodeId: 1
        clusterId: 7
        host: 10.0.0.1
        port: 7000
"#
        )
        .unwrap();

        let config = ConfigManager::load_from_file(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.orchestrator.probe_timeout_ms, 500);
        assert_eq!(config.orchestrator.command_timeout_ms, 5000);
        assert_eq!(config.environments.docker.daemon_port, 2376);
        assert_eq!(config.clusters.len(), 1);
        assert_eq!(
            config.clusters[0].cluster.installation_environment,
            InstallationEnvironment::Docker
        );
        assert_eq!(config.clusters[0].redis_nodes[0].address(), "10.0.0.1:7000");
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_extension_is_rejected() {
        let temp_file = Builder::new().suffix(".toml").tempfile().unwrap();
        let result = ConfigManager::load_from_file(temp_file.path().to_str().unwrap()).await;
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [("PORT", "9100"), ("MAX_CONCURRENCY", "2")]
            .into_iter()
            .collect();
        let mut config = AppConfiguration::default();
        ConfigManager::apply_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.orchestrator.max_concurrency, 2);
    }

    #[test]
    fn test_invalid_override_is_config_error() {
        let mut config = AppConfiguration::default();
        let result = ConfigManager::apply_overrides(&mut config, |key| {
            (key == "PROBE_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfiguration::default();
        config.orchestrator.max_concurrency = 0;
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = AppConfiguration::default();
        config.orchestrator.failover_confirm_attempts = 0;
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = AppConfiguration::default();
        config.observability.log_level = "verbose".to_string();
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = AppConfiguration::default();
        let cluster = Cluster::new(7, "10.0.0.1:7000", InstallationEnvironment::Machine);
        config.clusters = vec![ClusterSeed {
            cluster,
            redis_nodes: vec![RedisNode::new(1, 8, "10.0.0.1", 7000)],
        }];
        assert!(ConfigManager::validate_config(&config).is_err());
    }
}
