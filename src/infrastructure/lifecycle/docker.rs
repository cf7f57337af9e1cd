//! Docker installs: the docker CLI talks to the daemon on the node's host

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

use super::{render_template, run_command, NodeLifecycleOperation};
use crate::config::DockerConfig;
use crate::domain::entities::{Cluster, InstallationEnvironment, RedisNode};
use crate::error::Result;

/// Docker environment implementation
pub struct DockerNodeOperation {
    config: DockerConfig,
}

impl DockerNodeOperation {
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    pub(crate) fn container_name(&self, cluster: &Cluster, node: &RedisNode) -> String {
        render_template(&self.config.container_name_template, cluster, node, &[])
    }

    /// CLI arguments for `action` against the node's container
    pub(crate) fn docker_args(
        &self,
        action: &str,
        cluster: &Cluster,
        node: &RedisNode,
    ) -> Vec<String> {
        let mut args = vec![
            "-H".to_string(),
            format!("tcp://{}:{}", node.host, self.config.daemon_port),
        ];
        match action {
            "remove" => args.extend(["rm".to_string(), "-f".to_string()]),
            other => args.push(other.to_string()),
        }
        args.push(self.container_name(cluster, node));
        args
    }

    async fn execute(&self, action: &str, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        let args = self.docker_args(action, cluster, node);
        info!(
            node = %node.address(),
            action = action,
            container = %self.container_name(cluster, node),
            "Running docker lifecycle command"
        );
        let mut cmd = Command::new(&self.config.docker_binary);
        cmd.args(&args);
        run_command(cmd, Duration::from_secs(self.config.command_timeout_seconds)).await
    }
}

#[async_trait]
impl NodeLifecycleOperation for DockerNodeOperation {
    fn environment(&self) -> InstallationEnvironment {
        InstallationEnvironment::Docker
    }

    async fn start(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.execute("start", cluster, node).await
    }

    async fn stop(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.execute("stop", cluster, node).await
    }

    async fn restart(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.execute("restart", cluster, node).await
    }

    async fn remove(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.execute("remove", cluster, node).await
    }
}
