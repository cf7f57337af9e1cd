//! Bare-process installs: lifecycle commands run on the node's host over ssh

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

use super::{render_template, run_command, NodeLifecycleOperation};
use crate::config::MachineConfig;
use crate::domain::entities::{Cluster, InstallationEnvironment, RedisNode};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MachineAction {
    Start,
    Stop,
    Remove,
}

/// Machine environment implementation
pub struct MachineNodeOperation {
    config: MachineConfig,
}

impl MachineNodeOperation {
    pub fn new(config: MachineConfig) -> Self {
        Self { config }
    }

    /// The shell command executed on the node's host for `action`
    pub(crate) fn remote_command(
        &self,
        action: MachineAction,
        cluster: &Cluster,
        node: &RedisNode,
    ) -> String {
        let template = match action {
            MachineAction::Start => &self.config.start_command,
            MachineAction::Stop => &self.config.stop_command,
            MachineAction::Remove => &self.config.remove_command,
        };
        render_template(
            template,
            cluster,
            node,
            &[("install_dir", self.config.install_dir.as_str())],
        )
    }

    fn ssh_command(&self, host: &str, remote_command: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args([
            "-o",
            "BatchMode=yes",
            "-p",
            &self.config.ssh_port.to_string(),
            &format!("{}@{}", self.config.ssh_user, host),
            remote_command,
        ]);
        cmd
    }

    async fn execute(
        &self,
        action: MachineAction,
        cluster: &Cluster,
        node: &RedisNode,
    ) -> Result<bool> {
        let remote_command = self.remote_command(action, cluster, node);
        info!(
            node = %node.address(),
            action = ?action,
            command = %remote_command,
            "Running machine lifecycle command"
        );
        run_command(
            self.ssh_command(&node.host, &remote_command),
            Duration::from_secs(self.config.command_timeout_seconds),
        )
        .await
    }
}

#[async_trait]
impl NodeLifecycleOperation for MachineNodeOperation {
    fn environment(&self) -> InstallationEnvironment {
        InstallationEnvironment::Machine
    }

    async fn start(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.execute(MachineAction::Start, cluster, node).await
    }

    async fn stop(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.execute(MachineAction::Stop, cluster, node).await
    }

    async fn restart(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        if !self.stop(cluster, node).await? {
            return Ok(false);
        }
        self.start(cluster, node).await
    }

    async fn remove(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.execute(MachineAction::Remove, cluster, node).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> (Cluster, RedisNode) {
        (
            Cluster::new(7, "10.0.0.1:7000", InstallationEnvironment::Machine),
            RedisNode::new(1, 7, "10.0.0.1", 7000),
        )
    }

    #[test]
    fn test_remote_commands_from_default_templates() {
        let operation = MachineNodeOperation::new(MachineConfig::default());
        let (cluster, node) = fixtures();

        assert_eq!(
            operation.remote_command(MachineAction::Start, &cluster, &node),
            "redis-server /data/redis/7000/redis.conf"
        );
        assert_eq!(
            operation.remote_command(MachineAction::Stop, &cluster, &node),
            "redis-cli -h 10.0.0.1 -p 7000 shutdown nosave"
        );
        assert_eq!(
            operation.remote_command(MachineAction::Remove, &cluster, &node),
            "rm -rf /data/redis/7000"
        );
    }

    #[test]
    fn test_custom_install_dir() {
        let operation = MachineNodeOperation::new(MachineConfig {
            install_dir: "/opt/redis/{cluster_id}".to_string(),
            ..MachineConfig::default()
        });
        let (cluster, node) = fixtures();
        assert_eq!(
            operation.remote_command(MachineAction::Remove, &cluster, &node),
            "rm -rf /opt/redis/7/7000"
        );
    }
}
