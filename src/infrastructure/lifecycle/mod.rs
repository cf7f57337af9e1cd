//! Environment-specific node lifecycle actions
//!
//! Each installation environment supplies one implementation of
//! [`NodeLifecycleOperation`]. The implementation for a batch is looked up
//! once from the owning cluster's environment.

pub mod docker;
pub mod humpback;
pub mod machine;

use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::EnvironmentsConfig;
use crate::domain::entities::{Cluster, InstallationEnvironment, RedisNode};
use crate::error::{AppError, Result};

pub use docker::DockerNodeOperation;
pub use humpback::HumpbackNodeOperation;
pub use machine::MachineNodeOperation;

/// Start/stop/restart/remove a node process.
///
/// `Ok(false)` means the environment carried out the request and reported
/// failure; `Err` means the request could not be carried out at all.
#[async_trait]
pub trait NodeLifecycleOperation: Send + Sync {
    fn environment(&self) -> InstallationEnvironment;

    async fn start(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool>;

    async fn stop(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool>;

    async fn restart(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool>;

    async fn remove(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool>;
}

/// Lifecycle implementations keyed by installation environment
#[derive(Clone, Default)]
pub struct NodeOperationRegistry {
    operations: HashMap<InstallationEnvironment, Arc<dyn NodeLifecycleOperation>>,
}

impl NodeOperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in implementation of every environment
    pub fn from_config(config: &EnvironmentsConfig) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(MachineNodeOperation::new(config.machine.clone())));
        registry.register(Arc::new(DockerNodeOperation::new(config.docker.clone())));
        registry.register(Arc::new(HumpbackNodeOperation::new(
            config.humpback.clone(),
        )?));
        Ok(registry)
    }

    /// Register an implementation, replacing any previous one for its environment
    pub fn register(&mut self, operation: Arc<dyn NodeLifecycleOperation>) {
        self.operations.insert(operation.environment(), operation);
    }

    pub fn get(
        &self,
        environment: InstallationEnvironment,
    ) -> Result<Arc<dyn NodeLifecycleOperation>> {
        self.operations.get(&environment).cloned().ok_or_else(|| {
            AppError::PreconditionError(format!(
                "No node operation registered for installation environment {}",
                environment
            ))
        })
    }
}

/// Fill extra placeholders, then `{host}`, `{port}` and `{cluster_id}`
pub(crate) fn render_template(
    template: &str,
    cluster: &Cluster,
    node: &RedisNode,
    extra: &[(&str, &str)],
) -> String {
    // extras first so their values may use the built-in placeholders
    let mut rendered = template.to_string();
    for (key, value) in extra {
        rendered = rendered.replace(&format!("{{{}}}", key), value);
    }
    rendered
        .replace("{host}", &node.host)
        .replace("{port}", &node.port.to_string())
        .replace("{cluster_id}", &cluster.cluster_id.to_string())
}

/// Run a local command to completion within `limit`; exit status 0 is success
pub(crate) async fn run_command(mut cmd: Command, limit: Duration) -> Result<bool> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout(limit, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(AppError::ExternalServiceError(format!(
                "Failed to spawn process: {}",
                e
            )))
        }
        Err(_) => {
            return Err(AppError::ExternalServiceError(format!(
                "Command timed out after {}s",
                limit.as_secs()
            )))
        }
    };

    if output.status.success() {
        debug!(status = ?output.status, "Lifecycle command succeeded");
        Ok(true)
    } else {
        warn!(
            status = ?output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "Lifecycle command failed"
        );
        Ok(false)
    }
}
