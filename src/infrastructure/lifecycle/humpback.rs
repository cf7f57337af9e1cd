//! Humpback installs: containers are driven through the Humpback agent's
//! HTTP API on the node's host

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use super::{render_template, NodeLifecycleOperation};
use crate::config::HumpbackConfig;
use crate::domain::entities::{Cluster, InstallationEnvironment, RedisNode};
use crate::error::{AppError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ContainerAction {
    pub action: &'static str,
    pub container: String,
}

/// Humpback environment implementation
pub struct HumpbackNodeOperation {
    client: Client,
    config: HumpbackConfig,
}

impl HumpbackNodeOperation {
    pub fn new(config: HumpbackConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::ConfigError(format!("Failed to build Humpback HTTP client: {}", e))
            })?;
        Ok(Self { client, config })
    }

    pub(crate) fn containers_url(&self, node: &RedisNode) -> String {
        format!(
            "http://{}:{}/dockerapi/v2/containers",
            node.host, self.config.api_port
        )
    }

    fn container_name(&self, cluster: &Cluster, node: &RedisNode) -> String {
        render_template(&self.config.container_name_template, cluster, node, &[])
    }

    async fn operate(
        &self,
        action: &'static str,
        cluster: &Cluster,
        node: &RedisNode,
    ) -> Result<bool> {
        let body = ContainerAction {
            action,
            container: self.container_name(cluster, node),
        };
        info!(
            node = %node.address(),
            action = action,
            container = %body.container,
            "Sending Humpback container action"
        );

        let response = self
            .client
            .put(self.containers_url(node))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %error_text, "Humpback container action failed");
            return Ok(false);
        }
        Ok(true)
    }
}

#[async_trait]
impl NodeLifecycleOperation for HumpbackNodeOperation {
    fn environment(&self) -> InstallationEnvironment {
        InstallationEnvironment::Humpback
    }

    async fn start(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.operate("start", cluster, node).await
    }

    async fn stop(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.operate("stop", cluster, node).await
    }

    async fn restart(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        self.operate("restart", cluster, node).await
    }

    async fn remove(&self, cluster: &Cluster, node: &RedisNode) -> Result<bool> {
        let url = format!(
            "{}/{}?force=true",
            self.containers_url(node),
            self.container_name(cluster, node)
        );
        info!(node = %node.address(), url = %url, "Removing Humpback container");

        let response = self.client.delete(&url).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "Humpback container removal failed");
            return Ok(false);
        }
        Ok(true)
    }
}
