//! Liveness probing for Redis node processes
//!
//! A probe is a single TCP connect attempt bounded by a timeout. The answer is
//! a snapshot: nothing guarantees the process is still in that state by the
//! time the caller acts on it.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::AppError;

/// Reachability check for a `host:port`
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Whether a process currently accepts connections on `host:port`
    async fn reachable(&self, host: &str, port: u16) -> bool;
}

/// Probe configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Connection timeout
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { timeout_ms: 2000 }
    }
}

/// Probe result
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Whether the endpoint accepted the connection
    pub is_reachable: bool,
    /// Why the endpoint was judged unreachable
    pub error_message: Option<String>,
}

/// TCP connect probe
#[derive(Debug, Clone, Default)]
pub struct TcpLivenessProbe {
    config: ProbeConfig,
}

impl TcpLivenessProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Probe an endpoint once, keeping the failure reason
    pub async fn probe(&self, host: &str, port: u16) -> ProbeResult {
        let connect_result = timeout(
            Duration::from_millis(self.config.timeout_ms),
            TcpStream::connect((host, port)),
        )
        .await;

        let error = match connect_result {
            Ok(Ok(_stream)) => {
                return ProbeResult {
                    is_reachable: true,
                    error_message: None,
                };
            }
            Ok(Err(e)) => AppError::ProbeError(format!("{}:{} refused: {}", host, port, e)),
            Err(_) => AppError::ProbeError(format!(
                "{}:{} timed out after {}ms",
                host, port, self.config.timeout_ms
            )),
        };

        debug!(host = host, port = port, error = %error, "Endpoint unreachable");
        ProbeResult {
            is_reachable: false,
            error_message: Some(error.to_string()),
        }
    }
}

#[async_trait]
impl LivenessProbe for TcpLivenessProbe {
    async fn reachable(&self, host: &str, port: u16) -> bool {
        self.probe(host, port).await.is_reachable
    }
}
