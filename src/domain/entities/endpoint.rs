use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{utils::ErrorUtils, AppError};

/// A `host:port` pair addressing one Redis process
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(deserialize_with = "deserialize_host")]
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Hostnames and IPv4/IPv6 literals only. Hosts end up inside remote shell
/// commands, so anything else is refused.
pub fn validate_host(host: &str) -> Result<(), AppError> {
    ErrorUtils::validate_non_empty(host, "host")?;
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':');
    if host.len() > 253 || host.starts_with('-') || !host.chars().all(allowed) {
        return Err(AppError::ValidationError(format!(
            "Invalid host '{}': expected a hostname or IP address",
            host
        )));
    }
    Ok(())
}

/// Serde hook rejecting hosts that fail [`validate_host`]
pub fn deserialize_host<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let host = String::deserialize(deserializer)?;
    validate_host(&host).map_err(serde::de::Error::custom)?;
    Ok(host)
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = AppError;

    /// Accepts `host:port`, optionally followed by the cluster bus suffix
    /// (`host:port@cport`) that Redis prints in its own membership listings.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let address = value.trim().split('@').next().unwrap_or_default();
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| ErrorUtils::invalid_format_error("endpoint"))?;
        validate_host(host)?;
        let port = port
            .parse::<u16>()
            .map_err(|_| ErrorUtils::invalid_format_error("endpoint port"))?;
        Ok(Self::new(host, port))
    }
}
