//! Operator configuration from the environment

use crate::{Error, Result};

/// Default metrics port
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Runtime configuration of the operator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Port of the metrics and health endpoints
    pub metrics_port: u16,
    /// Restrict the Installation watch to one namespace
    pub watch_namespace: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            watch_namespace: None,
        }
    }
}

impl OperatorConfig {
    /// Read `METRICS_PORT` and `WATCH_NAMESPACE`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let metrics_port = match lookup("METRICS_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                Error::ConfigError(format!("METRICS_PORT '{}' is not a valid port: {}", raw, e))
            })?,
            None => DEFAULT_METRICS_PORT,
        };

        let watch_namespace = lookup("WATCH_NAMESPACE")
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty());

        Ok(Self {
            metrics_port,
            watch_namespace,
        })
    }
}
