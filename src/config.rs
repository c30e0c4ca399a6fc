//! Configuration management for Ipgate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

use crate::error::{IpgateError, Result};
use crate::identity::{CallerResolver, DEFAULT_IDENTITY_HEADERS};
use crate::ratelimit::{Policy, PolicyResolver};

/// Prefix of environment variables overriding file settings,
/// e.g. `IPGATE__LIMITER__RATE=5`.
pub const ENV_PREFIX: &str = "IPGATE";

/// Main configuration for the Ipgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Global limiter settings
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Per-operation policies keyed by `Target.operation`
    #[serde(default)]
    pub operations: HashMap<String, Policy>,

    /// Caller identity settings
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// gRPC server address
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: default_grpc_addr(),
        }
    }
}

fn default_grpc_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8081))
}

/// Global limiter settings.
///
/// `rate` and `window_secs` are the default policy for operations that do not
/// set their own. Leaving either at zero disables limiting by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Maximum calls per window
    #[serde(default)]
    pub rate: u32,

    /// Window length in seconds
    #[serde(default)]
    pub window_secs: u64,

    /// How often idle keys are dropped, zero keeps every key forever
    #[serde(default)]
    pub purge_interval_secs: u64,
}

/// Caller identity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Headers checked for the client address, in order
    #[serde(default = "default_identity_headers")]
    pub headers: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            headers: default_identity_headers(),
        }
    }
}

fn default_identity_headers() -> Vec<String> {
    DEFAULT_IDENTITY_HEADERS.iter().map(|h| h.to_string()).collect()
}

impl IpgateConfig {
    /// Load configuration from an optional file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            if !path.exists() {
                return Err(IpgateError::Config(format!(
                    "configuration file {} not found",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        let config: IpgateConfig = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: IpgateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| IpgateError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.operations.keys().any(|name| name.trim().is_empty()) {
            return Err(IpgateError::Config(
                "operation names must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Global default policy.
    pub fn default_policy(&self) -> Policy {
        Policy::new(self.limiter.rate, self.limiter.window_secs)
    }

    /// Build the policy resolver described by this configuration.
    pub fn policy_resolver(&self) -> PolicyResolver {
        PolicyResolver::new(self.default_policy()).with_operations(
            self.operations
                .iter()
                .map(|(name, policy)| (name.clone(), *policy)),
        )
    }

    /// Build the caller resolver described by this configuration.
    pub fn caller_resolver(&self) -> CallerResolver {
        CallerResolver::new(self.identity.headers.iter().cloned())
    }
}
