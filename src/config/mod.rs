//! Configuration management for the discovery service.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Optional `config/mads` file next to the binary
//! - Configuration file named by `CONFIG_PATH`
//! - Environment variable overrides (`MADS__SECTION__KEY`)
mod client;
mod monitoring;
mod retry;
mod server;
mod tls;
mod workloads;
pub use client::*;
pub use monitoring::*;
pub use retry::*;
pub use server::*;
pub use tls::*;
pub use workloads::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

const ENV_PREFIX: &str = "MADS";
const LOCAL_CONFIG_FILE: &str = "config/mads";

/// Main configuration container
///
/// Later sources override earlier ones:
/// 1. Type defaults
/// 2. `config/mads.{toml,...}` when present
/// 3. File named by `CONFIG_PATH`
/// 4. Environment variables with `MADS__` prefix
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Listeners and discovery timing
    #[serde(default)]
    pub server: ServerConfig,
    /// Discovery client identity and target server
    #[serde(default)]
    pub client: ClientSettings,
    /// Reconnect backoff for client sessions
    #[serde(default)]
    pub retry: RetryPolicies,
    /// TLS for the gRPC listener
    #[serde(default)]
    pub tls: TlsConfig,
    /// Metrics exposure
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Static workload inventory
    #[serde(default)]
    pub workloads: WorkloadsConfig,
}

impl Settings {
    /// Loads configuration from defaults, `CONFIG_PATH` and environment
    /// variables without validation.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Full load used by the binary: also picks up the optional local file
    /// and an explicit override path, then validates.
    pub fn load(override_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name(LOCAL_CONFIG_FILE).required(false));

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }
        if let Some(path) = override_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let config: Self = builder.add_source(env_source()).build()?.try_deserialize()?;
        config.validate()
    }

    /// Applies a configuration file on top of the current values. Environment
    /// variables still take precedence.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.server.validate()?;
        self.client.validate()?;
        self.retry.validate()?;
        self.tls.validate()?;
        self.workloads.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
