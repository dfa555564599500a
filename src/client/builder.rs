use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::dial;
use super::resolve_endpoint;
use super::ClientConfig;
use super::DiscoveryStream;
use super::Supervisor;
use super::TargetGroupSink;
use crate::BackoffPolicy;
use crate::ClientSettings;
use crate::Result;

pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new builder with default config for `server_url`
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                server_url: server_url.into(),
                ..ClientConfig::default()
            },
        }
    }

    /// Builder from loaded settings and the session retry policy
    pub fn from_settings(
        settings: &ClientSettings,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            config: ClientConfig {
                client_id: settings.client_id.clone(),
                server_url: settings.server_url.clone(),
                connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
                tcp_keepalive: Duration::from_secs(settings.tcp_keepalive_in_secs),
                ca_certificate_path: settings.ca_certificate_path.clone(),
                domain_name: settings.domain_name.clone(),
                backoff,
                ..ClientConfig::default()
            },
        }
    }

    /// Set the declared client identity (default: empty)
    pub fn client_id(
        mut self,
        client_id: impl Into<String>,
    ) -> Self {
        self.config.client_id = client_id.into();
        self
    }

    /// Set connection timeout (default: 5s)
    pub fn connect_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Enable/disable compression (default: enabled)
    pub fn enable_compression(
        mut self,
        enable: bool,
    ) -> Self {
        self.config.enable_compression = enable;
        self
    }

    /// PEM root used to verify a `grpcs` server
    pub fn ca_certificate(
        mut self,
        path: impl Into<String>,
    ) -> Self {
        self.config.ca_certificate_path = Some(path.into());
        self
    }

    pub fn domain_name(
        mut self,
        domain: impl Into<String>,
    ) -> Self {
        self.config.domain_name = Some(domain.into());
        self
    }

    /// Wait between failed sessions (default: 100ms doubling up to 5s)
    pub fn backoff(
        mut self,
        policy: BackoffPolicy,
    ) -> Self {
        self.config.backoff = policy;
        self
    }

    /// Completely replaces the default configuration
    pub fn set_config(
        mut self,
        config: ClientConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Validates the server URL and builds the client. No connection is
    /// made yet.
    pub fn build(self) -> Result<MadsClient> {
        resolve_endpoint(&self.config.server_url)?;
        Ok(MadsClient { config: self.config })
    }
}

/// Monitoring assignment discovery client.
#[derive(Debug, Clone)]
pub struct MadsClient {
    config: ClientConfig,
}

impl MadsClient {
    pub fn builder(server_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(server_url)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Dials the server and opens a single session.
    pub async fn open_stream(&self) -> Result<DiscoveryStream> {
        let channel = dial(&self.config).await?;
        DiscoveryStream::open(channel, &self.config.client_id, self.config.enable_compression).await
    }

    /// Keeps sessions running in the background, delivering target groups
    /// to `sink`, until `token` is cancelled.
    pub fn supervise(
        &self,
        sink: Arc<dyn TargetGroupSink>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        Supervisor::new(self.config.clone(), sink).spawn(token)
    }
}
