use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Discovery client settings as read from configuration.
///
/// Converted into a [`crate::ClientConfig`] by [`crate::ClientBuilder::from_settings`].
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientSettings {
    /// `grpc://host:port` (plaintext) or `grpcs://host:port` (TLS)
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Identity declared in every request. Empty uses the shared default group.
    #[serde(default)]
    pub client_id: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_tcp_keepalive_in_secs")]
    pub tcp_keepalive_in_secs: u64,

    /// PEM root used to verify a `grpcs` server
    #[serde(default)]
    pub ca_certificate_path: Option<String>,

    /// Overrides the TLS server name, defaults to the URL host
    #[serde(default)]
    pub domain_name: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            client_id: String::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            tcp_keepalive_in_secs: default_tcp_keepalive_in_secs(),
            ca_certificate_path: None,
            domain_name: None,
        }
    }
}

impl ClientSettings {
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(Error::InvalidConfig("client.server_url cannot be empty".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "client.connect_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_server_url() -> String {
    "grpc://127.0.0.1:5676".into()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_tcp_keepalive_in_secs() -> u64 {
    60
}
