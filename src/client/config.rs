use std::time::Duration;

use crate::BackoffPolicy;

/// Client configuration parameters for the discovery connection
///
/// Built from [`crate::ClientSettings`] or through [`crate::ClientBuilder`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Identity declared in every request
    /// Default: empty (served from the shared default group)
    pub client_id: String,

    /// `grpc://` (plaintext) or `grpcs://` (TLS) server address
    pub server_url: String,

    /// Maximum time to wait for establishing the connection
    /// Default: 5 seconds
    pub connect_timeout: Duration,

    /// TCP keepalive duration for the connection
    /// Default: 60 seconds
    pub tcp_keepalive: Duration,

    /// Interval for HTTP/2 keepalive pings
    /// Default: 60 seconds
    pub http2_keepalive_interval: Duration,

    /// Timeout for HTTP/2 keepalive pings
    /// Default: 20 seconds
    pub http2_keepalive_timeout: Duration,

    /// Enable Gzip compression on the stream
    /// Default: true (enabled)
    pub enable_compression: bool,

    /// PEM root certificate verifying a `grpcs` server
    pub ca_certificate_path: Option<String>,

    /// TLS server name override
    pub domain_name: Option<String>,

    /// Wait between failed sessions
    pub backoff: BackoffPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            server_url: "grpc://127.0.0.1:5676".into(),
            connect_timeout: Duration::from_millis(5000),
            tcp_keepalive: Duration::from_secs(60),
            http2_keepalive_interval: Duration::from_secs(60),
            http2_keepalive_timeout: Duration::from_secs(20),
            enable_compression: true,
            ca_certificate_path: None,
            domain_name: None,
            backoff: BackoffPolicy::default(),
        }
    }
}
