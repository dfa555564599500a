use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// gRPC listener for streaming clients
    #[serde(default = "default_grpc_listen_address")]
    pub grpc_listen_address: String,

    /// HTTP listener for long-poll fetches and `/metrics`
    #[serde(default = "default_http_listen_address")]
    pub http_listen_address: String,

    /// Period of the server-wide and per-stream reconciliation tickers
    #[serde(default = "default_assignment_refresh_interval_ms")]
    pub assignment_refresh_interval_ms: u64,

    /// Long-poll deadline used when a fetch carries no `fetch-timeout`.
    /// Zero answers synchronously.
    #[serde(default = "default_fetch_timeout_ms")]
    pub default_fetch_timeout_ms: u64,

    /// Outbound response buffer per gRPC stream
    #[serde(default = "default_stream_buffer_size")]
    pub stream_buffer_size: usize,

    #[serde(default = "default_tcp_keepalive_in_secs")]
    pub tcp_keepalive_in_secs: u64,

    #[serde(default = "default_http2_keep_alive_interval_in_secs")]
    pub http2_keep_alive_interval_in_secs: u64,

    #[serde(default = "default_http2_keep_alive_timeout_in_secs")]
    pub http2_keep_alive_timeout_in_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_listen_address: default_grpc_listen_address(),
            http_listen_address: default_http_listen_address(),
            assignment_refresh_interval_ms: default_assignment_refresh_interval_ms(),
            default_fetch_timeout_ms: default_fetch_timeout_ms(),
            stream_buffer_size: default_stream_buffer_size(),
            tcp_keepalive_in_secs: default_tcp_keepalive_in_secs(),
            http2_keep_alive_interval_in_secs: default_http2_keep_alive_interval_in_secs(),
            http2_keep_alive_timeout_in_secs: default_http2_keep_alive_timeout_in_secs(),
        }
    }
}

impl ServerConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.assignment_refresh_interval_ms)
    }

    pub fn default_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.default_fetch_timeout_ms)
    }

    pub fn grpc_addr(&self) -> Result<SocketAddr> {
        parse_addr("grpc_listen_address", &self.grpc_listen_address)
    }

    pub fn http_addr(&self) -> Result<SocketAddr> {
        parse_addr("http_listen_address", &self.http_listen_address)
    }

    /// # Errors
    /// Returns `Error::InvalidConfig` when:
    /// - a listen address does not parse
    /// - the refresh interval is zero
    /// - the stream buffer is empty
    pub fn validate(&self) -> Result<()> {
        let grpc = self.grpc_addr()?;
        let http = self.http_addr()?;
        if grpc.port() != 0 && grpc == http {
            return Err(Error::InvalidConfig(format!(
                "grpc and http listeners both bound to {grpc}"
            )));
        }

        if self.assignment_refresh_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "assignment_refresh_interval_ms must be greater than 0".into(),
            ));
        }

        if self.stream_buffer_size == 0 {
            return Err(Error::InvalidConfig(
                "stream_buffer_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

fn parse_addr(
    name: &str,
    value: &str,
) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|e| Error::InvalidConfig(format!("{name} {value:?} is not a socket address: {e}")))
}

fn default_grpc_listen_address() -> String {
    "0.0.0.0:5676".into()
}
fn default_http_listen_address() -> String {
    "0.0.0.0:5677".into()
}
fn default_assignment_refresh_interval_ms() -> u64 {
    1000
}
fn default_fetch_timeout_ms() -> u64 {
    30_000
}
fn default_stream_buffer_size() -> usize {
    16
}
fn default_tcp_keepalive_in_secs() -> u64 {
    3600
}
fn default_http2_keep_alive_interval_in_secs() -> u64 {
    300
}
fn default_http2_keep_alive_timeout_in_secs() -> u64 {
    20
}
