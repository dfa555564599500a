use tonic::transport::Certificate;
use tonic::transport::Channel;
use tonic::transport::ClientTlsConfig;
use tonic::transport::Endpoint;
use tracing::debug;

use super::ClientConfig;
use crate::Result;
use crate::TransportError;

/// Server address translated for the HTTP/2 transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub uri: String,
    pub tls: bool,
}

/// Maps `grpc://host:port` to plaintext and `grpcs://host:port` to TLS.
/// Every other scheme is rejected.
pub fn resolve_endpoint(server_url: &str) -> Result<ResolvedEndpoint> {
    let Some((scheme, authority)) = server_url.split_once("://") else {
        return Err(TransportError::InvalidUri(format!("{server_url:?} has no scheme")).into());
    };
    if authority.is_empty() {
        return Err(TransportError::InvalidUri(format!("{server_url:?} has no host")).into());
    }
    let (prefix, tls) = match scheme {
        "grpc" => ("http", false),
        "grpcs" => ("https", true),
        other => return Err(TransportError::InvalidScheme(other.to_string()).into()),
    };
    Ok(ResolvedEndpoint {
        uri: format!("{prefix}://{authority}"),
        tls,
    })
}

/// Connects to the configured server.
pub async fn dial(config: &ClientConfig) -> Result<Channel> {
    let resolved = resolve_endpoint(&config.server_url)?;
    debug!("dial, uri = {:?}, tls = {}", resolved.uri, resolved.tls);

    let mut endpoint = Endpoint::from_shared(resolved.uri)
        .map_err(|e| TransportError::InvalidUri(e.to_string()))?
        .connect_timeout(config.connect_timeout)
        .tcp_keepalive(Some(config.tcp_keepalive))
        .http2_keep_alive_interval(config.http2_keepalive_interval)
        .keep_alive_timeout(config.http2_keepalive_timeout);

    if resolved.tls {
        let mut tls = ClientTlsConfig::new();
        if let Some(path) = &config.ca_certificate_path {
            let pem = tokio::fs::read(path).await?;
            tls = tls.ca_certificate(Certificate::from_pem(pem));
        }
        if let Some(domain) = &config.domain_name {
            tls = tls.domain_name(domain.clone());
        }
        endpoint = endpoint.tls_config(tls)?;
    }

    match tokio::time::timeout(config.connect_timeout, endpoint.connect()).await {
        Ok(channel) => Ok(channel?),
        Err(_) => Err(TransportError::Timeout(config.connect_timeout).into()),
    }
}
