use std::time::Duration;

use futures::FutureExt;
use rcgen::generate_simple_self_signed;
use rcgen::CertifiedKey;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::Certificate;
use tonic::transport::Identity;
use tonic::transport::ServerTlsConfig;
use tonic_health::server::health_reporter;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::DiscoveryServer;
use crate::proto::monitoring_assignment_discovery_service_server::MonitoringAssignmentDiscoveryServiceServer;
use crate::Result;
use crate::SystemError;
use crate::TlsConfig;

/// Binds the configured gRPC address and serves until `shutdown_signal`
/// fires.
pub async fn start_grpc_server(
    server: DiscoveryServer,
    tls: TlsConfig,
    shutdown_signal: watch::Receiver<()>,
) -> Result<()> {
    let listen_address = server.config.grpc_addr()?;
    let listener = TcpListener::bind(listen_address).await?;
    info!("gRPC discovery server listening on {}", listen_address);
    serve_grpc(server, listener, tls, shutdown_signal).await
}

/// Serves the discovery and health services on an already bound listener.
pub async fn serve_grpc(
    server: DiscoveryServer,
    listener: TcpListener,
    tls: TlsConfig,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<()> {
    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<MonitoringAssignmentDiscoveryServiceServer<DiscoveryServer>>()
        .await;

    let config = server.config.clone();
    let mut server_builder = tonic::transport::Server::builder()
        .tcp_keepalive(Some(Duration::from_secs(config.tcp_keepalive_in_secs)))
        .http2_keepalive_interval(Some(Duration::from_secs(
            config.http2_keep_alive_interval_in_secs,
        )))
        .http2_keepalive_timeout(Some(Duration::from_secs(
            config.http2_keep_alive_timeout_in_secs,
        )));

    if tls.enable_tls {
        server_builder = server_builder.tls_config(server_tls_config(&tls)?)?;
        if tls.enable_mtls {
            info!("gRPC mTLS enabled");
        } else {
            info!("gRPC TLS enabled");
        }
    }

    let local_address = listener.local_addr()?;
    let shutdown_handle = server.clone();
    if let Err(e) = server_builder
        .add_service(health_service)
        .add_service(
            MonitoringAssignmentDiscoveryServiceServer::new(server)
                .accept_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Gzip),
        )
        .serve_with_incoming_shutdown(
            TcpListenerStream::new(listener),
            shutdown_signal.changed().map(move |_| {
                warn!("Stopping gRPC discovery server. {}", local_address);
                // open streams never end on their own
                shutdown_handle.shutdown();
            }),
        )
        .await
    {
        error!("gRPC discovery server failed: {:?}", e);
        return Err(SystemError::ServerUnavailable.into());
    }
    debug!("gRPC discovery server finished");
    Ok(())
}

fn server_tls_config(tls: &TlsConfig) -> Result<ServerTlsConfig> {
    let identity = if tls.generate_self_signed_certificates {
        info!("Generating in-memory self signed certificate for localhost");
        let CertifiedKey { cert, key_pair } = generate_simple_self_signed(vec!["localhost".to_string()])
            .map_err(|e| SystemError::Certificate(e.to_string()))?;
        Identity::from_pem(cert.pem(), key_pair.serialize_pem())
    } else {
        let cert = std::fs::read_to_string(&tls.server_certificate_path)?;
        let key = std::fs::read_to_string(&tls.server_private_key_path)?;
        Identity::from_pem(cert, key)
    };

    let mut config = ServerTlsConfig::new().identity(identity);
    if tls.enable_mtls {
        let client_ca_cert = std::fs::read_to_string(&tls.client_certificate_authority_root_path)?;
        config = config.client_ca_root(Certificate::from_pem(client_ca_cert));
    }
    Ok(config)
}
