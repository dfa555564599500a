use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::serve_grpc;
use crate::DiscoveryServer;
use crate::TlsConfig;

/// In-process gRPC discovery server on an ephemeral port.
pub(crate) struct TestGrpcServer {
    pub addr: SocketAddr,
    shutdown_tx: watch::Sender<()>,
    handle: JoinHandle<crate::Result<()>>,
}

impl TestGrpcServer {
    pub(crate) async fn start(server: DiscoveryServer) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        debug!("starting test discovery server on {addr}");
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let handle = tokio::spawn(serve_grpc(server, listener, TlsConfig::default(), shutdown_rx));
        Self {
            addr,
            shutdown_tx,
            handle,
        }
    }

    pub(crate) fn url(&self) -> String {
        format!("grpc://{}", self.addr)
    }

    pub(crate) async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}
