use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mads::serve_grpc;
use mads::DiscoveryServer;
use mads::Inbound;
use mads::Mesh;
use mads::MemoryWorkloadStore;
use mads::MonitoringAssignmentGenerator;
use mads::PrometheusBackend;
use mads::Reconciler;
use mads::ServerConfig;
use mads::SnapshotCache;
use mads::TlsConfig;
use mads::Workload;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const REFRESH_INTERVAL_MS: u64 = 50;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for integration test.");
}

pub fn mesh(
    name: &str,
    client_ids: &[&str],
) -> Mesh {
    Mesh {
        name: name.into(),
        prometheus: Some(PrometheusBackend {
            client_ids: client_ids.iter().map(|id| id.to_string()).collect::<BTreeSet<_>>(),
            ..Default::default()
        }),
    }
}

pub fn workload(
    mesh: &str,
    name: &str,
    service: &str,
) -> Workload {
    Workload {
        mesh: mesh.into(),
        name: name.into(),
        address: "10.0.0.7".into(),
        inbounds: vec![Inbound {
            address: None,
            port: 8080,
            tags: BTreeMap::from([("kuma.io/service".to_string(), service.to_string())]),
        }],
        ..Default::default()
    }
}

/// A discovery server over an in-memory store with a fast refresh.
pub struct Harness {
    pub store: Arc<MemoryWorkloadStore>,
    pub reconciler: Arc<Reconciler>,
    pub server: DiscoveryServer,
}

impl Harness {
    pub fn new(default_fetch_timeout: Duration) -> Self {
        enable_logger();
        let store = Arc::new(MemoryWorkloadStore::new());
        let generator = MonitoringAssignmentGenerator::new(store.clone());
        let reconciler = Arc::new(Reconciler::new(Arc::new(generator), SnapshotCache::new()));
        let server = DiscoveryServer::new(reconciler.clone(), ServerConfig {
            assignment_refresh_interval_ms: REFRESH_INTERVAL_MS,
            default_fetch_timeout_ms: default_fetch_timeout.as_millis() as u64,
            ..Default::default()
        });
        Self {
            store,
            reconciler,
            server,
        }
    }
}

/// gRPC listener on an ephemeral local port.
pub struct GrpcListener {
    pub addr: SocketAddr,
    shutdown_tx: watch::Sender<()>,
    handle: JoinHandle<mads::Result<()>>,
}

impl GrpcListener {
    pub async fn start(server: DiscoveryServer) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let handle = tokio::spawn(serve_grpc(server, listener, TlsConfig::default(), shutdown_rx));
        Self {
            addr,
            shutdown_tx,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("grpc://{}", self.addr)
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}
