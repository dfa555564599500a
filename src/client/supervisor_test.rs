use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::async_trait;

use super::*;
use crate::test_utils::assignment_reconciler;
use crate::test_utils::default_key;
use crate::test_utils::enable_logger;
use crate::test_utils::prometheus_mesh;
use crate::test_utils::service_workload;
use crate::test_utils::TestGrpcServer;
use crate::BackoffPolicy;
use crate::DiscoveryServer;
use crate::Error;
use crate::MemoryWorkloadStore;
use crate::Result;
use crate::ServerConfig;

fn client_config(url: String) -> ClientConfig {
    ClientConfig {
        client_id: "prometheus-01".into(),
        server_url: url,
        connect_timeout: Duration::from_millis(500),
        backoff: BackoffPolicy {
            base_delay_ms: 10,
            max_delay_ms: 50,
            jitter_ms: 0,
        },
        ..ClientConfig::default()
    }
}

async fn next_batch(rx: &mut mpsc::Receiver<Vec<TargetGroup>>) -> Vec<TargetGroup> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("batch within deadline")
        .expect("sink open")
}

#[tokio::test]
async fn supervisor_should_deliver_additions_and_tombstones() {
    enable_logger();
    let store = Arc::new(MemoryWorkloadStore::new());
    store.upsert_mesh(prometheus_mesh("demo"));
    store.upsert_workload(service_workload("demo", "backend-01", "backend"));
    let (reconciler, _cache) = assignment_reconciler(store.clone());
    let grpc = TestGrpcServer::start(DiscoveryServer::new(reconciler.clone(), ServerConfig::default())).await;

    let (tx, mut rx) = mpsc::channel(8);
    let token = CancellationToken::new();
    let handle = Supervisor::new(client_config(grpc.url()), Arc::new(tx)).spawn(token.clone());

    let first = next_batch(&mut rx).await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].source, "/meshes/demo/dataplanes/backend-01");

    store.remove_workload("demo", "backend-01");
    store.upsert_workload(service_workload("demo", "web-01", "web"));
    reconciler.reconcile(&default_key()).await.unwrap();

    let second = next_batch(&mut rx).await;
    let summary: Vec<(&str, bool)> = second
        .iter()
        .map(|g| (g.source.as_str(), g.is_tombstone()))
        .collect();
    assert_eq!(summary, vec![
        ("/meshes/demo/dataplanes/web-01", false),
        ("/meshes/demo/dataplanes/backend-01", true),
    ]);

    token.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    grpc.stop().await;
}

#[tokio::test]
async fn supervisor_should_retry_until_cancelled() {
    enable_logger();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (tx, _rx) = mpsc::channel(8);
    let token = CancellationToken::new();
    let handle = Supervisor::new(client_config(format!("grpc://{addr}")), Arc::new(tx)).spawn(token.clone());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished());

    token.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn supervisor_should_keep_retrying_when_sink_is_closed() {
    enable_logger();
    let store = Arc::new(MemoryWorkloadStore::new());
    store.upsert_mesh(prometheus_mesh("demo"));
    let (reconciler, _cache) = assignment_reconciler(store);
    let grpc = TestGrpcServer::start(DiscoveryServer::new(reconciler, ServerConfig::default())).await;

    let (tx, rx) = mpsc::channel(8);
    drop(rx);
    let token = CancellationToken::new();
    let handle = Supervisor::new(client_config(grpc.url()), Arc::new(tx)).spawn(token.clone());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!handle.is_finished());

    token.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    grpc.stop().await;
}

/// Rejects its second delivery, forwards every other one.
struct FailSecondSink {
    deliveries: AtomicUsize,
    inner: mpsc::Sender<Vec<TargetGroup>>,
}

#[async_trait]
impl TargetGroupSink for FailSecondSink {
    async fn deliver(
        &self,
        groups: Vec<TargetGroup>,
    ) -> Result<()> {
        if self.deliveries.fetch_add(1, Ordering::SeqCst) == 1 {
            return Err(Error::Fatal("sink unavailable".into()));
        }
        self.inner.deliver(groups).await
    }
}

#[tokio::test]
async fn restarted_session_should_start_without_tombstones() {
    enable_logger();
    let store = Arc::new(MemoryWorkloadStore::new());
    store.upsert_mesh(prometheus_mesh("demo"));
    store.upsert_workload(service_workload("demo", "backend-01", "backend"));
    let (reconciler, _cache) = assignment_reconciler(store.clone());
    let grpc = TestGrpcServer::start(DiscoveryServer::new(reconciler.clone(), ServerConfig::default())).await;

    let (tx, mut rx) = mpsc::channel(8);
    let sink = Arc::new(FailSecondSink {
        deliveries: AtomicUsize::new(0),
        inner: tx,
    });
    let token = CancellationToken::new();
    let handle = Supervisor::new(client_config(grpc.url()), sink.clone()).spawn(token.clone());

    let first = next_batch(&mut rx).await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].source, "/meshes/demo/dataplanes/backend-01");

    // the failed delivery ends the first session
    store.remove_workload("demo", "backend-01");
    store.upsert_workload(service_workload("demo", "web-01", "web"));
    reconciler.reconcile(&default_key()).await.unwrap();

    let restarted = next_batch(&mut rx).await;
    let summary: Vec<(&str, bool)> = restarted
        .iter()
        .map(|g| (g.source.as_str(), g.is_tombstone()))
        .collect();
    assert_eq!(summary, vec![("/meshes/demo/dataplanes/web-01", false)]);
    assert!(sink.deliveries.load(Ordering::SeqCst) >= 3);

    token.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    grpc.stop().await;
}

/// Panics on its first delivery, forwards afterwards.
struct PanicOnceSink {
    panicked: AtomicBool,
    deliveries: AtomicUsize,
    inner: mpsc::Sender<Vec<TargetGroup>>,
}

#[async_trait]
impl TargetGroupSink for PanicOnceSink {
    async fn deliver(
        &self,
        groups: Vec<TargetGroup>,
    ) -> Result<()> {
        self.deliveries.fetch_add(1, Ordering::SeqCst);
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("sink exploded");
        }
        self.inner.deliver(groups).await
    }
}

#[tokio::test]
async fn supervisor_should_survive_session_panic() {
    enable_logger();
    let store = Arc::new(MemoryWorkloadStore::new());
    store.upsert_mesh(prometheus_mesh("demo"));
    store.upsert_workload(service_workload("demo", "backend-01", "backend"));
    let (reconciler, _cache) = assignment_reconciler(store);
    let grpc = TestGrpcServer::start(DiscoveryServer::new(reconciler, ServerConfig::default())).await;

    let (tx, mut rx) = mpsc::channel(8);
    let sink = Arc::new(PanicOnceSink {
        panicked: AtomicBool::new(false),
        deliveries: AtomicUsize::new(0),
        inner: tx,
    });
    let token = CancellationToken::new();
    let handle = Supervisor::new(client_config(grpc.url()), sink.clone()).spawn(token.clone());

    let batch = next_batch(&mut rx).await;
    assert_eq!(batch.len(), 1);
    assert!(sink.deliveries.load(Ordering::SeqCst) >= 2);

    token.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    grpc.stop().await;
}
