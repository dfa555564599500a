use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tonic::Code;
use tonic::Streaming;

use super::*;
use crate::proto::monitoring_assignment_discovery_service_client::MonitoringAssignmentDiscoveryServiceClient;
use crate::proto::DiscoveryRequest;
use crate::proto::DiscoveryResponse;
use crate::test_utils::assignment_reconciler;
use crate::test_utils::default_key;
use crate::test_utils::enable_logger;
use crate::test_utils::prometheus_mesh;
use crate::test_utils::service_workload;
use crate::test_utils::TestGrpcServer;
use crate::test_utils::TEST_REFRESH_INTERVAL;
use crate::MemoryWorkloadStore;
use crate::ServerConfig;
use crate::MONITORING_ASSIGNMENT_TYPE_URL;

const CLIENT_ID: &str = "prometheus-01";

struct Harness {
    server: DiscoveryServer,
    store: Arc<MemoryWorkloadStore>,
    grpc: TestGrpcServer,
    client: MonitoringAssignmentDiscoveryServiceClient<Channel>,
}

async fn setup(refresh_interval: Duration) -> Harness {
    enable_logger();
    let store = Arc::new(MemoryWorkloadStore::new());
    store.upsert_mesh(prometheus_mesh("demo"));
    let (reconciler, _cache) = assignment_reconciler(store.clone());
    let server = DiscoveryServer::new(reconciler, ServerConfig {
        assignment_refresh_interval_ms: refresh_interval.as_millis() as u64,
        ..Default::default()
    });
    let grpc = TestGrpcServer::start(server.clone()).await;
    let client = MonitoringAssignmentDiscoveryServiceClient::connect(format!("http://{}", grpc.addr))
        .await
        .unwrap();
    Harness {
        server,
        store,
        grpc,
        client,
    }
}

async fn open_stream(
    client: &mut MonitoringAssignmentDiscoveryServiceClient<Channel>
) -> (mpsc::Sender<DiscoveryRequest>, Streaming<DiscoveryResponse>) {
    let (tx, rx) = mpsc::channel(8);
    let inbound = client
        .stream_monitoring_assignments(ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();
    (tx, inbound)
}

async fn next_response(inbound: &mut Streaming<DiscoveryResponse>) -> DiscoveryResponse {
    tokio::time::timeout(Duration::from_secs(5), inbound.message())
        .await
        .expect("response within deadline")
        .unwrap()
        .expect("stream still open")
}

async fn assert_silent(inbound: &mut Streaming<DiscoveryResponse>) {
    let result = tokio::time::timeout(Duration::from_millis(150), inbound.message()).await;
    assert!(result.is_err(), "unexpected response: {:?}", result);
}

#[tokio::test]
async fn test_stream_case1() {
    // # Case 1: initial request answered, ACK waits, publish wakes the stream
    let Harness {
        server,
        store,
        grpc,
        mut client,
    } = setup(Duration::from_secs(60)).await;
    let (tx, mut inbound) = open_stream(&mut client).await;

    tx.send(DiscoveryRequest::initial(CLIENT_ID, MONITORING_ASSIGNMENT_TYPE_URL))
        .await
        .unwrap();
    let first = next_response(&mut inbound).await;
    assert!(first.resources.is_empty());
    assert_eq!(first.type_url, MONITORING_ASSIGNMENT_TYPE_URL);

    tx.send(DiscoveryRequest::ack(CLIENT_ID, &first)).await.unwrap();
    assert_silent(&mut inbound).await;

    store.upsert_workload(service_workload("demo", "backend-01", "backend"));
    server.reconciler().reconcile(&default_key()).await.unwrap();

    let second = next_response(&mut inbound).await;
    assert_ne!(second.version_info, first.version_info);
    assert_ne!(second.nonce, first.nonce);
    assert_eq!(second.resources.len(), 1);

    drop(tx);
    grpc.stop().await;
}

#[tokio::test]
async fn nack_should_not_resend_rejected_version() {
    let Harness {
        server,
        store,
        grpc,
        mut client,
    } = setup(Duration::from_secs(60)).await;
    let (tx, mut inbound) = open_stream(&mut client).await;

    tx.send(DiscoveryRequest::initial(CLIENT_ID, MONITORING_ASSIGNMENT_TYPE_URL))
        .await
        .unwrap();
    let first = next_response(&mut inbound).await;
    tx.send(DiscoveryRequest::ack(CLIENT_ID, &first)).await.unwrap();

    store.upsert_workload(service_workload("demo", "backend-01", "backend"));
    server.reconciler().reconcile(&default_key()).await.unwrap();
    let rejected = next_response(&mut inbound).await;

    tx.send(DiscoveryRequest::nack(
        CLIENT_ID,
        MONITORING_ASSIGNMENT_TYPE_URL,
        &first.version_info,
        &rejected.nonce,
        "cannot apply",
    ))
    .await
    .unwrap();
    assert_silent(&mut inbound).await;

    store.upsert_workload(service_workload("demo", "backend-02", "backend"));
    server.reconciler().reconcile(&default_key()).await.unwrap();

    let fixed = next_response(&mut inbound).await;
    assert_ne!(fixed.version_info, rejected.version_info);
    assert_eq!(fixed.resources.len(), 2);

    drop(tx);
    grpc.stop().await;
}

#[tokio::test]
async fn stale_nonce_should_be_ignored() {
    let Harness {
        server,
        store,
        grpc,
        mut client,
    } = setup(Duration::from_secs(60)).await;
    let (tx, mut inbound) = open_stream(&mut client).await;

    tx.send(DiscoveryRequest::initial(CLIENT_ID, MONITORING_ASSIGNMENT_TYPE_URL))
        .await
        .unwrap();
    let first = next_response(&mut inbound).await;
    tx.send(DiscoveryRequest::ack(CLIENT_ID, &first)).await.unwrap();

    store.upsert_workload(service_workload("demo", "backend-01", "backend"));
    server.reconciler().reconcile(&default_key()).await.unwrap();
    let second = next_response(&mut inbound).await;
    assert_ne!(second.nonce, first.nonce);
    tx.send(DiscoveryRequest::ack(CLIENT_ID, &second)).await.unwrap();

    // a late ACK of the first response must not trigger a resend
    tx.send(DiscoveryRequest::ack(CLIENT_ID, &first)).await.unwrap();
    assert_silent(&mut inbound).await;

    drop(tx);
    grpc.stop().await;
}

#[tokio::test]
async fn stream_watchdog_should_deliver_store_changes() {
    let Harness {
        store,
        grpc,
        mut client,
        ..
    } = setup(TEST_REFRESH_INTERVAL).await;
    let (tx, mut inbound) = open_stream(&mut client).await;

    tx.send(DiscoveryRequest::initial(CLIENT_ID, MONITORING_ASSIGNMENT_TYPE_URL))
        .await
        .unwrap();
    let first = next_response(&mut inbound).await;
    tx.send(DiscoveryRequest::ack(CLIENT_ID, &first)).await.unwrap();

    store.upsert_workload(service_workload("demo", "web-01", "web"));

    let second = next_response(&mut inbound).await;
    assert_eq!(second.resources.len(), 1);

    drop(tx);
    grpc.stop().await;
}

#[tokio::test]
async fn unary_fetch_should_answer_immediately() {
    let Harness {
        grpc, mut client, ..
    } = setup(Duration::from_secs(60)).await;

    let response = client
        .fetch_monitoring_assignments(DiscoveryRequest::initial(
            CLIENT_ID,
            MONITORING_ASSIGNMENT_TYPE_URL,
        ))
        .await
        .unwrap()
        .into_inner();
    assert!(!response.version_info.is_empty());

    let status = client
        .fetch_monitoring_assignments(DiscoveryRequest::ack(CLIENT_ID, &response))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);

    let mut bad = DiscoveryRequest::initial(CLIENT_ID, MONITORING_ASSIGNMENT_TYPE_URL);
    bad.type_url = "type.googleapis.com/unknown".into();
    let status = client.fetch_monitoring_assignments(bad).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    grpc.stop().await;
}
