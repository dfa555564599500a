use std::pin::Pin;

use futures::future::BoxFuture;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::async_trait;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tonic::Streaming;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::DiscoveryServer;
use super::FetchMode;
use super::FetchOutcome;
use crate::metrics::ACTIVE_STREAMS;
use crate::metrics::DISCOVERY_RESPONSES;
use crate::metrics::NACKS_RECEIVED;
use crate::proto::monitoring_assignment_discovery_service_server::MonitoringAssignmentDiscoveryService;
use crate::proto::DiscoveryRequest;
use crate::proto::DiscoveryResponse;
use crate::GroupKey;
use crate::Result;

type ResponseStream = Pin<Box<dyn Stream<Item = std::result::Result<DiscoveryResponse, Status>> + Send>>;
type PendingFetch = BoxFuture<'static, Result<FetchOutcome>>;

#[async_trait]
impl MonitoringAssignmentDiscoveryService for DiscoveryServer {
    type StreamMonitoringAssignmentsStream = ResponseStream;

    #[instrument(skip_all)]
    async fn stream_monitoring_assignments(
        &self,
        request: Request<Streaming<DiscoveryRequest>>,
    ) -> std::result::Result<Response<Self::StreamMonitoringAssignmentsStream>, Status> {
        let inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(self.config.stream_buffer_size);

        let session = StreamSession::new(self.clone(), tx);
        tokio::spawn(session.run(inbound));

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    #[instrument(skip_all)]
    async fn fetch_monitoring_assignments(
        &self,
        request: Request<DiscoveryRequest>,
    ) -> std::result::Result<Response<DiscoveryResponse>, Status> {
        let request = request.into_inner();
        match self.fetch(&request, FetchMode::Immediate).await {
            Ok(FetchOutcome::Response(response)) => {
                DISCOVERY_RESPONSES.with_label_values(&["grpc_unary", "response"]).inc();
                Ok(Response::new(response))
            }
            Ok(FetchOutcome::NotModified) => {
                DISCOVERY_RESPONSES
                    .with_label_values(&["grpc_unary", "not_modified"])
                    .inc();
                Err(Status::failed_precondition("skip fetch: version up to date"))
            }
            Err(e) => {
                DISCOVERY_RESPONSES.with_label_values(&["grpc_unary", "error"]).inc();
                warn!("unary fetch failed: {:?}", e);
                Err(e.into())
            }
        }
    }
}

/// Last response written to a stream.
#[derive(Debug, Clone)]
struct SentResponse {
    nonce: String,
    version: String,
}

/// One bidirectional stream. Each inbound message starts a fetch cycle that
/// supersedes the pending one; at most one response is in flight.
struct StreamSession {
    server: DiscoveryServer,
    tx: mpsc::Sender<std::result::Result<DiscoveryResponse, Status>>,
    token: CancellationToken,
    last_sent: Option<SentResponse>,
    /// Request the pending cycle answers, re-armed on a spurious wake-up
    current: Option<DiscoveryRequest>,
    watchdog: Option<(GroupKey, CancellationToken)>,
}

impl StreamSession {
    fn new(
        server: DiscoveryServer,
        tx: mpsc::Sender<std::result::Result<DiscoveryResponse, Status>>,
    ) -> Self {
        let token = server.token.child_token();
        Self {
            server,
            tx,
            token,
            last_sent: None,
            current: None,
            watchdog: None,
        }
    }

    async fn run(
        mut self,
        mut inbound: Streaming<DiscoveryRequest>,
    ) {
        ACTIVE_STREAMS.inc();
        let mut pending: Option<PendingFetch> = None;

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    debug!("server shutting down, closing discovery stream");
                    break;
                }
                _ = self.tx.closed() => {
                    debug!("discovery stream receiver dropped");
                    break;
                }
                message = inbound.message() => match message {
                    Ok(Some(request)) => {
                        if let Some(request) = self.accept(request) {
                            pending = Some(self.cycle(request));
                        }
                    }
                    Ok(None) => {
                        debug!("client closed discovery stream");
                        break;
                    }
                    Err(status) => {
                        debug!("discovery stream receive failed: {}", status);
                        break;
                    }
                },
                outcome = poll_pending(&mut pending) => {
                    pending = None;
                    match outcome {
                        Ok(FetchOutcome::Response(response)) => {
                            if !self.send(response).await {
                                break;
                            }
                        }
                        Ok(FetchOutcome::NotModified) => {
                            // watch resolved without a version change, wait again
                            pending = self.current.clone().map(|request| self.cycle(request));
                        }
                        Err(e) => {
                            DISCOVERY_RESPONSES.with_label_values(&["grpc_stream", "error"]).inc();
                            warn!("discovery stream cycle failed: {:?}", e);
                            let _ = self.tx.send(Err(e.into())).await;
                            break;
                        }
                    }
                }
            }
        }

        self.token.cancel();
        ACTIVE_STREAMS.dec();
    }

    /// Classifies an inbound message. Returns the request the next cycle
    /// must answer, or None when the message is ignored.
    fn accept(
        &mut self,
        mut request: DiscoveryRequest,
    ) -> Option<DiscoveryRequest> {
        let key = self.server.reconciler.resolve_key(request.node_id());
        self.ensure_watchdog(&key);

        if let Some(sent) = &self.last_sent {
            if !request.response_nonce.is_empty() && request.response_nonce != sent.nonce {
                debug!(nonce = %request.response_nonce, latest = %sent.nonce, "ignoring request with stale nonce");
                return None;
            }
        }

        if let Some(detail) = &request.error_detail {
            NACKS_RECEIVED.with_label_values(&[key.as_str()]).inc();
            warn!(
                %key,
                nonce = %request.response_nonce,
                "client rejected update: {}",
                detail.message
            );
            // do not resend the rejected version
            if let Some(sent) = &self.last_sent {
                request.version_info = sent.version.clone();
            }
        }

        Some(request)
    }

    fn cycle(
        &mut self,
        request: DiscoveryRequest,
    ) -> PendingFetch {
        self.current = Some(request.clone());
        let server = self.server.clone();
        Box::pin(async move { server.fetch(&request, FetchMode::UntilChanged).await })
    }

    /// Keeps exactly one watchdog running for the stream's current group.
    fn ensure_watchdog(
        &mut self,
        key: &GroupKey,
    ) {
        if let Some((current, _)) = &self.watchdog {
            if current == key {
                return;
            }
        }
        if let Some((previous, token)) = self.watchdog.take() {
            debug!(%previous, %key, "stream moved to another group");
            token.cancel();
        }
        let token = self.token.child_token();
        self.server.spawn_watchdog(key.clone(), token.clone());
        self.watchdog = Some((key.clone(), token));
    }

    async fn send(
        &mut self,
        response: DiscoveryResponse,
    ) -> bool {
        let sent = SentResponse {
            nonce: response.nonce.clone(),
            version: response.version_info.clone(),
        };
        if self.tx.send(Ok(response)).await.is_err() {
            debug!("discovery stream closed before response could be sent");
            return false;
        }
        DISCOVERY_RESPONSES.with_label_values(&["grpc_stream", "response"]).inc();
        info!(version = %sent.version, nonce = %sent.nonce, "sent discovery response");
        self.last_sent = Some(sent);
        true
    }
}

async fn poll_pending(pending: &mut Option<PendingFetch>) -> Result<FetchOutcome> {
    match pending {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}
