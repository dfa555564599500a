use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::Channel;
use tonic::Streaming;
use tracing::debug;
use tracing::warn;

use crate::metrics::CLIENT_REQUESTS;
use crate::proto::monitoring_assignment_discovery_service_client::MonitoringAssignmentDiscoveryServiceClient;
use crate::proto::DiscoveryRequest;
use crate::proto::DiscoveryResponse;
use crate::proto::MonitoringAssignment;
use crate::Result;
use crate::TransportError;
use crate::MONITORING_ASSIGNMENT_TYPE_URL;

/// ACK/NACK bookkeeping of one session.
///
/// An ACK echoes the latest received response. A NACK echoes the nonce of
/// the latest received response but keeps the version of the latest
/// acknowledged one.
#[derive(Debug, Default, Clone)]
pub struct ClientStreamState {
    latest_received: Option<DiscoveryResponse>,
    latest_acked: Option<DiscoveryResponse>,
}

impl ClientStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(
        &mut self,
        response: DiscoveryResponse,
    ) {
        self.latest_received = Some(response);
    }

    pub fn latest_received(&self) -> Option<&DiscoveryResponse> {
        self.latest_received.as_ref()
    }

    pub fn latest_acked(&self) -> Option<&DiscoveryResponse> {
        self.latest_acked.as_ref()
    }

    /// Request accepting the latest received response. None before the
    /// first response.
    pub fn ack_request(
        &mut self,
        client_id: &str,
    ) -> Option<DiscoveryRequest> {
        let received = self.latest_received.clone()?;
        let request = DiscoveryRequest::ack(client_id, &received);
        self.latest_acked = Some(received);
        Some(request)
    }

    /// Request rejecting the latest received response. None before the
    /// first response.
    pub fn nack_request(
        &self,
        client_id: &str,
        reason: &str,
    ) -> Option<DiscoveryRequest> {
        let received = self.latest_received.as_ref()?;
        let acked_version = self
            .latest_acked
            .as_ref()
            .map(|acked| acked.version_info.as_str())
            .unwrap_or_default();
        Some(DiscoveryRequest::nack(
            client_id,
            &received.type_url,
            acked_version,
            &received.nonce,
            reason,
        ))
    }
}

/// One open bidirectional discovery stream.
pub struct DiscoveryStream {
    client_id: String,
    requests: mpsc::Sender<DiscoveryRequest>,
    responses: Streaming<DiscoveryResponse>,
    state: ClientStreamState,
}

impl DiscoveryStream {
    /// Opens the stream and sends the initial request (no version, no
    /// nonce).
    pub async fn open(
        channel: Channel,
        client_id: &str,
        enable_compression: bool,
    ) -> Result<Self> {
        let mut client = MonitoringAssignmentDiscoveryServiceClient::new(channel);
        if enable_compression {
            client = client
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip);
        }

        let (requests, rx) = mpsc::channel(4);
        requests
            .send(DiscoveryRequest::initial(client_id, MONITORING_ASSIGNMENT_TYPE_URL))
            .await
            .map_err(|_| TransportError::StreamClosed)?;
        CLIENT_REQUESTS.with_label_values(&["initial"]).inc();

        let responses = client
            .stream_monitoring_assignments(ReceiverStream::new(rx))
            .await?
            .into_inner();
        debug!(client_id, "discovery stream opened");

        Ok(Self {
            client_id: client_id.to_string(),
            requests,
            responses,
            state: ClientStreamState::new(),
        })
    }

    /// Waits for the next response. A stream ended by the server yields
    /// [`TransportError::StreamClosed`].
    pub async fn recv(&mut self) -> Result<DiscoveryResponse> {
        match self.responses.message().await? {
            Some(response) => {
                debug!(version = %response.version_info, nonce = %response.nonce, "received discovery response");
                self.state.received(response.clone());
                Ok(response)
            }
            None => Err(TransportError::StreamClosed.into()),
        }
    }

    /// Accepts the latest received response.
    pub async fn ack(&mut self) -> Result<()> {
        let Some(request) = self.state.ack_request(&self.client_id) else {
            return Ok(());
        };
        self.send(request, "ack").await
    }

    /// Rejects the latest received response with `reason`.
    pub async fn nack(
        &mut self,
        reason: &str,
    ) -> Result<()> {
        let Some(request) = self.state.nack_request(&self.client_id, reason) else {
            return Ok(());
        };
        warn!(nonce = %request.response_nonce, "rejecting discovery response: {}", reason);
        self.send(request, "nack").await
    }

    pub fn state(&self) -> &ClientStreamState {
        &self.state
    }

    async fn send(
        &mut self,
        request: DiscoveryRequest,
        kind: &str,
    ) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| TransportError::StreamClosed)?;
        CLIENT_REQUESTS.with_label_values(&[kind]).inc();
        Ok(())
    }
}

/// Decodes every resource of `response` as a monitoring assignment.
pub fn decode_assignments(response: &DiscoveryResponse) -> Result<Vec<MonitoringAssignment>> {
    response
        .resources
        .iter()
        .map(|resource| resource.unpack(MONITORING_ASSIGNMENT_TYPE_URL))
        .collect()
}
