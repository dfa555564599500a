use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::info_span;
use tracing::warn;
use tracing::Instrument;

use super::decode_assignments;
use super::dial;
use super::ClientConfig;
use super::Delivery;
use super::DiscoveryStream;
use super::TargetGroup;
use super::TargetGroupSink;
use crate::metrics::CLIENT_SESSIONS;
use crate::utils::async_task::panic_message;
use crate::utils::async_task::ExponentialBackoff;
use crate::Error;
use crate::Result;
use crate::TransportError;

/// How a session ended.
#[derive(Debug)]
pub struct SessionEnd {
    pub session_id: u64,
    /// Responses received before the session ended
    pub responses: u64,
    /// None when the stream was closed by the server
    pub error: Option<Error>,
}

/// Runs discovery sessions until cancelled.
///
/// Each session runs in its own task; a panic inside it is turned into an
/// ordinary failure. Failed sessions are retried after an exponential
/// backoff that resets once a session has received responses. Only
/// cancellation stops the loop.
pub struct Supervisor {
    config: ClientConfig,
    sink: Arc<dyn TargetGroupSink>,
}

impl Supervisor {
    pub fn new(
        config: ClientConfig,
        sink: Arc<dyn TargetGroupSink>,
    ) -> Self {
        Self { config, sink }
    }

    pub fn spawn(
        self,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    pub async fn run(
        self,
        token: CancellationToken,
    ) {
        let mut backoff = ExponentialBackoff::new(self.config.backoff);
        let mut session_id = 0u64;

        loop {
            if token.is_cancelled() {
                break;
            }
            session_id += 1;

            let session = Session {
                id: session_id,
                config: self.config.clone(),
                sink: self.sink.clone(),
                delivery: Delivery::new(),
            };
            let span = info_span!("discovery_session", session_id);
            let mut handle = tokio::spawn(session.run().instrument(span));

            let joined = tokio::select! {
                _ = token.cancelled() => {
                    handle.abort();
                    debug!(session_id, "supervisor cancelled");
                    break;
                }
                joined = &mut handle => joined,
            };

            let end = match joined {
                Ok(end) => end,
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    CLIENT_SESSIONS.with_label_values(&["panicked"]).inc();
                    error!(session_id, "discovery session panicked: {}", message);
                    SessionEnd {
                        session_id,
                        responses: 0,
                        error: Some(Error::Fatal(message)),
                    }
                }
                Err(e) => SessionEnd {
                    session_id,
                    responses: 0,
                    error: Some(e.into()),
                },
            };

            match &end.error {
                None => {
                    CLIENT_SESSIONS.with_label_values(&["ended"]).inc();
                    info!(session_id, responses = end.responses, "discovery session ended, restarting");
                }
                Some(Error::Transport(TransportError::SinkClosed)) => {
                    CLIENT_SESSIONS.with_label_values(&["failed"]).inc();
                    warn!(session_id, "target group sink closed, retrying until cancelled");
                }
                Some(e) => {
                    CLIENT_SESSIONS.with_label_values(&["failed"]).inc();
                    warn!(session_id, responses = end.responses, "discovery session failed: {}", e);
                }
            }

            if end.responses > 0 {
                backoff.reset();
            }
            let delay = backoff.next_delay();
            if !delay.is_zero() {
                debug!(session_id, ?delay, "waiting before next session");
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// One connection attempt. Its delivered identity set starts empty.
struct Session {
    id: u64,
    config: ClientConfig,
    sink: Arc<dyn TargetGroupSink>,
    delivery: Delivery,
}

impl Session {
    async fn run(mut self) -> SessionEnd {
        let mut responses = 0u64;
        let result = self.drive(&mut responses).await;
        let error = match result {
            Ok(()) => None,
            // server went away between two cycles
            Err(Error::Transport(TransportError::StreamClosed)) => None,
            Err(e) => Some(e),
        };
        SessionEnd {
            session_id: self.id,
            responses,
            error,
        }
    }

    async fn drive(
        &mut self,
        responses: &mut u64,
    ) -> Result<()> {
        let channel = dial(&self.config).await?;
        let mut stream =
            DiscoveryStream::open(channel, &self.config.client_id, self.config.enable_compression).await?;
        info!("discovery session started");

        loop {
            let response = stream.recv().await?;
            *responses += 1;

            let groups: Vec<TargetGroup> = decode_assignments(&response)?
                .iter()
                .map(TargetGroup::from)
                .collect();
            self.delivery
                .deliver(&self.config.client_id, groups, self.sink.as_ref())
                .await?;

            stream.ack().await?;
        }
    }
}
