use std::any::Any;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tracing::error;

use crate::BackoffPolicy;
use crate::Result;

/// Runs a long-lived service; if it fails, fires `shutdown` so its siblings
/// stop as well.
pub async fn shutdown_on_error<F>(
    name: &str,
    service: F,
    shutdown: &watch::Sender<()>,
) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let result = service.await;
    if let Err(e) = &result {
        error!("{} stopped with error, shutting down: {:?}", name, e);
        let _ = shutdown.send(());
    }
    result
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Doubling delay schedule bounded by [`BackoffPolicy::max_delay_ms`].
#[derive(Debug)]
pub(crate) struct ExponentialBackoff {
    policy: BackoffPolicy,
    next: Duration,
}

impl ExponentialBackoff {
    pub(crate) fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            next: policy.base_delay(),
        }
    }

    /// Delay to wait now; doubles the following one.
    pub(crate) fn next_delay(&mut self) -> Duration {
        if self.policy.base_delay_ms == 0 {
            return Duration::ZERO;
        }

        let delay = self.next.min(self.policy.max_delay());
        self.next = (self.next * 2).min(self.policy.max_delay());

        if self.policy.jitter_ms == 0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0..=self.policy.jitter_ms);
        delay + Duration::from_millis(jitter)
    }

    pub(crate) fn reset(&mut self) {
        self.next = self.policy.base_delay();
    }
}
