use std::time::Duration;

use tokio::sync::watch;

use super::async_task::panic_message;
use super::async_task::shutdown_on_error;
use super::async_task::ExponentialBackoff;
use crate::BackoffPolicy;
use crate::Error;
use crate::SystemError;

#[tokio::test]
async fn test_shutdown_on_error_fires_signal() {
    let (tx, mut rx) = watch::channel(());

    let failing = async { Err::<(), Error>(SystemError::ServerUnavailable.into()) };

    let result = shutdown_on_error("grpc", failing, &tx).await;

    assert!(matches!(result, Err(Error::System(SystemError::ServerUnavailable))));
    assert!(rx.has_changed().unwrap());
    assert!(rx.changed().await.is_ok());
}

#[tokio::test]
async fn test_shutdown_on_error_keeps_quiet_on_clean_exit() {
    let (tx, rx) = watch::channel(());

    shutdown_on_error("http", async { Ok::<(), Error>(()) }, &tx).await.unwrap();

    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn test_panic_message_from_join_error() {
    let handle = tokio::spawn(async {
        panic!("session exploded");
    });

    let err = handle.await.unwrap_err();
    assert!(err.is_panic());
    assert_eq!(panic_message(err.into_panic()), "session exploded");
}

#[test]
fn test_exponential_backoff_doubles_until_cap() {
    let mut backoff = ExponentialBackoff::new(BackoffPolicy {
        base_delay_ms: 100,
        max_delay_ms: 350,
        jitter_ms: 0,
    });

    assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    assert_eq!(backoff.next_delay(), Duration::from_millis(200));
    assert_eq!(backoff.next_delay(), Duration::from_millis(350));
    assert_eq!(backoff.next_delay(), Duration::from_millis(350));

    backoff.reset();
    assert_eq!(backoff.next_delay(), Duration::from_millis(100));
}

#[test]
fn test_exponential_backoff_jitter_is_bounded() {
    let mut backoff = ExponentialBackoff::new(BackoffPolicy {
        base_delay_ms: 10,
        max_delay_ms: 10,
        jitter_ms: 5,
    });

    for _ in 0..20 {
        let delay = backoff.next_delay();
        assert!(delay >= Duration::from_millis(10));
        assert!(delay <= Duration::from_millis(15));
    }
}

#[test]
fn test_zero_policy_never_waits() {
    let mut backoff = ExponentialBackoff::new(BackoffPolicy::none());
    for _ in 0..3 {
        assert_eq!(backoff.next_delay(), Duration::ZERO);
    }
}
