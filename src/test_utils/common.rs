use std::time::Duration;

use tracing_subscriber::EnvFilter;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub(crate) fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Short refresh interval used by server and client tests.
pub(crate) const TEST_REFRESH_INTERVAL: Duration = Duration::from_millis(50);
