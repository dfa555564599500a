use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tracing::warn;


lazy_static! {
    pub static ref RECONCILIATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("reconciliations_total", "Reconcile runs by result (published, unchanged, failed)"),
        &["result"]
    )
    .expect("metric can not be created");

    pub static ref DISCOVERY_RESPONSES: IntCounterVec = IntCounterVec::new(
        Opts::new("discovery_responses_total", "Fetch outcomes by transport (response, not_modified, error)"),
        &["transport", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref FETCH_WAIT_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("fetch_wait_ms", "Time a fetch spent waiting on a watch in ms (long_poll, stream)")
            .buckets(exponential_buckets(1.0, 4.0, 10).unwrap_or_default()),
        &["mode"]
    )
    .expect("metric can not be created");

    pub static ref OPEN_WATCHES: IntGauge =
        IntGauge::new("open_watches", "Watch registrations currently waiting for a publish")
            .expect("metric can not be created");

    pub static ref ACTIVE_STREAMS: IntGauge =
        IntGauge::new("active_streams", "Open gRPC discovery streams")
            .expect("metric can not be created");

    pub static ref NACKS_RECEIVED: IntCounterVec = IntCounterVec::new(
        Opts::new("nacks_received_total", "NACKs received by the server per group"),
        &["group"]
    )
    .expect("metric can not be created");

    pub static ref CLIENT_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("client_requests_total", "Requests sent by discovery clients (initial, ack, nack)"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref CLIENT_SESSIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("client_sessions_total", "Finished client sessions by outcome (ended, failed, panicked)"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new_custom(Some("mads".to_string()), None).unwrap_or_default();
        register_custom_metrics(&registry);
        registry
    };
}

pub fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RECONCILIATIONS.clone()),
        Box::new(DISCOVERY_RESPONSES.clone()),
        Box::new(FETCH_WAIT_DURATION.clone()),
        Box::new(OPEN_WATCHES.clone()),
        Box::new(ACTIVE_STREAMS.clone()),
        Box::new(NACKS_RECEIVED.clone()),
        Box::new(CLIENT_REQUESTS.clone()),
        Box::new(CLIENT_SESSIONS.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector can not be registered: {}", e);
        }
    }
}

/// Text exposition of [`REGISTRY`].
pub fn gather_metrics() -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode custom metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        warn!("custom metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}
