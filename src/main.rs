use std::env;
use std::sync::Arc;

use mads::utils::shutdown_on_error;
use mads::DiscoveryServer;
use mads::Error;
use mads::MemoryWorkloadStore;
use mads::MonitoringAssignmentGenerator;
use mads::Reconciler;
use mads::Result;
use mads::Settings;
use mads::SnapshotCache;
use mads::SystemError;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    // optional first argument: extra config file
    let override_path = env::args().nth(1);
    let settings = Settings::load(override_path.as_deref())?;

    // Initializing Logs
    init_observability();

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());
    let graceful_tx = Arc::new(graceful_tx);

    let store = match &settings.workloads.inventory_path {
        Some(path) => MemoryWorkloadStore::load_inventory(path).await?,
        None => {
            info!("no workload inventory configured, starting empty");
            MemoryWorkloadStore::new()
        }
    };
    let generator = MonitoringAssignmentGenerator::new(Arc::new(store));
    let reconciler = Arc::new(Reconciler::new(Arc::new(generator), SnapshotCache::new()));
    let server = DiscoveryServer::new(reconciler, settings.server.clone());
    let refresh = server.start();

    // a server that fails stops the other one too
    let grpc = tokio::spawn({
        let service = mads::start_grpc_server(server.clone(), settings.tls.clone(), graceful_rx.clone());
        let shutdown = graceful_tx.clone();
        async move { shutdown_on_error("gRPC server", service, &shutdown).await }
    });
    let http = tokio::spawn({
        let service = mads::start_http_server(server.clone(), settings.monitoring.metrics_enabled, graceful_rx);
        let shutdown = graceful_tx.clone();
        async move { shutdown_on_error("HTTP server", service, &shutdown).await }
    });

    info!("Application started. Waiting for CTRL+C signal...");
    // Listen on Shutdown Signal
    tokio::spawn(async move {
        if let Err(e) = graceful_shutdown(&graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    let (grpc, http) = tokio::join!(grpc, http);
    server.shutdown();
    let _ = refresh.await;

    for (name, result) in [("gRPC", grpc), ("HTTP", http)] {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("{} server stops: {:?}", name, e),
            Err(e) => error!("{} server task failed: {:?}", name, e),
        }
    }

    println!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: &watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("Shutdown server..");
    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::from(SystemError::SignalSenderClosed(format!(
            "Failed to send shutdown signal: {}",
            e
        )))
    })?;

    info!("Shutdown completed");
    Ok(())
}

pub fn init_observability() {
    let base_subscriber = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();
}
