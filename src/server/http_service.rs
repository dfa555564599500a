use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::Filter;
use warp::Reply;

use super::DiscoveryServer;
use super::FetchMode;
use super::FetchOutcome;
use crate::metrics::gather_metrics;
use crate::metrics::DISCOVERY_RESPONSES;
use crate::proto::DiscoveryRequest;
use crate::utils::parse_duration;
use crate::Error;
use crate::ProtocolError;
use crate::Result;
use crate::SystemError;
use crate::FETCH_TIMEOUT_QUERY_PARAM;

/// Error body of every non-2xx answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetail {
    pub title: String,
    pub detail: String,
}

/// REST binding: `POST /v3/discovery:monitoringassignments` and, when
/// enabled, `GET /metrics`.
pub fn routes(
    server: DiscoveryServer,
    metrics_enabled: bool,
) -> BoxedFilter<(Response,)> {
    let fetch = warp::post()
        .and(warp::path("v3"))
        .and(warp::path("discovery:monitoringassignments"))
        .and(warp::path::end())
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::body::bytes())
        .and_then(move |params: HashMap<String, String>, body: Bytes| {
            let server = server.clone();
            async move { Ok::<_, Infallible>(handle_fetch(server, params, body).await) }
        });

    let metrics = warp::get()
        .and(warp::path("metrics"))
        .and(warp::path::end())
        .map(move || {
            if metrics_enabled {
                warp::reply::with_header(gather_metrics(), "content-type", "text/plain; version=0.0.4")
                    .into_response()
            } else {
                // a rejection here would surface as 405 from the POST route
                StatusCode::NOT_FOUND.into_response()
            }
        });

    fetch.or(metrics).unify().boxed()
}

/// Binds the configured HTTP address and serves until `shutdown_signal`
/// fires.
pub async fn start_http_server(
    server: DiscoveryServer,
    metrics_enabled: bool,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<()> {
    let listen_address: SocketAddr = server.config.http_addr()?;
    let (bound, serving) = warp::serve(routes(server, metrics_enabled))
        .try_bind_with_graceful_shutdown(listen_address, async move {
            let _ = shutdown_signal.changed().await;
            warn!("Stopping HTTP discovery server. {}", listen_address);
        })
        .map_err(|e| {
            error!("HTTP discovery server could not bind {}: {}", listen_address, e);
            Error::from(SystemError::ServerUnavailable)
        })?;
    info!("HTTP discovery server listening on {}", bound);
    serving.await;
    debug!("HTTP discovery server finished");
    Ok(())
}

async fn handle_fetch(
    server: DiscoveryServer,
    params: HashMap<String, String>,
    body: Bytes,
) -> Response {
    let timeout = match params
        .get(FETCH_TIMEOUT_QUERY_PARAM)
        .filter(|raw| !raw.is_empty())
    {
        None => server.config.default_fetch_timeout(),
        Some(raw) => match parse_duration(raw) {
            Ok(timeout) => timeout,
            Err(e) => return error_reply(e.into()),
        },
    };

    let request: DiscoveryRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return error_reply(ProtocolError::MalformedRequest(e.to_string()).into());
        }
    };

    let mode = if timeout.is_zero() {
        FetchMode::Immediate
    } else {
        FetchMode::LongPoll(timeout)
    };

    match server.fetch(&request, mode).await {
        Ok(FetchOutcome::Response(response)) => {
            DISCOVERY_RESPONSES.with_label_values(&["http", "response"]).inc();
            warp::reply::json(&response).into_response()
        }
        Ok(FetchOutcome::NotModified) => {
            DISCOVERY_RESPONSES.with_label_values(&["http", "not_modified"]).inc();
            StatusCode::NOT_MODIFIED.into_response()
        }
        Err(e) => error_reply(e),
    }
}

fn error_reply(e: Error) -> Response {
    DISCOVERY_RESPONSES.with_label_values(&["http", "error"]).inc();
    let (status, title) = match &e {
        Error::Protocol(ProtocolError::InvalidFetchTimeout(_)) => {
            (StatusCode::BAD_REQUEST, "Could not parse fetch-timeout")
        }
        Error::Protocol(ProtocolError::UnsupportedType(_)) => {
            (StatusCode::BAD_REQUEST, "Unsupported resource type")
        }
        Error::Protocol(_) => (StatusCode::BAD_REQUEST, "Could not decode DiscoveryRequest"),
        Error::Generation(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Could not generate assignments"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
    };
    if status.is_server_error() {
        warn!("discovery fetch failed: {:?}", e);
    } else {
        debug!("rejected discovery fetch: {}", e);
    }
    let body = ProblemDetail {
        title: title.to_string(),
        detail: e.to_string(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}
