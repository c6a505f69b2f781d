//! Prometheus metrics for the chat pipeline.
//!
//! Exposes:
//! - `rag_chatbot_chat_requests_total` (counter by outcome)
//! - `rag_chatbot_provider_duration_seconds` (histogram by provider)
//! - `rag_chatbot_provider_calls_total` (counter by provider and status)
//! - `rag_chatbot_retrieval_results_total` (counter by variant)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static CHAT_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rag_chatbot_chat_requests_total",
        "Chat turns by outcome",
        &["outcome"]
    )
    .expect("failed to register chat request counter")
});

static PROVIDER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // 100ms up to ~100s.
    let buckets =
        prometheus::exponential_buckets(0.1, 2.0, 11).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "rag_chatbot_provider_duration_seconds",
        "Generation call latency in seconds",
        &["provider"],
        buckets
    )
    .expect("failed to register provider duration histogram")
});

static PROVIDER_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rag_chatbot_provider_calls_total",
        "Generation calls by provider and status",
        &["provider", "status"]
    )
    .expect("failed to register provider call counter")
});

static RETRIEVAL_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rag_chatbot_retrieval_results_total",
        "Context snippets returned by retrieval",
        &["variant"]
    )
    .expect("failed to register retrieval counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&CHAT_REQUESTS);
    Lazy::force(&PROVIDER_DURATION);
    Lazy::force(&PROVIDER_CALLS);
    Lazy::force(&RETRIEVAL_RESULTS);
}

/// `outcome` is `answered` or `rejected`.
pub fn record_chat_outcome(outcome: &'static str) {
    init_collectors();
    CHAT_REQUESTS.with_label_values(&[outcome]).inc();
}

pub fn record_provider_call(provider: &'static str, duration: Duration, success: bool) {
    init_collectors();
    PROVIDER_DURATION
        .with_label_values(&[provider])
        .observe(duration.as_secs_f64());
    PROVIDER_CALLS
        .with_label_values(&[provider, if success { "ok" } else { "error" }])
        .inc();
}

pub fn record_retrieval(variant: &'static str, results: usize) {
    init_collectors();
    RETRIEVAL_RESULTS
        .with_label_values(&[variant])
        .inc_by(results as u64);
}

fn plain_response(status: StatusCode, body: Full<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(plain_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            Full::from("encode error"),
        ));
    }

    let mut response = plain_response(StatusCode::OK, Full::from(buffer));
    if let Ok(content_type) = hyper::header::HeaderValue::from_str(encoder.format_type()) {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, content_type);
    }
    Ok(response)
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(plain_response(StatusCode::NOT_FOUND, Full::new(Bytes::new()))),
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}
