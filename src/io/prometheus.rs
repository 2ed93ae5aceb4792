//! Prometheus metrics HTTP endpoint
//!
//! Exposes controller metrics in Prometheus text format at /metrics.
//! Uses hyper for the HTTP server.

use crate::infra::metrics::{Metrics, MetricsSummary, CONFIRM_BUCKET_BOUNDS, NUM_BUCKETS};
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

fn write_metric(output: &mut String, name: &str, help: &str, typ: MetricType, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    buckets: &[u64; NUM_BUCKETS],
    bounds: &[u64; NUM_BUCKETS - 1],
    sum: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let _ = writeln!(output, "{name}_sum {sum}");
    let _ = writeln!(output, "{name}_count {count}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(summary: &MetricsSummary) -> String {
    let mut output = String::with_capacity(4096);
    write_ingest_metrics(&mut output, summary);
    write_actuation_metrics(&mut output, summary);
    output
}

fn write_ingest_metrics(output: &mut String, s: &MetricsSummary) {
    write_metric(
        output,
        "garage_updates_total",
        "Location updates received",
        MetricType::Counter,
        s.updates_received,
    );
    write_metric(
        output,
        "garage_updates_dropped_total",
        "Location updates dropped because the dispatcher queue was full",
        MetricType::Counter,
        s.updates_dropped,
    );
    write_metric(
        output,
        "garage_parse_errors_total",
        "Coordinate payloads that failed to parse",
        MetricType::Counter,
        s.parse_errors,
    );
    write_metric(
        output,
        "garage_unknown_vehicle_total",
        "Updates for unconfigured vehicle ids",
        MetricType::Counter,
        s.unknown_vehicle,
    );
    write_metric(
        output,
        "garage_evaluations_total",
        "Geofence evaluations scheduled",
        MetricType::Counter,
        s.evaluations_scheduled,
    );
    write_metric(
        output,
        "garage_evaluations_skipped_total",
        "Evaluations skipped while an actuation or cooldown held the vehicle lock",
        MetricType::Counter,
        s.evaluations_skipped,
    );
}

fn write_actuation_metrics(output: &mut String, s: &MetricsSummary) {
    write_metric(
        output,
        "garage_actions_decided_total",
        "Open/close decisions taken",
        MetricType::Counter,
        s.actions_decided,
    );
    write_metric(
        output,
        "garage_commands_issued_total",
        "Door commands sent to the backend",
        MetricType::Counter,
        s.commands_issued,
    );
    write_metric(
        output,
        "garage_noop_acks_total",
        "Actuations skipped because the door was already in the desired state",
        MetricType::Counter,
        s.noop_acks,
    );
    write_metric(
        output,
        "garage_indeterminate_total",
        "Actuations skipped because the door was in a transitional state",
        MetricType::Counter,
        s.indeterminate,
    );
    write_metric(
        output,
        "garage_actuation_failures_total",
        "Actuations aborted by authentication or device errors",
        MetricType::Counter,
        s.failures,
    );
    write_metric(
        output,
        "garage_actuation_timeouts_total",
        "Actuations where the door never reached the desired state",
        MetricType::Counter,
        s.timeouts,
    );
    write_histogram(
        output,
        "garage_confirm_latency_ms",
        "Time from command issue to confirmed door state in milliseconds",
        &s.confirm_buckets,
        &CONFIRM_BUCKET_BOUNDS,
        s.confirm_sum_ms,
    );
    write_metric(
        output,
        "garage_confirm_latency_max_ms",
        "Slowest confirmed actuation",
        MetricType::Gauge,
        s.confirm_max_ms,
    );
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&metrics.snapshot());
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        (&Method::GET, "/health") => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .expect("static response should not fail")),
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail")),
    }
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = %port, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| handle_request(req, metrics.clone()));

                            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
