use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;
use std::sync::OnceLock;

use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    pub requests_total: Family<OpLabel, Counter>,
    pub errors_total: Family<ErrorLabel, Counter>,
    pub chain_submissions_total: Family<OpLabel, Counter>,
    pub broadcast_failures_total: Counter,
    /// Trades that reached the chain but not the local ledger.
    pub ledger_write_failures_total: Counter,
    /// Creations that reached the chain but could not be persisted.
    pub unreconciled_total: Counter,
    /// Display reads that fell back to zero.
    pub degraded_reads_total: Family<OpLabel, Counter>,
    pub submit_ms: Histogram,
    pub request_ms: Family<OpLabel, Histogram>,
    pub circles_total: Gauge<i64>,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OpLabel {
    pub op: &'static str,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabel {
    pub op: &'static str,
    pub kind: &'static str,
}

fn buckets_ms() -> Vec<f64> {
    vec![
        5.0, 10.0, 25.0, 50.0, 100.0, 200.0, 300.0, 500.0, 750.0, 1000.0, 1500.0, 2000.0, 3000.0,
        5000.0, 10_000.0, 20_000.0,
    ]
}

fn new_histogram() -> Histogram {
    Histogram::new(buckets_ms().into_iter())
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let mut registry = Registry::default();

        let requests_total = Family::<OpLabel, Counter>::default();
        registry.register(
            "circle_engine_requests_total",
            "Requests per operation",
            requests_total.clone(),
        );
        let errors_total = Family::<ErrorLabel, Counter>::default();
        registry.register(
            "circle_engine_errors_total",
            "Failed requests per operation and error kind",
            errors_total.clone(),
        );
        let chain_submissions_total = Family::<OpLabel, Counter>::default();
        registry.register(
            "circle_engine_chain_submissions_total",
            "Transactions accepted by the node",
            chain_submissions_total.clone(),
        );
        let broadcast_failures_total = Counter::default();
        registry.register(
            "circle_engine_broadcast_failures_total",
            "eth_sendRawTransaction failures (outcome unknown)",
            broadcast_failures_total.clone(),
        );
        let ledger_write_failures_total = Counter::default();
        registry.register(
            "circle_engine_ledger_write_failures_total",
            "Submitted trades missing from the local ledger",
            ledger_write_failures_total.clone(),
        );
        let unreconciled_total = Counter::default();
        registry.register(
            "circle_engine_unreconciled_total",
            "Submitted circle creations that failed to persist",
            unreconciled_total.clone(),
        );
        let degraded_reads_total = Family::<OpLabel, Counter>::default();
        registry.register(
            "circle_engine_degraded_reads_total",
            "Display reads answered with zero after a chain error",
            degraded_reads_total.clone(),
        );

        let submit_ms = new_histogram();
        registry.register(
            "circle_engine_submit_ms",
            "Prepare + broadcast latency (ms)",
            submit_ms.clone(),
        );
        let request_ms: Family<OpLabel, Histogram> = Family::new_with_constructor(new_histogram);
        registry.register(
            "circle_engine_request_ms",
            "Handler latency per operation (ms)",
            request_ms.clone(),
        );

        let circles_total = Gauge::<i64>::default();
        registry.register(
            "circle_engine_circles",
            "Circles in the local index",
            circles_total.clone(),
        );

        Metrics {
            registry,
            requests_total,
            errors_total,
            chain_submissions_total,
            broadcast_failures_total,
            ledger_write_failures_total,
            unreconciled_total,
            degraded_reads_total,
            submit_ms,
            request_ms,
            circles_total,
        }
    })
}

/// Counts one request for `op`, its latency, and its error kind if any.
pub fn observe<T>(op: &'static str, started: std::time::Instant, res: &Result<T, crate::error::AppError>) {
    let m = metrics();
    m.requests_total.get_or_create(&OpLabel { op }).inc();
    m.request_ms
        .get_or_create(&OpLabel { op })
        .observe(started.elapsed().as_secs_f64() * 1000.0);
    if let Err(e) = res {
        m.errors_total
            .get_or_create(&ErrorLabel { op, kind: e.kind() })
            .inc();
    }
}

pub async fn metrics_handler(State(st): State<AppState>) -> impl IntoResponse {
    let m = metrics();
    // Keep the last value if the store is unhappy; the scrape itself should not fail.
    if let Ok(n) = st.circles.count().await {
        m.circles_total.set(n as i64);
    }
    let mut out = String::new();
    if let Err(e) = encode(&mut out, &m.registry) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("encode metrics failed: {e}"),
        )
            .into_response();
    }
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        out,
    )
        .into_response()
}
