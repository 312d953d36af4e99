//! # Prometheus Metrics
//!
//! Operational metrics for the ledger node, scraped at `/metrics` on the
//! metrics port.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] with the
//! `hashlock` prefix so they do not collide with the default global
//! registry.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Invocation outcome label values.
pub mod outcome {
    /// Simulated and committed.
    pub const COMMITTED: &str = "committed";
    /// Query served without a commit.
    pub const QUERY: &str = "query";
    /// The contract rejected the invocation.
    pub const REJECTED: &str = "rejected";
    /// Lost an MVCC race at commit.
    pub const CONFLICT: &str = "conflict";
    /// The store failed.
    pub const FAILED: &str = "failed";
}

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc`s internally) so it can be
/// shared between the dispatcher and request handlers.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Invocations by operation name and outcome.
    pub invocations_total: IntCounterVec,
    /// Commits rejected because a read key changed underneath them.
    pub mvcc_conflicts_total: IntCounter,
    /// Version of the most recent commit.
    pub committed_version: IntGauge,
    /// Wall time from simulation start to commit, in seconds.
    pub invocation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("hashlock".into()), None)
            .expect("failed to create prometheus registry");

        let invocations_total = IntCounterVec::new(
            Opts::new("invocations_total", "Ledger invocations by operation and outcome"),
            &["operation", "outcome"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(invocations_total.clone()))
            .expect("metric registration");

        let mvcc_conflicts_total = IntCounter::new(
            "mvcc_conflicts_total",
            "Commits rejected by MVCC read-set validation",
        )
        .expect("metric creation");
        registry
            .register(Box::new(mvcc_conflicts_total.clone()))
            .expect("metric registration");

        let committed_version =
            IntGauge::new("committed_version", "Version of the latest world-state commit")
                .expect("metric creation");
        registry
            .register(Box::new(committed_version.clone()))
            .expect("metric registration");

        let invocation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "invocation_latency_seconds",
                "Simulation plus commit latency in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(invocation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            invocations_total,
            mvcc_conflicts_total,
            committed_version,
            invocation_latency_seconds,
        }
    }

    /// Counts one invocation of `operation` ending in `outcome`.
    pub fn record(&self, operation: &str, outcome: &str) {
        self.invocations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
