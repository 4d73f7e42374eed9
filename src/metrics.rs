use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Safe to call repeatedly: the first call
    /// installs, later calls return the same handle.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE.get_or_try_init(|| {
            let handle = PrometheusBuilder::new().install_recorder()?;
            describe();
            Ok::<_, anyhow::Error>(handle)
        })?;
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!(
        "econutri_weights_derived_total",
        "Weight vectors derived by the local resolver"
    );
    describe_counter!(
        "econutri_rounding_corrections_total",
        "Derivations whose rounding drift was corrected on packaging"
    );
    describe_counter!(
        "econutri_remote_fallback_total",
        "Remote resolves that fell back to cached or default weights, by reason"
    );
    describe_counter!(
        "econutri_stale_responses_dropped_total",
        "Resolved weights discarded because a newer judgment was already shown"
    );
    describe_histogram!(
        "econutri_remote_resolve_ms",
        "Latency of remote weight resolution in milliseconds"
    );
}
