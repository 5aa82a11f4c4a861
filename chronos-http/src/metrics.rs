//! Prometheus text metrics, rendered on `GET /metrics`
//! (`kimberlite-server::metrics` / the workspace's `prometheus` dependency;
//! SPEC_FULL.md §4.11). Counters are incremented at the same call sites
//! spec.md §4.2's trace events fire from.

use std::sync::OnceLock;

use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub timers_stored: IntGauge,
    pub pops_total: IntCounter,
    pub callback_success_total: IntCounter,
    pub callback_failure_total: IntCounter,
    pub replication_failure_total: IntCounter,
    pub resync_pages_served_total: IntCounter,
    pub resync_pages_pulled_total: IntCounter,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let timers_stored = IntGauge::with_opts(Opts::new(
            "chronos_timers_stored",
            "Timers currently held in this node's store",
        ))
        .expect("static metric definition is valid");
        let pops_total = IntCounter::with_opts(Opts::new("chronos_pops_total", "Timers popped by the pop loop"))
            .expect("static metric definition is valid");
        let callback_success_total = IntCounter::with_opts(Opts::new(
            "chronos_callback_success_total",
            "Client callbacks that returned a 2xx status",
        ))
        .expect("static metric definition is valid");
        let callback_failure_total = IntCounter::with_opts(Opts::new(
            "chronos_callback_failure_total",
            "Client callbacks that failed or returned a non-2xx status",
        ))
        .expect("static metric definition is valid");
        let replication_failure_total = IntCounter::with_opts(Opts::new(
            "chronos_replication_failure_total",
            "Replication PUTs that failed or were rejected by a peer",
        ))
        .expect("static metric definition is valid");
        let resync_pages_served_total = IntCounter::with_opts(Opts::new(
            "chronos_resync_pages_served_total",
            "Resync pages this node served to requesting peers",
        ))
        .expect("static metric definition is valid");
        let resync_pages_pulled_total = IntCounter::with_opts(Opts::new(
            "chronos_resync_pages_pulled_total",
            "Resync pages this node pulled from old peers",
        ))
        .expect("static metric definition is valid");

        registry
            .register(Box::new(timers_stored.clone()))
            .expect("metric name is unique within this registry");
        registry
            .register(Box::new(pops_total.clone()))
            .expect("metric name is unique within this registry");
        registry
            .register(Box::new(callback_success_total.clone()))
            .expect("metric name is unique within this registry");
        registry
            .register(Box::new(callback_failure_total.clone()))
            .expect("metric name is unique within this registry");
        registry
            .register(Box::new(replication_failure_total.clone()))
            .expect("metric name is unique within this registry");
        registry
            .register(Box::new(resync_pages_served_total.clone()))
            .expect("metric name is unique within this registry");
        registry
            .register(Box::new(resync_pages_pulled_total.clone()))
            .expect("metric name is unique within this registry");

        Self {
            registry,
            timers_stored,
            pops_total,
            callback_success_total,
            callback_failure_total,
            replication_failure_total,
            resync_pages_served_total,
            resync_pages_pulled_total,
        }
    }

    pub fn global() -> &'static Metrics {
        static METRICS: OnceLock<Metrics> = OnceLock::new();
        METRICS.get_or_init(Metrics::new)
    }

    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        encoder
            .encode(&self.registry.gather(), &mut buf)
            .expect("prometheus text encoding never fails for in-process metrics");
        String::from_utf8(buf).expect("prometheus text encoder always emits utf8")
    }
}
