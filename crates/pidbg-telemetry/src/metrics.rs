//! Prometheus metrics for pidbg.
//!
//! Covers the dispatcher (readings applied/rejected, latency), the
//! broadcaster (events, subscribers) and the source samplers.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means
//! duplicate metric names, which is a startup misconfiguration and only
//! surfaces during static initialization.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_gauge,
    CounterVec, Encoder, GaugeVec, HistogramVec, IntGauge, TextEncoder,
};

/// Readings committed to the snapshot.
/// Labels: kind (pin/wifi/bluetooth/system/interface_set/custom)
pub static READINGS_APPLIED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pidbg_readings_applied_total",
        "Total readings committed to the snapshot",
        &["kind"]
    )
    .unwrap()
});

/// Readings discarded because they failed validation.
pub static READINGS_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pidbg_readings_rejected_total",
        "Total readings rejected by validation",
        &["kind"]
    )
    .unwrap()
});

/// Time from dequeue to fan-out completion, in milliseconds.
pub static DISPATCH_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "pidbg_dispatch_latency_ms",
        "Apply plus broadcast latency per reading in milliseconds",
        &["kind"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 50.0]
    )
    .unwrap()
});

/// Events handed to the broadcaster.
/// Labels: kind (pin/wifi/bluetooth/system/custom/meta/snapshot)
pub static EVENTS_BROADCAST_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pidbg_events_broadcast_total",
        "Total events fanned out to subscribers",
        &["kind"]
    )
    .unwrap()
});

/// Currently registered subscribers.
pub static SUBSCRIBERS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("pidbg_subscribers_active", "Currently registered subscribers").unwrap()
});

/// Subscribers removed from the registry.
/// Labels: reason (slow/closed/unsubscribed/shutdown)
pub static SUBSCRIBERS_DROPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pidbg_subscribers_dropped_total",
        "Total subscribers removed from the registry",
        &["reason"]
    )
    .unwrap()
});

/// Failed samples per source. A failed sample submits nothing.
pub static SOURCE_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pidbg_source_failures_total",
        "Total failed samples per source",
        &["source"]
    )
    .unwrap()
});

/// Current health flags (1 = raised).
pub static HEALTH_FLAG: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "pidbg_health_flag",
        "Derived health flags (1=raised)",
        &["flag"]
    )
    .unwrap()
});

/// Open WebSocket connections on the dashboard.
pub static WS_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("pidbg_ws_connections", "Open dashboard WebSocket connections").unwrap()
});

/// Metrics helper for recording values.
pub struct Metrics;

impl Metrics {
    pub fn reading_applied(kind: &str) {
        READINGS_APPLIED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn reading_rejected(kind: &str) {
        READINGS_REJECTED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn dispatch_latency(kind: &str, latency_ms: f64) {
        DISPATCH_LATENCY_MS
            .with_label_values(&[kind])
            .observe(latency_ms);
    }

    pub fn event_broadcast(kind: &str) {
        EVENTS_BROADCAST_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn subscribers_active(count: usize) {
        SUBSCRIBERS_ACTIVE.set(count as i64);
    }

    pub fn subscriber_dropped(reason: &str) {
        SUBSCRIBERS_DROPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn source_failure(source: &str) {
        SOURCE_FAILURES_TOTAL.with_label_values(&[source]).inc();
    }

    pub fn health_flag(flag: &str, raised: bool) {
        HEALTH_FLAG
            .with_label_values(&[flag])
            .set(if raised { 1.0 } else { 0.0 });
    }

    pub fn ws_connected() {
        WS_CONNECTIONS.inc();
    }

    pub fn ws_disconnected() {
        WS_CONNECTIONS.dec();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let families = prometheus::gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
