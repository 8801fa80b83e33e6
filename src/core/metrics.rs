// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, TextEncoder, register_counter, register_counter_vec,
    register_gauge,
};

lazy_static! {
    /// The number of sessions currently held by the registry.
    pub static ref ACTIVE_SESSIONS: Gauge =
        register_gauge!("pushbridge_active_sessions", "Number of currently registered subscriber sessions.").unwrap();

    /// The total number of sessions admitted since startup.
    pub static ref SESSIONS_ADMITTED_TOTAL: Counter =
        register_counter!("pushbridge_sessions_admitted_total", "Total number of subscriber sessions admitted.").unwrap();
    /// The total number of connection attempts rejected because the token was taken.
    pub static ref SESSIONS_REJECTED_TOTAL: Counter =
        register_counter!("pushbridge_sessions_rejected_total", "Total number of duplicate-token connections rejected.").unwrap();
    /// The total number of keep-alive frames written.
    pub static ref KEEPALIVES_SENT_TOTAL: Counter =
        register_counter!("pushbridge_keepalives_sent_total", "Total number of keep-alive frames sent.").unwrap();

    /// Publish requests, labeled by outcome (`ok`, `unauthorized`, `send_failed`).
    pub static ref PUBLISH_TOTAL: CounterVec =
        register_counter_vec!("pushbridge_publish_total", "Total number of publish requests, labeled by outcome.", &["outcome"]).unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
