//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Transaction submission and confirmation
//! - Failures by error kind
//! - Decoded events

use crate::error::{EngineError, EngineResult};
use crate::tx::ReceiptStatus;

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Transaction metrics
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "orchestrator_transactions_submitted_total",
        "Total transactions accepted by the node",
        &["chain_id", "kind"]
    ).unwrap();

    pub static ref TX_CONFIRMED: CounterVec = register_counter_vec!(
        "orchestrator_transactions_confirmed_total",
        "Total transactions mined, by receipt status",
        &["chain_id", "status"]
    ).unwrap();

    pub static ref TX_FAILED: CounterVec = register_counter_vec!(
        "orchestrator_transactions_failed_total",
        "Total pipeline failures by error kind",
        &["kind"]
    ).unwrap();

    pub static ref TX_UNRESOLVED: CounterVec = register_counter_vec!(
        "orchestrator_transactions_unresolved_total",
        "Waits that ended without a receipt",
        &["chain_id", "reason"]
    ).unwrap();

    pub static ref CONFIRMATION_LATENCY: HistogramVec = register_histogram_vec!(
        "orchestrator_confirmation_latency_seconds",
        "Time from submission to receipt",
        &["chain_id"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();

    // Event metrics
    pub static ref EVENTS_DECODED: CounterVec = register_counter_vec!(
        "orchestrator_events_decoded_total",
        "Total events decoded by name",
        &["event"]
    ).unwrap();
}

/// Text exposition of every registered metric
pub fn render() -> EngineResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| EngineError::Config(format!("metrics encoding: {}", e)))?;
    String::from_utf8(buffer).map_err(|e| EngineError::Config(format!("metrics encoding: {}", e)))
}

// Helper functions to record metrics

pub fn record_tx_submitted(chain_id: u64, kind: &str) {
    TX_SUBMITTED
        .with_label_values(&[&chain_id.to_string(), kind])
        .inc();
}

pub fn record_tx_confirmed(chain_id: u64, status: ReceiptStatus, latency_secs: f64) {
    let chain = chain_id.to_string();
    TX_CONFIRMED
        .with_label_values(&[&chain, status.as_str()])
        .inc();
    CONFIRMATION_LATENCY
        .with_label_values(&[&chain])
        .observe(latency_secs);
}

pub fn record_tx_unresolved(chain_id: u64, reason: &str) {
    TX_UNRESOLVED
        .with_label_values(&[&chain_id.to_string(), reason])
        .inc();
}

pub fn record_tx_failed(error: &EngineError) {
    TX_FAILED.with_label_values(&[error.kind()]).inc();
}

pub fn record_event_decoded(event: &str) {
    EVENTS_DECODED.with_label_values(&[event]).inc();
}
