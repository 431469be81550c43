//! Prometheus metrics for the chat client.
//!
//! Every `record_*` helper is a no-op until [`init_metrics`] has run.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Turn metrics
pub static CHAT_TURNS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Provider metrics
pub static CHAT_PROVIDER_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static CHAT_PROVIDER_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Storage metrics
pub static CHAT_STORE_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Later calls are ignored.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let turns = IntCounterVec::new(
        Opts::new("chat_turns_total", "Completed chat turns"),
        &["outcome"], // success, error
    )?;

    let provider_latency = HistogramVec::new(
        HistogramOpts::new(
            "chat_provider_latency_seconds",
            "Answer provider latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["model"],
    )?;

    let provider_errors = IntCounterVec::new(
        Opts::new("chat_provider_errors_total", "Answer provider failures"),
        &["model", "kind"],
    )?;

    let store_errors = IntCounterVec::new(
        Opts::new("chat_store_errors_total", "Session store failures"),
        &["operation"],
    )?;

    registry.register(Box::new(turns.clone()))?;
    registry.register(Box::new(provider_latency.clone()))?;
    registry.register(Box::new(provider_errors.clone()))?;
    registry.register(Box::new(store_errors.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = CHAT_TURNS_TOTAL.set(turns);
    let _ = CHAT_PROVIDER_LATENCY_SECONDS.set(provider_latency);
    let _ = CHAT_PROVIDER_ERRORS_TOTAL.set(provider_errors);
    let _ = CHAT_STORE_ERRORS_TOTAL.set(store_errors);

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Get metrics in Prometheus text format.
pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => return "# Metrics registry not initialized\n".to_string(),
    };

    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Failed to convert metrics to UTF-8: {}\n", e))
}

/// Record a finished turn.
pub fn record_turn(outcome: &str) {
    if let Some(counter) = CHAT_TURNS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Record provider latency.
pub fn record_provider_latency(model: &str, duration_secs: f64) {
    if let Some(histogram) = CHAT_PROVIDER_LATENCY_SECONDS.get() {
        histogram.with_label_values(&[model]).observe(duration_secs);
    }
}

/// Record a provider error.
pub fn record_provider_error(model: &str, kind: &str) {
    if let Some(counter) = CHAT_PROVIDER_ERRORS_TOTAL.get() {
        counter.with_label_values(&[model, kind]).inc();
    }
}

/// Record a session store failure.
pub fn record_store_error(operation: &str) {
    if let Some(counter) = CHAT_STORE_ERRORS_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}
