//! Prometheus metrics collection for secure actions.
//!
//! Metrics live in a crate-local registry. Hosts call [`init`] once and
//! expose [`gather_metrics`] wherever they serve Prometheus text. Until
//! `init` runs every `record_*` helper is a no-op.
//!
//! - `secure_actions_created_total` - Actions minted
//! - `secure_actions_executions_total{outcome}` - Execution attempts by outcome
//! - `secure_actions_execution_duration_seconds` - Execution latency histogram
//! - `secure_actions_deleted_total{reason}` - Records removed, by reason
//! - `secure_actions_sweeps_total` - Completed sweeps
//! - `secure_actions_swept_total` - Records evicted by sweeps

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Total actions minted.
pub static ACTIONS_CREATED: OnceLock<IntCounter> = OnceLock::new();

/// Execution attempts by outcome (`success`, `declined`, or an error code).
pub static EXECUTIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Records removed by reason (`explicit`, `expired`, `exhausted`, `sweep`).
pub static ACTIONS_DELETED: OnceLock<IntCounterVec> = OnceLock::new();

/// Completed sweeps.
pub static SWEEPS: OnceLock<IntCounter> = OnceLock::new();

/// Records evicted by sweeps.
pub static SWEPT: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Execution latency, including hash verification and the handler call.
pub static EXECUTION_LATENCY: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(ACTIONS_CREATED, IntCounter::new("secure_actions_created_total", "Secure actions created"));
    register!(EXECUTIONS, IntCounterVec::new(Opts::new("secure_actions_executions_total", "Secure action executions by outcome"), &["outcome"]));
    register!(ACTIONS_DELETED, IntCounterVec::new(Opts::new("secure_actions_deleted_total", "Secure actions deleted by reason"), &["reason"]));
    register!(SWEEPS, IntCounter::new("secure_actions_sweeps_total", "Completed sweeps"));
    register!(SWEPT, IntCounter::new("secure_actions_swept_total", "Secure actions evicted by sweeps"));
    register!(EXECUTION_LATENCY, Histogram::with_opts(
        HistogramOpts::new("secure_actions_execution_duration_seconds", "Secure action execution latency")
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

#[inline]
pub fn record_created() {
    if let Some(c) = ACTIONS_CREATED.get() {
        c.inc();
    }
}

/// Record an execution attempt and its latency.
#[inline]
pub fn record_execution(outcome: &str, duration_secs: f64) {
    if let Some(c) = EXECUTIONS.get() {
        c.with_label_values(&[outcome]).inc();
    }
    if let Some(h) = EXECUTION_LATENCY.get() {
        h.observe(duration_secs);
    }
}

#[inline]
pub fn record_deleted(reason: &str) {
    if let Some(c) = ACTIONS_DELETED.get() {
        c.with_label_values(&[reason]).inc();
    }
}

#[inline]
pub fn record_sweep(evicted: u64) {
    if let Some(c) = SWEEPS.get() {
        c.inc();
    }
    if let Some(c) = SWEPT.get() {
        c.inc_by(evicted);
    }
}
