// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the TransIP webhook.
//!
//! All metrics use the namespace prefix `cert_manager_webhook_transip_` and are
//! exposed on the webhook server's `/metrics` endpoint.
//!
//! # Metrics Categories
//!
//! - **Challenge Metrics** - Present/CleanUp calls and their outcomes
//! - **Record Metrics** - What each call actually changed at TransIP
//! - **Provider Metrics** - TransIP REST API requests and latency
//! - **Zone Metrics** - Authoritative zone lookups that fell back
//!
//! # Example
//!
//! ```rust,no_run
//! use cert_manager_webhook_transip::metrics::record_challenge;
//!
//! record_challenge("transip", "Present", true, std::time::Duration::from_millis(850));
//! ```

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all webhook metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "cert_manager_webhook_transip";

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Challenge Metrics
// ============================================================================

/// Total number of challenge calls by solver, action and status
///
/// Labels:
/// - `solver`: Solver name (e.g., `transip`)
/// - `action`: `Present` or `CleanUp`
/// - `status`: `success` or `error`
pub static CHALLENGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_challenges_total"),
        "Total number of challenge calls by solver, action and status",
    );
    let counter = CounterVec::new(opts, &["solver", "action", "status"])
        .expect("valid challenges_total metric");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("challenges_total registered once");
    counter
});

/// Duration of challenge calls in seconds
pub static CHALLENGE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_challenge_duration_seconds"),
        "Duration of challenge calls in seconds by solver and action",
    )
    .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["solver", "action"])
        .expect("valid challenge_duration_seconds metric");
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("challenge_duration_seconds registered once");
    histogram
});

// ============================================================================
// Record Metrics
// ============================================================================

/// Outcome of record management per challenge
///
/// Labels:
/// - `outcome`: `created`, `already_present`, `deleted`, `not_found`
pub static RECORD_CHANGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_record_changes_total"),
        "Challenge record changes by outcome",
    );
    let counter =
        CounterVec::new(opts, &["outcome"]).expect("valid record_changes_total metric");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("record_changes_total registered once");
    counter
});

// ============================================================================
// Provider Metrics
// ============================================================================

/// Total number of TransIP API requests by operation and status
pub static PROVIDER_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_provider_requests_total"),
        "Total number of TransIP API requests by operation and status",
    );
    let counter = CounterVec::new(opts, &["operation", "status"])
        .expect("valid provider_requests_total metric");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("provider_requests_total registered once");
    counter
});

/// Duration of TransIP API requests in seconds
pub static PROVIDER_REQUEST_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_provider_request_duration_seconds"),
        "Duration of TransIP API requests in seconds by operation",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["operation"])
        .expect("valid provider_request_duration_seconds metric");
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("provider_request_duration_seconds registered once");
    histogram
});

// ============================================================================
// Zone Metrics
// ============================================================================

/// Zone lookups that failed and fell back to the zone supplied by cert-manager
pub static ZONE_LOOKUP_FALLBACKS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_zone_lookup_fallbacks_total"),
        "Zone lookups that fell back to the cert-manager resolved zone",
    )
    .expect("valid zone_lookup_fallbacks_total metric");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("zone_lookup_fallbacks_total registered once");
    counter
});

// ============================================================================
// Recording helpers
// ============================================================================

/// Record a finished challenge call
pub fn record_challenge(solver: &str, action: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };
    CHALLENGES_TOTAL
        .with_label_values(&[solver, action, status])
        .inc();
    CHALLENGE_DURATION_SECONDS
        .with_label_values(&[solver, action])
        .observe(duration.as_secs_f64());
}

/// Record what a challenge call did to the TransIP domain
pub fn record_record_change(outcome: &str) {
    RECORD_CHANGES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record one TransIP API request
pub fn record_provider_request(operation: &str, status: &str, duration: Duration) {
    PROVIDER_REQUESTS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    PROVIDER_REQUEST_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Record a zone lookup that fell back to the supplied zone
pub fn record_zone_lookup_fallback() {
    ZONE_LOOKUP_FALLBACKS_TOTAL.inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
