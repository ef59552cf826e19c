//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; a no-op until a recorder is
//! installed (the API server installs a Prometheus one).

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "vcheck_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "vcheck_cache_misses_total";
    pub const CACHE_ERRORS_TOTAL: &str = "vcheck_cache_errors_total";
    pub const ORACLE_DURATION_SECONDS: &str = "vcheck_oracle_duration_seconds";
    pub const ORACLE_FAILURES_TOTAL: &str = "vcheck_oracle_failures_total";
    pub const SCORE_DRIFT_TOTAL: &str = "vcheck_score_drift_total";
    pub const SCORE_CLAMPED_TOTAL: &str = "vcheck_score_clamped_total";
    pub const ANALYSES_TOTAL: &str = "vcheck_analyses_total";
}

pub fn record_cache_lookup(backend: &'static str, hit: bool) {
    let labels = [("backend", backend.to_string())];
    if hit {
        counter!(names::CACHE_HITS_TOTAL, &labels).increment(1);
    } else {
        counter!(names::CACHE_MISSES_TOTAL, &labels).increment(1);
    }
}

pub fn record_cache_error(backend: &'static str, operation: &'static str) {
    let labels = [
        ("backend", backend.to_string()),
        ("operation", operation.to_string()),
    ];
    counter!(names::CACHE_ERRORS_TOTAL, &labels).increment(1);
}

pub fn record_oracle_call(oracle: &str, duration_secs: f64, success: bool) {
    let labels = [("oracle", oracle.to_string())];
    histogram!(names::ORACLE_DURATION_SECONDS, &labels).record(duration_secs);
    if !success {
        counter!(names::ORACLE_FAILURES_TOTAL, &labels).increment(1);
    }
}

pub fn record_score_drift() {
    counter!(names::SCORE_DRIFT_TOTAL).increment(1);
}

pub fn record_score_clamped(axes: usize) {
    counter!(names::SCORE_CLAMPED_TOTAL).increment(axes as u64);
}

/// Record a finished analysis; `outcome` is "hit", "computed" or an error code.
pub fn record_analysis(outcome: &'static str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::ANALYSES_TOTAL, &labels).increment(1);
}
