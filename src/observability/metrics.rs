//! # Metrics Collection
//!
//! Counters for engine operations, recorded through the `metrics` facade.
//! No exporter is installed here; embedding applications choose one.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(
        "kvmirror_operations_total",
        Unit::Count,
        "Secret engine operations by operation and outcome"
    );
    describe_counter!(
        "kvmirror_drift_detected_total",
        Unit::Count,
        "Paths reported as drifted by the sync auditor"
    );
    describe_counter!(
        "kvmirror_secrets_destroyed_total",
        Unit::Count,
        "Secrets permanently destroyed by the retention sweeper"
    );
    describe_histogram!(
        "kvmirror_audit_scanned_paths",
        Unit::Count,
        "Paths visited per sync audit"
    );
}

/// Metrics recorder that tracks engine activity
#[derive(Debug, Clone, Default)]
pub struct OperationMetrics;

impl OperationMetrics {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record the outcome of a lifecycle, resync or sweep operation
    pub fn record_operation(&self, operation: &str, outcome: &str) {
        let labels = [("operation", operation.to_string()), ("outcome", outcome.to_string())];
        counter!("kvmirror_operations_total", &labels).increment(1);
    }

    /// Record a tree scan: how many paths were visited and how many drifted
    pub fn record_audit(&self, scanned: usize, drifted: usize) {
        histogram!("kvmirror_audit_scanned_paths").record(scanned as f64);
        counter!("kvmirror_drift_detected_total").increment(drifted as u64);
    }

    /// Record permanently destroyed secrets
    pub fn record_destroyed(&self, count: usize) {
        counter!("kvmirror_secrets_destroyed_total").increment(count as u64);
    }
}
