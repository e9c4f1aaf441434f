// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Switchyard controllers.
//!
//! This module provides metrics collection with the namespace prefix
//! `switchyard_io_` (prometheus-safe version of "switchyard.io").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Track reconciliation operations and their outcomes
//! - **Child Object Metrics** - Track the adapter and RBAC objects written by the engine
//! - **Error Metrics** - Track error reasons and permanent failures
//!
//! # Example
//!
//! ```rust,no_run
//! use switchyard::metrics::record_reconciliation_success;
//!
//! // Record a successful reconciliation
//! record_reconciliation_success("WebhookSource", std::time::Duration::from_secs(1));
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all Switchyard metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "switchyard_io";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by kind and status
///
/// Labels:
/// - `kind`: Reconciled kind (e.g., `WebhookSource`, `Filter`)
/// - `status`: Outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by kind and status",
    );
    let counter = CounterVec::new(opts, &["kind", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `kind`: Reconciled kind
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by kind",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of requeue operations
///
/// Labels:
/// - `kind`: Reconciled kind
/// - `reason`: Reason for requeue (`backoff`, `not_ready`, `resync`)
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of requeue operations by kind and reason",
    );
    let counter = CounterVec::new(opts, &["kind", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Child Object Metrics
// ============================================================================

/// Total number of child objects created
///
/// Labels:
/// - `kind`: Kind of the reconciled instance
/// - `object`: Kind of the created object (`Deployment`, `Service`, `ServiceAccount`, `RoleBinding`)
pub static OBJECTS_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_objects_created_total"),
        "Total number of child objects created by instance kind and object kind",
    );
    let counter = CounterVec::new(opts, &["kind", "object"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of child objects updated
///
/// Labels:
/// - `kind`: Kind of the reconciled instance
/// - `object`: Kind of the updated object
pub static OBJECTS_UPDATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_objects_updated_total"),
        "Total number of child objects updated by instance kind and object kind",
    );
    let counter = CounterVec::new(opts, &["kind", "object"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of reconciliation errors
///
/// Labels:
/// - `kind`: Reconciled kind
/// - `reason`: Event reason of the error (e.g., `BadSinkURI`, `FailedRBACCreate`)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of reconciliation errors by kind and reason",
    );
    let counter = CounterVec::new(opts, &["kind", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of permanent failures (not retried until the instance changes)
///
/// Labels:
/// - `kind`: Reconciled kind
pub static PERMANENT_FAILURES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_permanent_failures_total"),
        "Total number of permanent reconciliation failures by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
///
/// # Arguments
/// * `kind` - The reconciled kind (e.g., `WebhookSource`)
/// * `duration` - Duration of the reconciliation
pub fn record_reconciliation_success(kind: &str, duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&[kind, "success"]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
///
/// # Arguments
/// * `kind` - The reconciled kind
/// * `duration` - Duration of the reconciliation before failure
pub fn record_reconciliation_error(kind: &str, duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&[kind, "error"]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record a reconciliation requeue
pub fn record_reconciliation_requeue(kind: &str, reason: &str) {
    RECONCILIATION_TOTAL.with_label_values(&[kind, "requeue"]).inc();
    REQUEUE_TOTAL.with_label_values(&[kind, reason]).inc();
}

/// Record the creation of a child object
pub fn record_object_created(kind: &str, object: &str) {
    OBJECTS_CREATED_TOTAL.with_label_values(&[kind, object]).inc();
}

/// Record the update of a child object
pub fn record_object_updated(kind: &str, object: &str) {
    OBJECTS_UPDATED_TOTAL.with_label_values(&[kind, object]).inc();
}

/// Record a reconciliation error
///
/// # Arguments
/// * `kind` - The reconciled kind
/// * `reason` - Event reason of the error
/// * `permanent` - Whether the error stops retries
pub fn record_error(kind: &str, reason: &str, permanent: bool) {
    ERRORS_TOTAL.with_label_values(&[kind, reason]).inc();
    if permanent {
        PERMANENT_FAILURES_TOTAL.with_label_values(&[kind]).inc();
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_reconciliation_success() {
        let kind = "TestKind";
        record_reconciliation_success(kind, Duration::from_millis(500));

        let counter = RECONCILIATION_TOTAL.with_label_values(&[kind, "success"]);
        assert!(counter.get() > 0.0);

        let histogram = RECONCILIATION_DURATION_SECONDS.with_label_values(&[kind]);
        assert!(histogram.get_sample_count() > 0);
    }

    #[test]
    fn test_record_error_counts_permanent_failures() {
        let kind = "TestKindPermanent";
        record_error(kind, "InvalidSpec", true);
        record_error(kind, "FailedAdapterCreate", false);

        assert!(ERRORS_TOTAL.with_label_values(&[kind, "InvalidSpec"]).get() > 0.0);
        assert!((PERMANENT_FAILURES_TOTAL.with_label_values(&[kind]).get() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_object_writes() {
        record_object_created("TestKindObjects", "Deployment");
        record_object_updated("TestKindObjects", "Deployment");

        assert!(
            OBJECTS_CREATED_TOTAL
                .with_label_values(&["TestKindObjects", "Deployment"])
                .get()
                > 0.0
        );
        assert!(
            OBJECTS_UPDATED_TOTAL
                .with_label_values(&["TestKindObjects", "Deployment"])
                .get()
                > 0.0
        );
    }

    #[test]
    fn test_gather_metrics() {
        record_reconciliation_success("GatherTest", Duration::from_millis(100));

        let result = gather_metrics();
        assert!(result.is_ok(), "Gathering metrics should succeed");

        let metrics_text = result.unwrap();
        assert!(
            metrics_text.contains("switchyard_io"),
            "Metrics should contain namespace prefix"
        );
        assert!(
            metrics_text.contains("reconciliations_total"),
            "Metrics should contain reconciliation counter"
        );
    }
}
