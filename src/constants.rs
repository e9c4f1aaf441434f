// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Switchyard operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all Switchyard CRDs
pub const API_GROUP: &str = "switchyard.io";

/// API version for all Switchyard CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "switchyard.io/v1alpha1";

/// Kind name for `WebhookSource` resource
pub const KIND_WEBHOOK_SOURCE: &str = "WebhookSource";

/// Kind name for `HttpTarget` resource
pub const KIND_HTTP_TARGET: &str = "HttpTarget";

/// Kind name for `Filter` resource
pub const KIND_FILTER: &str = "Filter";

/// Kind name for the pool-style workload
pub const KIND_DEPLOYMENT: &str = "Deployment";

/// Kind name for the scale-to-zero workload
pub const KIND_KN_SERVICE: &str = "Service";

/// Kind name for `ServiceAccount`
pub const KIND_SERVICE_ACCOUNT: &str = "ServiceAccount";

/// Kind name for `RoleBinding`
pub const KIND_ROLE_BINDING: &str = "RoleBinding";

/// Kind name for `ClusterRole`
pub const KIND_CLUSTER_ROLE: &str = "ClusterRole";

/// API group of RBAC objects
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

// ============================================================================
// Adapter Constants
// ============================================================================

/// Suffix appended to the component name for shared adapter objects
pub const COMPONENT_ADAPTER: &str = "adapter";

/// Name of the single container in every adapter workload
pub const ADAPTER_CONTAINER_NAME: &str = "adapter";

/// `ClusterRole` granting read access to the observability/logging `ConfigMaps`
pub const CONFIG_WATCHER_CLUSTER_ROLE: &str = "switchyard-config-watcher";

/// Suffix of the config-watch `RoleBinding` name
pub const CONFIG_WATCHER_SUFFIX: &str = "config-watcher";

/// Name of the Prometheus metrics port exposed by adapters
pub const METRICS_PORT_NAME: &str = "metrics";

/// Prometheus metrics port exposed by pool adapters
pub const METRICS_PORT: i32 = 9090;

/// Prometheus metrics port exposed by on-demand adapters.
///
/// 9090 is taken by the request proxy sidecar injected into on-demand pods.
pub const METRICS_PORT_ON_DEMAND: i32 = 9092;

/// Maximum length of a Kubernetes object name (DNS-1123 label)
pub const MAX_OBJECT_NAME_LENGTH: usize = 63;

/// Default cluster DNS domain used to address core `Services`
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

// ============================================================================
// Adapter Environment Variables
// ============================================================================

/// URL of the event sink
pub const ENV_SINK: &str = "K_SINK";

/// Component name of the adapter (lower-cased kind)
pub const ENV_COMPONENT: &str = "K_COMPONENT";

/// Namespace of the reconciled instance
pub const ENV_NAMESPACE: &str = "NAMESPACE";

/// Name of the reconciled instance
pub const ENV_NAME: &str = "NAME";

/// Port the adapter exposes Prometheus metrics on
pub const ENV_METRICS_PROMETHEUS_PORT: &str = "METRICS_PROMETHEUS_PORT";

/// Namespace the adapter's leader election and config watch run in
pub const ENV_SYSTEM_NAMESPACE: &str = "SYSTEM_NAMESPACE";

// ============================================================================
// Controller Constants
// ============================================================================

/// Default field manager / reporting controller name
pub const DEFAULT_FIELD_MANAGER: &str = "switchyard-controller";

/// Requeue interval for resources that are ready (5 minutes)
pub const REQUEUE_WHEN_READY_SECS: u64 = 300;

/// Requeue interval for resources that are not ready (30 seconds)
pub const REQUEUE_WHEN_NOT_READY_SECS: u64 = 30;

/// Initial delay before retrying a transient reconciliation failure (1 second)
pub const ERROR_BACKOFF_INITIAL_SECS: u64 = 1;

/// Upper bound of the retry delay for transient failures (5 minutes)
pub const ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Default number of keys reconciled concurrently per controller
pub const DEFAULT_CONTROLLER_CONCURRENCY: u16 = 4;

/// Default number of tokio worker threads
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Default bind address of the metrics/health HTTP server
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";
