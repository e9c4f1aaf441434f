// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition types and reasons for Switchyard resources.
//!
//! Reasons are programmatic identifiers in `CamelCase` that explain why a condition
//! has a particular status. Event reasons share the same namespace: every warning
//! event emitted by the engine uses one of the `REASON_*` constants below.
//!
//! # Condition Set
//!
//! Every reconcilable instance carries a `Ready` condition whose value is derived
//! from its dependent conditions:
//!
//! - `SinkProvided` - only for types that send events to a sink
//! - `RBACProvisioned` - always
//! - `Deployed` - always
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: Ready
//!       status: "Unknown"
//!       reason: AdapterUnavailable
//!       message: "The status of the adapter Deployment can not be determined yet"
//!     - type: SinkProvided
//!       status: "True"
//!     - type: RBACProvisioned
//!       status: "True"
//!     - type: Deployed
//!       status: "Unknown"
//!       reason: AdapterUnavailable
//!       message: "The status of the adapter Deployment can not be determined yet"
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// Aggregate readiness of the instance.
pub const CONDITION_READY: &str = "Ready";

/// The instance's sink destination has been resolved to a URL.
pub const CONDITION_SINK_PROVIDED: &str = "SinkProvided";

/// The adapter's `ServiceAccount` and `RoleBindings` exist and are in sync.
pub const CONDITION_RBAC_PROVISIONED: &str = "RBACProvisioned";

/// The adapter workload is up and running.
pub const CONDITION_DEPLOYED: &str = "Deployed";

// ============================================================================
// Condition Statuses
// ============================================================================

/// Condition status `True`
pub const STATUS_TRUE: &str = "True";

/// Condition status `False`
pub const STATUS_FALSE: &str = "False";

/// Condition status `Unknown`
pub const STATUS_UNKNOWN: &str = "Unknown";

// ============================================================================
// Condition Reasons
// ============================================================================

/// All dependent conditions are `True`.
pub const REASON_ALL_READY: &str = "AllReady";

/// A dependent condition has not been evaluated yet.
pub const REASON_INITIALIZING: &str = "Initializing";

/// The sink has been resolved.
pub const REASON_SINK_RESOLVED: &str = "SinkResolved";

/// The sink does not exist or has no address.
pub const REASON_SINK_NOT_FOUND: &str = "SinkNotFound";

/// The type requires a sink but the instance does not define one.
pub const REASON_SINK_EMPTY: &str = "EmptySinkURI";

/// RBAC objects are in sync.
pub const REASON_RBAC_BOUND: &str = "RBACBound";

/// The adapter's `ServiceAccount` could not be bound.
pub const REASON_RBAC_NOT_BOUND: &str = "RBACNotBound";

/// The adapter workload is available.
pub const REASON_ADAPTER_AVAILABLE: &str = "AdapterAvailable";

/// The adapter workload is unavailable or its status can not be determined.
pub const REASON_ADAPTER_UNAVAILABLE: &str = "AdapterUnavailable";

/// A container of the adapter keeps failing to run, e.g. in `CrashLoopBackOff`.
pub const REASON_APP_RUNTIME_FAILURE: &str = "AppRuntimeFailure";

/// The container image of the adapter can not be pulled.
pub const REASON_BAD_CONTAINER_IMAGE: &str = "BadContainerImage";

// ============================================================================
// Event Reasons
// ============================================================================

/// The sink destination could not be resolved.
pub const REASON_BAD_SINK_URI: &str = "BadSinkURI";

/// The desired state of the adapter could not be generated from the spec.
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// An adapter workload was created.
pub const REASON_ADAPTER_CREATED: &str = "AdapterCreated";

/// An adapter workload was updated.
pub const REASON_ADAPTER_UPDATED: &str = "AdapterUpdated";

/// Creating the adapter workload failed.
pub const REASON_FAILED_ADAPTER_CREATE: &str = "FailedAdapterCreate";

/// Updating the adapter workload failed.
pub const REASON_FAILED_ADAPTER_UPDATE: &str = "FailedAdapterUpdate";

/// Looking up the adapter workload failed.
pub const REASON_FAILED_ADAPTER_GET: &str = "FailedAdapterGet";

/// A `ServiceAccount` or `RoleBinding` was created.
pub const REASON_RBAC_CREATE: &str = "CreateRBAC";

/// A `ServiceAccount` or `RoleBinding` was updated.
pub const REASON_RBAC_UPDATE: &str = "UpdateRBAC";

/// Creating a `ServiceAccount` or `RoleBinding` failed.
pub const REASON_FAILED_RBAC_CREATE: &str = "FailedRBACCreate";

/// Updating a `ServiceAccount` or `RoleBinding` failed.
pub const REASON_FAILED_RBAC_UPDATE: &str = "FailedRBACUpdate";

/// Looking up a `ServiceAccount` or `RoleBinding` failed.
pub const REASON_FAILED_RBAC_GET: &str = "FailedRBACGet";

/// Listing the instances that own the shared identity failed.
pub const REASON_FAILED_OWNERS_LIST: &str = "FailedOwnersList";

/// Persisting the instance status failed.
pub const REASON_FAILED_STATUS_UPDATE: &str = "FailedStatusUpdate";
