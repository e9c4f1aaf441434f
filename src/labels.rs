// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! The standard `app.kubernetes.io/*` labels double as identity labels: the
//! engine re-finds adapter workloads by selecting on them rather than by name.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture (always "adapter")
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of the application (the lower-cased kind)
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of`
pub const PART_OF_SWITCHYARD: &str = "switchyard";

/// Value for `app.kubernetes.io/managed-by`
pub const MANAGED_BY_SWITCHYARD: &str = "switchyard-controller";

// ============================================================================
// Switchyard-Specific Labels
// ============================================================================

/// Tenant label copied from an instance onto its adapter and pods
pub const SWITCHYARD_TENANT_LABEL: &str = "switchyard.io/tenant";

/// Instance labels propagated onto adapter workloads and their pods
pub const PROPAGATED_LABELS: &[&str] = &[SWITCHYARD_TENANT_LABEL];

// ============================================================================
// Knative Serving Labels and Annotations
// ============================================================================

/// Label controlling the network visibility of a Knative Service
pub const KNATIVE_VISIBILITY_LABEL: &str = "networking.knative.dev/visibility";

/// Visibility value restricting a Knative Service to the cluster network
pub const KNATIVE_VISIBILITY_CLUSTER_LOCAL: &str = "cluster-local";

/// Annotation set by the Knative Serving webhook on creation (immutable)
pub const KNATIVE_CREATOR_ANNOTATION: &str = "serving.knative.dev/creator";

/// Annotation set by the Knative Serving webhook on update (immutable)
pub const KNATIVE_UPDATER_ANNOTATION: &str = "serving.knative.dev/lastModifier";

/// Annotations injected by the Knative Serving admission webhook.
///
/// They must be carried over from the current object on every update or the
/// webhook rejects the request.
pub const KNATIVE_SERVING_ANNOTATIONS: &[&str] =
    &[KNATIVE_CREATOR_ANNOTATION, KNATIVE_UPDATER_ANNOTATION];
