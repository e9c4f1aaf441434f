// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for event integration components.
//!
//! Every resource kind managed by Switchyard is backed by an "adapter": a
//! workload that performs the actual event processing. The kinds defined here
//! share a common status block ([`AdapterStatus`]) and the optional
//! [`AdapterOverrides`] knob, so the reconciliation engine can treat all of them
//! the same way.
//!
//! # Resource Types
//!
//! ## Event Sources
//!
//! - [`WebhookSource`] - Receives HTTP requests and emits them as `CloudEvents`
//!
//! ## Event Targets
//!
//! - [`HttpTarget`] - Forwards `CloudEvents` to an HTTP endpoint
//!
//! ## Routing
//!
//! - [`Filter`] - Drops events that do not match an expression (multi-tenant)
//!
//! # Example: Creating a Webhook Source
//!
//! ```rust,no_run
//! use switchyard::crd::{Destination, KReference, WebhookSourceSpec};
//!
//! let spec = WebhookSourceSpec {
//!     event_type: "com.example.push".to_string(),
//!     event_source: None,
//!     basic_auth_username: None,
//!     sink: Some(Destination {
//!         r#ref: Some(KReference {
//!             api_version: "eventing.knative.dev/v1".to_string(),
//!             kind: "Broker".to_string(),
//!             name: "default".to_string(),
//!             namespace: None,
//!         }),
//!         uri: None,
//!     }),
//!     adapter_overrides: None,
//! };
//! ```

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements, Toleration};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition: Ready, SinkProvided, RBACProvisioned or Deployed.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Reference to another Kubernetes object that exposes an address.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KReference {
    /// API version of the referent (e.g. `eventing.knative.dev/v1`, `v1`).
    pub api_version: String,

    /// Kind of the referent (e.g. `Broker`, `Service`).
    pub kind: String,

    /// Name of the referent.
    pub name: String,

    /// Namespace of the referent. Defaults to the namespace of the referring object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Destination events are delivered to.
///
/// Either `ref` or `uri` must be set. When both are set, `uri` is resolved
/// relative to the address of `ref`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Reference to an addressable object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<KReference>,

    /// Absolute URL, or a URL relative to the address of `ref`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Knobs applied on top of the adapter workload generated for an instance.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdapterOverrides {
    /// Expose an on-demand adapter outside of the cluster network.
    ///
    /// On-demand adapters are cluster-local unless this is set to `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,

    /// Extra environment variables appended to the adapter container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Compute resources of the adapter container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Tolerations of the adapter pods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
}

/// Address at which an object can be reached.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Addressable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// `CloudEvent` attributes of the events emitted by a source.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudEventAttributes {
    /// Value of the `type` attribute.
    pub r#type: String,

    /// Value of the `source` attribute.
    pub source: String,
}

/// Status shared by every kind that runs an adapter.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdapterStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Resolved URL of the sink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink_uri: Option<String>,

    /// Public address of the adapter, for kinds that receive events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Addressable>,

    /// Attributes of the events emitted by this instance.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ce_attributes: Vec<CloudEventAttributes>,

    /// Types of the events accepted by this instance.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accepted_event_types: Vec<String>,
}

/// `WebhookSource` exposes an HTTP endpoint and emits every request it
/// receives as a `CloudEvent` to its sink.
///
/// # Example
///
/// ```yaml
/// apiVersion: switchyard.io/v1alpha1
/// kind: WebhookSource
/// metadata:
///   name: github
///   namespace: default
/// spec:
///   eventType: com.github.push
///   sink:
///     ref:
///       apiVersion: eventing.knative.dev/v1
///       kind: Broker
///       name: default
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "switchyard.io",
    version = "v1alpha1",
    kind = "WebhookSource",
    namespaced,
    doc = "WebhookSource receives HTTP requests and forwards them to a sink as CloudEvents."
)]
#[kube(status = "AdapterStatus")]
#[serde(rename_all = "camelCase")]
pub struct WebhookSourceSpec {
    /// Value of the `type` attribute of emitted events.
    pub event_type: String,

    /// Value of the `source` attribute of emitted events.
    ///
    /// Defaults to the namespaced name of the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_source: Option<String>,

    /// User name required in the `Authorization` header of incoming requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth_username: Option<String>,

    /// Destination of emitted events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<Destination>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_overrides: Option<AdapterOverrides>,
}

/// `HttpTarget` sends every event it receives to an HTTP endpoint and
/// optionally forwards the response to a sink.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "switchyard.io",
    version = "v1alpha1",
    kind = "HttpTarget",
    namespaced,
    doc = "HttpTarget delivers CloudEvents to an HTTP endpoint."
)]
#[kube(status = "AdapterStatus")]
#[serde(rename_all = "camelCase")]
pub struct HttpTargetSpec {
    /// URL of the remote endpoint.
    pub endpoint: String,

    /// HTTP method used for requests. Defaults to `POST`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Destination of the responses returned by the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<Destination>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_overrides: Option<AdapterOverrides>,
}

/// `Filter` forwards the events matching an expression to its sink.
///
/// All filters of a namespace are served by one shared adapter.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "switchyard.io",
    version = "v1alpha1",
    kind = "Filter",
    namespaced,
    doc = "Filter drops the CloudEvents that do not match an expression."
)]
#[kube(status = "AdapterStatus")]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    /// Expression evaluated against each event. Non-matching events are dropped.
    pub expression: String,

    /// Destination of matching events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<Destination>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_overrides: Option<AdapterOverrides>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
