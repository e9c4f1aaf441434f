// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed subset of the Knative Serving `Service` API.
//!
//! Only the fields the adapter engine reads or writes are modelled. Fields
//! defaulted by Knative (traffic, container concurrency, ...) are filled in
//! again by its admission webhook on every write.

use crate::crd::{Addressable, Condition};
use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Specification of a Knative `Service`.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize)]
#[kube(
    group = "serving.knative.dev",
    version = "v1",
    kind = "Service",
    root = "KnService",
    namespaced,
    status = "KnServiceStatus",
    schema = "disabled",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct KnServiceSpec {
    /// Template of the revisions created for this service.
    #[serde(default)]
    pub template: RevisionTemplateSpec,
}

/// Template of a Knative `Revision`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionTemplateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,

    /// Knative inlines the pod spec into the revision spec.
    #[serde(default)]
    pub spec: PodSpec,
}

/// Observed state of a Knative `Service`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnServiceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Public URL of the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Cluster-internal address of the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Addressable>,
}

/// Condition reporting the overall readiness of a Knative `Service`.
pub const CONDITION_SERVICE_READY: &str = "Ready";

/// Condition reporting the readiness of the routes of a Knative `Service`.
pub const CONDITION_ROUTES_READY: &str = "RoutesReady";

/// Condition reporting the readiness of the configuration of a Knative `Service`.
pub const CONDITION_CONFIGURATIONS_READY: &str = "ConfigurationsReady";
