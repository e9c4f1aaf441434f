// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status of reconciled instances.
//!
//! All changes made during a reconciliation are collected in memory by a
//! [`StatusUpdater`] and written with at most one status patch at the end.
//! The patch is skipped when nothing changed semantically, which keeps a
//! converged instance from triggering its own reconciliation forever.
//!
//! # Example
//!
//! ```rust,ignore
//! use switchyard::reconcilers::status::StatusUpdater;
//!
//! async fn reconcile(api: &dyn ObjectApi<WebhookSource>, obj: WebhookSource) -> Result<()> {
//!     let mut status = StatusUpdater::new(&obj, conditions);
//!
//!     // Collect status changes in memory
//!     status.mark_true(CONDITION_RBAC_PROVISIONED, REASON_RBAC_BOUND, "");
//!
//!     // Single update at the end
//!     status.apply(api).await?;
//!     Ok(())
//! }
//! ```

use crate::api::ObjectApi;
use crate::crd::{AdapterStatus, Addressable, Condition};
use crate::knative::{
    KnService, CONDITION_CONFIGURATIONS_READY, CONDITION_ROUTES_READY, CONDITION_SERVICE_READY,
};
use crate::reconcilers::conditions::{
    conditions_equal, find_condition, is_condition_true, ConditionSet,
};
use crate::reconcilers::reconcilable::Reconcilable;
use crate::status_reasons::{
    CONDITION_DEPLOYED, CONDITION_READY, REASON_ADAPTER_AVAILABLE, REASON_ADAPTER_UNAVAILABLE,
    STATUS_TRUE,
};
use k8s_openapi::api::apps::v1::Deployment;
use kube::{Resource, ResourceExt};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Type of the `Deployment` condition reporting availability
const DEPLOYMENT_AVAILABLE: &str = "Available";

/// Availability of an adapter workload, as reported by its status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Availability {
    /// The workload status does not tell yet.
    Unknown { message: String },
    Unavailable { reason: String, message: String },
    Available,
}

/// Availability of a pool workload, from its `Available` condition.
#[must_use]
pub fn deployment_availability(deployment: &Deployment) -> Availability {
    let available = deployment
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|c| c.iter().find(|c| c.type_ == DEPLOYMENT_AVAILABLE));

    match available {
        None => Availability::Unknown {
            message: "The status of the adapter Deployment can not be determined".to_string(),
        },
        Some(c) if c.status == STATUS_TRUE => Availability::Available,
        Some(c) => {
            let mut message = "The adapter Deployment is unavailable".to_string();
            if let Some(detail) = c.message.as_deref().filter(|m| !m.is_empty()) {
                message.push_str(": ");
                message.push_str(detail);
            }
            Availability::Unavailable {
                reason: REASON_ADAPTER_UNAVAILABLE.to_string(),
                message,
            }
        }
    }
}

/// Availability of an on-demand workload, from its `Ready` condition.
///
/// When the service is not ready, the messages of its `RoutesReady` and
/// `ConfigurationsReady` conditions are appended, and the reason of
/// `ConfigurationsReady` replaces the generic one.
#[must_use]
pub fn kn_service_availability(service: &KnService) -> Availability {
    let conditions: &[Condition] = service
        .status
        .as_ref()
        .map(|s| s.conditions.as_slice())
        .unwrap_or_default();

    match find_condition(conditions, CONDITION_SERVICE_READY) {
        None => Availability::Unknown {
            message: "The status of the adapter Service can not be determined".to_string(),
        },
        Some(c) if c.status == STATUS_TRUE => Availability::Available,
        Some(_) => {
            let mut reason = REASON_ADAPTER_UNAVAILABLE.to_string();
            let mut message = "The adapter Service is unavailable".to_string();

            for condition_type in [CONDITION_ROUTES_READY, CONDITION_CONFIGURATIONS_READY] {
                let Some(c) = find_condition(conditions, condition_type) else {
                    continue;
                };
                if c.status == STATUS_TRUE {
                    continue;
                }
                if let Some(detail) = c.message.as_deref().filter(|m| !m.is_empty()) {
                    message.push_str("; ");
                    message.push_str(detail);
                }
                if condition_type == CONDITION_CONFIGURATIONS_READY {
                    if let Some(r) = c.reason.as_deref().filter(|r| !r.is_empty()) {
                        reason = r.to_string();
                    }
                }
            }

            Availability::Unavailable { reason, message }
        }
    }
}

/// Centralized status updater for adapter-backed instances.
///
/// Collects all status changes in memory and applies them in a single API call.
pub struct StatusUpdater {
    namespace: String,
    name: String,
    conditions: ConditionSet,
    current_status: Option<AdapterStatus>,
    new_status: AdapterStatus,
}

impl StatusUpdater {
    /// Start from the current status of `obj`.
    ///
    /// The observed generation and the event type metadata are refreshed, and
    /// the conditions are brought in line with `conditions`.
    #[must_use]
    pub fn new<T: Reconcilable>(obj: &T, conditions: ConditionSet) -> Self {
        let current_status = obj.adapter_status().cloned();
        let mut new_status = current_status.clone().unwrap_or_default();

        new_status.observed_generation = obj.meta().generation;
        new_status.ce_attributes = obj.emitted_event_types();
        new_status.accepted_event_types = obj.accepted_event_types();
        conditions.initialize(&mut new_status.conditions);

        Self {
            namespace: obj.namespace().unwrap_or_default(),
            name: obj.name_any(),
            conditions,
            current_status,
            new_status,
        }
    }

    pub fn mark_true(&mut self, condition_type: &str, reason: &str, message: &str) {
        self.conditions
            .mark_true(&mut self.new_status.conditions, condition_type, reason, message);
    }

    pub fn mark_false(&mut self, condition_type: &str, reason: &str, message: &str) {
        self.conditions
            .mark_false(&mut self.new_status.conditions, condition_type, reason, message);
    }

    pub fn mark_unknown(&mut self, condition_type: &str, reason: &str, message: &str) {
        self.conditions
            .mark_unknown(&mut self.new_status.conditions, condition_type, reason, message);
    }

    pub fn set_sink_uri(&mut self, sink: Option<&Url>) {
        self.new_status.sink_uri = sink.map(ToString::to_string);
    }

    pub fn set_address(&mut self, url: Option<String>) {
        self.new_status.address = url.map(|url| Addressable { url: Some(url) });
    }

    /// Reflect the availability of the adapter in `Deployed`, and publish its
    /// address when it is available.
    ///
    /// `route` is appended to the address of shared adapters so each instance
    /// gets its own URL.
    pub fn propagate_availability(
        &mut self,
        availability: &Availability,
        address: Option<&str>,
        route: Option<&str>,
    ) {
        match availability {
            Availability::Available => {
                self.mark_true(CONDITION_DEPLOYED, REASON_ADAPTER_AVAILABLE, "");
                let url = address.map(|address| match route {
                    Some(route) => format!("{}/{}", address.trim_end_matches('/'), route),
                    None => address.to_string(),
                });
                self.set_address(url);
            }
            Availability::Unavailable { reason, message } => {
                self.mark_false(CONDITION_DEPLOYED, reason, message);
                self.set_address(None);
            }
            Availability::Unknown { message } => {
                self.mark_unknown(CONDITION_DEPLOYED, REASON_ADAPTER_UNAVAILABLE, message);
                self.set_address(None);
            }
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        is_condition_true(&self.new_status.conditions, CONDITION_READY)
    }

    #[must_use]
    pub fn status(&self) -> &AdapterStatus {
        &self.new_status
    }

    /// Check if the status has actually changed compared to the current status.
    ///
    /// Condition timestamps and ordering are ignored.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        match &self.current_status {
            None => true,
            Some(current) => {
                current.observed_generation != self.new_status.observed_generation
                    || current.sink_uri != self.new_status.sink_uri
                    || current.address != self.new_status.address
                    || current.ce_attributes != self.new_status.ce_attributes
                    || current.accepted_event_types != self.new_status.accepted_event_types
                    || !conditions_equal(&current.conditions, &self.new_status.conditions)
            }
        }
    }

    /// Merge patch turning the current status into the new one.
    ///
    /// Fields that are no longer set are explicitly nulled, since a merge patch
    /// leaves omitted fields untouched.
    #[must_use]
    pub fn patch(&self) -> Value {
        let mut patch = serde_json::to_value(&self.new_status).unwrap_or(Value::Null);
        let current = self
            .current_status
            .as_ref()
            .and_then(|s| serde_json::to_value(s).ok());

        if let (Value::Object(new), Some(Value::Object(current))) = (&mut patch, current) {
            for key in current.keys() {
                if !new.contains_key(key) {
                    new.insert(key.clone(), Value::Null);
                }
            }
        }
        patch
    }

    /// Apply the collected status changes (single API call).
    ///
    /// Returns whether a write happened.
    ///
    /// # Errors
    ///
    /// Returns an error if the Kubernetes API call fails.
    pub async fn apply<K>(&self, api: &dyn ObjectApi<K>) -> Result<bool, kube::Error> {
        if !self.has_changes() {
            debug!(
                namespace = %self.namespace,
                name = %self.name,
                "Status unchanged, skipping update"
            );
            return Ok(false);
        }

        api.patch_status(&self.namespace, &self.name, &self.patch())
            .await?;

        debug!(
            namespace = %self.namespace,
            name = %self.name,
            conditions = self.new_status.conditions.len(),
            ready = self.is_ready(),
            "Updated status"
        );
        Ok(true)
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
