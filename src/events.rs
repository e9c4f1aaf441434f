// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes Event recording for adapter controllers.
//!
//! Provides a trait-based abstraction over `kube::runtime::events::Recorder`
//! so that the engine can emit standard Kubernetes Events visible via
//! `kubectl describe` and `kubectl get events`, and so tests can capture them.
//!
//! Events are fire-and-forget: failures are logged as warnings and never
//! propagate errors. A failed event must never break reconciliation.

use crate::errors::ReconcileEvent;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Action reported on every event emitted by the engine.
pub const ACTION_RECONCILE: &str = "Reconcile";

/// Trait for publishing Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event about the given object.
    async fn publish(&self, resource_ref: &ObjectReference, event: &ReconcileEvent);
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a new publisher reporting as the given controller name.
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, resource_ref: &ObjectReference, event: &ReconcileEvent) {
        let kube_event = Event {
            type_: event.type_,
            reason: event.reason.clone(),
            note: Some(event.message.clone()),
            action: ACTION_RECONCILE.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&kube_event, resource_ref).await {
            warn!(
                reason = %event.reason,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// Reference to a namespace, for events about objects shared by several instances.
#[must_use]
pub fn namespace_reference(namespace: &str) -> ObjectReference {
    ObjectReference {
        api_version: Some("v1".to_string()),
        kind: Some("Namespace".to_string()),
        name: Some(namespace.to_string()),
        ..Default::default()
    }
}
