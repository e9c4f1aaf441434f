// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all adapter controllers.
//!
//! All controllers receive an `Arc<Context>` that contains:
//! - API access for every object kind the engine writes
//! - The sink address resolver
//! - The event publisher
//! - The per-key retry tracker

use crate::api::{AddressResolver, KubeAddressResolver, KubeObjectApi, ObjectApi};
use crate::config::OperatorConfig;
use crate::events::{EventPublisher, KubeEventPublisher};
use crate::knative::KnService;
use crate::reconcilers::retry::BackoffTracker;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, ServiceAccount};
use k8s_openapi::api::rbac::v1::RoleBinding;
use kube::Client;
use std::sync::Arc;

/// Shared context passed to all controllers.
pub struct Context {
    pub service_accounts: Arc<dyn ObjectApi<ServiceAccount>>,
    pub role_bindings: Arc<dyn ObjectApi<RoleBinding>>,
    pub deployments: Arc<dyn ObjectApi<Deployment>>,
    pub kn_services: Arc<dyn ObjectApi<KnService>>,

    /// Read-only; explains unavailable adapter `Deployments`
    pub pods: Arc<dyn ObjectApi<Pod>>,

    /// Resolves sink references to URLs
    pub resolver: Arc<dyn AddressResolver>,

    /// Records Kubernetes events
    pub events: Arc<dyn EventPublisher>,

    /// Requeue delays of transient failures, per object key
    pub backoff: BackoffTracker,
}

impl Context {
    /// Build a context talking to the cluster through `client`.
    #[must_use]
    pub fn new(client: &Client, config: &OperatorConfig) -> Self {
        let field_manager = config.field_manager.as_str();
        Self {
            service_accounts: Arc::new(KubeObjectApi::new(client.clone(), field_manager)),
            role_bindings: Arc::new(KubeObjectApi::new(client.clone(), field_manager)),
            deployments: Arc::new(KubeObjectApi::new(client.clone(), field_manager)),
            kn_services: Arc::new(KubeObjectApi::new(client.clone(), field_manager)),
            pods: Arc::new(KubeObjectApi::new(client.clone(), field_manager)),
            resolver: Arc::new(KubeAddressResolver::new(
                client.clone(),
                &config.cluster_domain,
            )),
            events: Arc::new(KubeEventPublisher::new(client.clone(), field_manager)),
            backoff: BackoffTracker::default(),
        }
    }
}
