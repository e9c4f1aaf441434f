// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Create-or-update of adapter workloads.
//!
//! Both workload flavors go through the same sequence: find the existing
//! object by identity labels and controller, create it when missing, and
//! replace it when it is not semantically equal to the desired object.
//! [`AdapterWorkload`] supplies the few operations that differ.

use crate::api::ObjectApi;
use crate::context::Context;
use crate::errors::{ReconcileError, ReconcileEvent};
use crate::knative::KnService;
use crate::labels::KNATIVE_SERVING_ANNOTATIONS;
use crate::metrics;
use crate::reconcilers::adapter::label_selector;
use crate::reconcilers::ownership::controller_uid;
use crate::reconcilers::semantic::workload_equal;
use crate::reconcilers::status::{deployment_availability, kn_service_availability, Availability};
use crate::status_reasons::{
    REASON_ADAPTER_CREATED, REASON_ADAPTER_UPDATED, REASON_FAILED_ADAPTER_CREATE,
    REASON_FAILED_ADAPTER_GET, REASON_FAILED_ADAPTER_UPDATE,
};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::core::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::{debug, info};

/// A kind of object an adapter can run as.
pub trait AdapterWorkload:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    /// API to the objects of this kind.
    fn api(ctx: &Context) -> &dyn ObjectApi<Self>;

    fn availability(&self) -> Availability;

    /// URL at which the workload receives events, if it is addressable.
    fn address(&self) -> Option<String>;

    /// Copy the status of the observed object into the desired one.
    fn copy_status(&mut self, current: &Self);

    /// Copy fields that the server refuses to see changed.
    fn carry_immutable(&mut self, _current: &Self) {}

    /// Label selector of the pods run by the workload, when they can explain
    /// its unavailability.
    fn pod_selector(&self) -> Option<String> {
        None
    }
}

impl AdapterWorkload for Deployment {
    fn api(ctx: &Context) -> &dyn ObjectApi<Self> {
        ctx.deployments.as_ref()
    }

    fn availability(&self) -> Availability {
        deployment_availability(self)
    }

    fn address(&self) -> Option<String> {
        None
    }

    fn pod_selector(&self) -> Option<String> {
        let labels = self.spec.as_ref()?.selector.match_labels.as_ref()?;
        (!labels.is_empty()).then(|| label_selector(labels))
    }

    fn copy_status(&mut self, current: &Self) {
        self.status.clone_from(&current.status);
    }
}

impl AdapterWorkload for KnService {
    fn api(ctx: &Context) -> &dyn ObjectApi<Self> {
        ctx.kn_services.as_ref()
    }

    fn availability(&self) -> Availability {
        kn_service_availability(self)
    }

    fn address(&self) -> Option<String> {
        let status = self.status.as_ref()?;
        status
            .address
            .as_ref()
            .and_then(|a| a.url.clone())
            .or_else(|| status.url.clone())
            .filter(|url| !url.is_empty())
    }

    fn copy_status(&mut self, current: &Self) {
        self.status.clone_from(&current.status);
    }

    /// Knative records who created and last modified a service in
    /// annotations, and rejects updates changing them.
    fn carry_immutable(&mut self, current: &Self) {
        let carried: BTreeMap<String, String> = current
            .annotations()
            .iter()
            .filter(|(key, _)| KNATIVE_SERVING_ANNOTATIONS.contains(&key.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !carried.is_empty() {
            self.annotations_mut().extend(carried);
        }
    }
}

/// Make the adapter workload match `desired`.
///
/// The existing workload is the object matching `selector` whose controller
/// is the controller of `desired`; its name does not matter, so renamed
/// workloads are updated in place rather than duplicated. Events are
/// recorded against `instance`.
///
/// Returns the workload as stored by the server.
///
/// # Errors
///
/// Returns a transient [`ReconcileError`] when the workload can not be read
/// or written.
pub async fn reconcile_workload<W: AdapterWorkload>(
    ctx: &Context,
    kind: &str,
    instance: &ObjectReference,
    selector: &str,
    mut desired: W,
) -> Result<W, ReconcileError> {
    let api = W::api(ctx);
    let object_kind = W::kind(&()).to_string();
    let namespace = desired.namespace().unwrap_or_default();
    let owner_uid = controller_uid(desired.meta()).map(str::to_string);

    let current = find_workload(api, &namespace, selector, owner_uid.as_deref())
        .await
        .map_err(|e| {
            ReconcileError::transient(
                REASON_FAILED_ADAPTER_GET,
                format!("Failed to get adapter {object_kind}: {e}"),
            )
        })?;

    let Some(current) = current else {
        let name = desired.name_any();
        let created = api.create(&namespace, &desired).await.map_err(|e| {
            ReconcileError::transient(
                REASON_FAILED_ADAPTER_CREATE,
                format!("Failed to create adapter {object_kind} {name:?}: {e}"),
            )
        })?;
        info!(
            kind = %kind,
            namespace = %namespace,
            name = %name,
            object = %object_kind,
            "Created adapter"
        );
        metrics::record_object_created(kind, &object_kind);
        ctx.events
            .publish(
                instance,
                &ReconcileEvent::normal(
                    REASON_ADAPTER_CREATED,
                    format!("Created adapter {object_kind} {name:?}"),
                ),
            )
            .await;
        return Ok(created);
    };

    let name = current.name_any();
    desired.meta_mut().name = Some(name.clone());
    desired.carry_immutable(&current);

    if workload_equal(&desired, &current) {
        debug!(
            namespace = %namespace,
            name = %name,
            object = %object_kind,
            "Adapter up to date"
        );
        return Ok(current);
    }

    desired
        .meta_mut()
        .resource_version
        .clone_from(&current.meta().resource_version);
    desired.copy_status(&current);

    let updated = api.replace(&namespace, &name, &desired).await.map_err(|e| {
        ReconcileError::transient(
            REASON_FAILED_ADAPTER_UPDATE,
            format!("Failed to update adapter {object_kind} {name:?}: {e}"),
        )
    })?;
    info!(
        kind = %kind,
        namespace = %namespace,
        name = %name,
        object = %object_kind,
        "Updated adapter"
    );
    metrics::record_object_updated(kind, &object_kind);
    ctx.events
        .publish(
            instance,
            &ReconcileEvent::normal(
                REASON_ADAPTER_UPDATED,
                format!("Updated adapter {object_kind} {name:?}"),
            ),
        )
        .await;
    Ok(updated)
}

/// The object matching `selector` controlled by `owner_uid`, if any.
async fn find_workload<W: AdapterWorkload>(
    api: &dyn ObjectApi<W>,
    namespace: &str,
    selector: &str,
    owner_uid: Option<&str>,
) -> Result<Option<W>, kube::Error> {
    let Some(owner_uid) = owner_uid else {
        return Ok(None);
    };
    let candidates = api.list(namespace, selector).await?;
    Ok(candidates
        .into_iter()
        .find(|w| controller_uid(w.meta()) == Some(owner_uid)))
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod workload_tests;
