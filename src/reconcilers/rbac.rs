// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Identity and permissions of adapters.
//!
//! Every adapter runs as a `ServiceAccount`, bound to:
//!
//! - the `switchyard-config-watcher` `ClusterRole`, through a `RoleBinding`
//!   named `<service-account>-config-watcher`, so the adapter can read its
//!   runtime configuration;
//! - for multi-tenant kinds, the `<component>-adapter` `ClusterRole`, through
//!   a `RoleBinding` of the same name, so the shared adapter can read every
//!   instance it serves.
//!
//! The `ServiceAccount` is owned by the instances using it; the
//! `RoleBindings` are controlled by the `ServiceAccount` and go away with it.
//!
//! These objects are shared by several instances, so their events are
//! recorded against the namespace.

use crate::api::ObjectApi;
use crate::constants::{
    CONFIG_WATCHER_CLUSTER_ROLE, CONFIG_WATCHER_SUFFIX, KIND_CLUSTER_ROLE, KIND_SERVICE_ACCOUNT,
    RBAC_API_GROUP,
};
use crate::context::Context;
use crate::errors::{is_already_exists, ReconcileError, ReconcileEvent};
use crate::events::{namespace_reference, EventPublisher};
use crate::metrics;
use crate::reconcilers::adapter::{common_labels, service_account_name, shared_adapter_name};
use crate::reconcilers::ownership::{controller_owner_ref, owner_references_equal};
use crate::reconcilers::reconcilable::Reconcilable;
use crate::reconcilers::semantic::service_account_equal;
use crate::status_reasons::{
    REASON_FAILED_RBAC_CREATE, REASON_FAILED_RBAC_GET, REASON_FAILED_RBAC_UPDATE,
    REASON_RBAC_CREATE, REASON_RBAC_UPDATE,
};
use k8s_openapi::api::core::v1::{ObjectReference, ServiceAccount};
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

/// Reconcile the `ServiceAccount` and `RoleBindings` of `obj`'s adapter.
///
/// Returns `Ok(None)` without touching anything when `owners` is empty.
///
/// # Errors
///
/// Returns a transient [`ReconcileError`] when an object can not be read or
/// written.
pub async fn reconcile_rbac<T: Reconcilable>(
    ctx: &Context,
    obj: &T,
    owners: Vec<OwnerReference>,
) -> Result<Option<ServiceAccount>, ReconcileError> {
    if owners.is_empty() {
        debug!(
            kind = %T::KIND,
            name = %obj.name_any(),
            "No ServiceAccount owners, skipping RBAC"
        );
        return Ok(None);
    }

    let namespace = obj.namespace().unwrap_or_default();
    let desired = new_service_account(&namespace, &service_account_name(obj), T::KIND, owners);

    let sa = get_or_create_then_sync(
        ctx.service_accounts.as_ref(),
        ctx.events.as_ref(),
        T::KIND,
        desired,
        service_account_equal,
        |desired, current| {
            desired.secrets = token_secrets(current);
        },
    )
    .await?;

    let config_watcher = new_role_binding(
        &namespace,
        &format!("{}-{CONFIG_WATCHER_SUFFIX}", sa.name_any()),
        CONFIG_WATCHER_CLUSTER_ROLE,
        T::KIND,
        &sa,
    )?;
    sync_role_binding(ctx, T::KIND, config_watcher).await?;

    if T::MULTI_TENANT {
        let name = shared_adapter_name(T::KIND);
        let binding = new_role_binding(&namespace, &name, &name, T::KIND, &sa)?;
        sync_role_binding(ctx, T::KIND, binding).await?;
    }

    Ok(Some(sa))
}

async fn sync_role_binding(
    ctx: &Context,
    kind: &str,
    desired: RoleBinding,
) -> Result<RoleBinding, ReconcileError> {
    get_or_create_then_sync(
        ctx.role_bindings.as_ref(),
        ctx.events.as_ref(),
        kind,
        desired,
        role_binding_equal,
        |_, _| {},
    )
    .await
}

/// `ServiceAccount` owned by `owners`.
#[must_use]
pub fn new_service_account(
    namespace: &str,
    name: &str,
    kind: &str,
    owners: Vec<OwnerReference>,
) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(common_labels(kind)),
            owner_references: Some(owners),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// `RoleBinding` of `sa` to a `ClusterRole`, controlled by `sa`.
///
/// # Errors
///
/// Returns a transient error if `sa` has not been persisted yet.
pub fn new_role_binding(
    namespace: &str,
    name: &str,
    cluster_role: &str,
    kind: &str,
    sa: &ServiceAccount,
) -> Result<RoleBinding, ReconcileError> {
    let owner = controller_owner_ref(sa).ok_or_else(|| {
        ReconcileError::transient(
            REASON_FAILED_RBAC_GET,
            format!("ServiceAccount {:?} has no UID", sa.name_any()),
        )
    })?;

    Ok(RoleBinding {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(common_labels(kind)),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: KIND_CLUSTER_ROLE.to_string(),
            name: cluster_role.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: KIND_SERVICE_ACCOUNT.to_string(),
            name: sa.name_any(),
            namespace: Some(namespace.to_string()),
            api_group: None,
        }]),
    })
}

/// Whether an observed `RoleBinding` has the desired owners, role and subjects.
#[must_use]
pub fn role_binding_equal(desired: &RoleBinding, current: &RoleBinding) -> bool {
    let owners = |rb: &RoleBinding| rb.metadata.owner_references.clone().unwrap_or_default();
    owner_references_equal(&owners(desired), &owners(current))
        && desired.role_ref == current.role_ref
        && desired.subjects.clone().unwrap_or_default()
            == current.subjects.clone().unwrap_or_default()
}

/// Token secrets the token controller attached to a `ServiceAccount`.
///
/// They are kept across updates so that the tokens are not regenerated.
fn token_secrets(current: &ServiceAccount) -> Option<Vec<ObjectReference>> {
    let prefix = format!("{}-token-", current.name_any());
    let secrets: Vec<_> = current
        .secrets
        .iter()
        .flatten()
        .filter(|s| s.name.as_deref().is_some_and(|n| n.starts_with(&prefix)))
        .cloned()
        .collect();
    (!secrets.is_empty()).then_some(secrets)
}

/// Make the object named like `desired` match it.
///
/// The object is created when missing, and replaced when `equal` says the
/// observed object differs. `prepare_update` may carry fields over from the
/// observed object before the replace. The resourceVersion is always carried.
async fn get_or_create_then_sync<K>(
    api: &dyn ObjectApi<K>,
    events: &dyn EventPublisher,
    kind: &str,
    desired: K,
    equal: fn(&K, &K) -> bool,
    prepare_update: impl FnOnce(&mut K, &K),
) -> Result<K, ReconcileError>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync,
{
    let object_kind = K::kind(&()).to_string();
    let namespace = desired.namespace().unwrap_or_default();
    let name = desired.name_any();
    let event_ref = namespace_reference(&namespace);

    let current = api.get(&namespace, &name).await.map_err(|e| {
        ReconcileError::transient(
            REASON_FAILED_RBAC_GET,
            format!("Failed to get {object_kind} {name:?}: {e}"),
        )
    })?;

    let Some(current) = current else {
        let created = match api.create(&namespace, &desired).await {
            Ok(created) => created,
            // Another instance sharing the identity got there first
            Err(e) if is_already_exists(&e) => {
                debug!(
                    namespace = %namespace,
                    name = %name,
                    object = %object_kind,
                    "Created concurrently, syncing the existing object"
                );
                let existing = api.get(&namespace, &name).await.ok().flatten().ok_or_else(|| {
                    ReconcileError::transient(
                        REASON_FAILED_RBAC_CREATE,
                        format!("Failed to create {object_kind} {name:?}: {e}"),
                    )
                })?;
                return sync_existing(api, events, kind, desired, existing, equal, prepare_update)
                    .await;
            }
            Err(e) => {
                return Err(ReconcileError::transient(
                    REASON_FAILED_RBAC_CREATE,
                    format!("Failed to create {object_kind} {name:?}: {e}"),
                ));
            }
        };
        info!(
            kind = %kind,
            namespace = %namespace,
            name = %name,
            object = %object_kind,
            "Created RBAC object"
        );
        metrics::record_object_created(kind, &object_kind);
        events
            .publish(
                &event_ref,
                &ReconcileEvent::normal(
                    REASON_RBAC_CREATE,
                    format!("Created {object_kind} {name:?}"),
                ),
            )
            .await;
        return Ok(created);
    };

    sync_existing(api, events, kind, desired, current, equal, prepare_update).await
}

/// Replace `current` with `desired` unless they are equal.
async fn sync_existing<K>(
    api: &dyn ObjectApi<K>,
    events: &dyn EventPublisher,
    kind: &str,
    mut desired: K,
    current: K,
    equal: fn(&K, &K) -> bool,
    prepare_update: impl FnOnce(&mut K, &K),
) -> Result<K, ReconcileError>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync,
{
    if equal(&desired, &current) {
        return Ok(current);
    }

    let object_kind = K::kind(&()).to_string();
    let namespace = desired.namespace().unwrap_or_default();
    let name = desired.name_any();
    let event_ref = namespace_reference(&namespace);

    prepare_update(&mut desired, &current);
    desired.meta_mut().resource_version.clone_from(&current.meta().resource_version);

    let updated = api.replace(&namespace, &name, &desired).await.map_err(|e| {
        ReconcileError::transient(
            REASON_FAILED_RBAC_UPDATE,
            format!("Failed to update {object_kind} {name:?}: {e}"),
        )
    })?;
    info!(
        kind = %kind,
        namespace = %namespace,
        name = %name,
        object = %object_kind,
        "Updated RBAC object"
    );
    metrics::record_object_updated(kind, &object_kind);
    events
        .publish(
            &event_ref,
            &ReconcileEvent::normal(
                REASON_RBAC_UPDATE,
                format!("Updated {object_kind} {name:?}"),
            ),
        )
        .await;
    Ok(updated)
}

#[cfg(test)]
#[path = "rbac_tests.rs"]
mod rbac_tests;
