// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The adapter reconciliation engine.
//!
//! One [`AdapterReconciler`] per kind drives every instance of that kind
//! through the same sequence:
//!
//! 1. Initialize status (observed generation, event types, condition set)
//! 2. Resolve the sink (`SinkProvided`)
//! 3. Build the desired adapter (a spec error stops here, permanently)
//! 4. Compute the `ServiceAccount` owners
//! 5. Reconcile the `ServiceAccount` and `RoleBindings` (`RBACProvisioned`)
//! 6. Reconcile the adapter workload (`Deployed`)
//! 7. Propagate the adapter availability and address
//! 8. Persist the status, with a single patch, even when a step failed
//!
//! The instance is never written outside of its status, and nothing is
//! deleted: children go away through garbage collection of their owners.

use crate::api::ObjectApi;
use crate::context::Context;
use crate::errors::ReconcileError;
use crate::reconcilers::adapter::{identity_labels, label_selector, Workload};
use crate::reconcilers::conditions::ConditionSet;
use crate::reconcilers::ownership::{controller_owner_ref, service_account_owners};
use crate::reconcilers::pods::explain_unavailability;
use crate::reconcilers::rbac::reconcile_rbac;
use crate::reconcilers::reconcilable::{AdapterBuilder, Reconcilable, SinkSupport};
use crate::reconcilers::sink::resolve_sink;
use crate::reconcilers::status::{Availability, StatusUpdater};
use crate::reconcilers::workload::{reconcile_workload, AdapterWorkload};
use crate::status_reasons::{
    CONDITION_DEPLOYED, CONDITION_RBAC_PROVISIONED, CONDITION_SINK_PROVIDED,
    REASON_BAD_SINK_URI, REASON_FAILED_OWNERS_LIST, REASON_FAILED_RBAC_GET,
    REASON_FAILED_STATUS_UPDATE, REASON_INVALID_SPEC, REASON_RBAC_BOUND, REASON_RBAC_NOT_BOUND,
    REASON_SINK_EMPTY, REASON_SINK_NOT_FOUND, REASON_SINK_RESOLVED,
};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Result of a successful reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Whether the instance ended up `Ready`
    pub ready: bool,
}

/// Conditions `Ready` depends on for an instance.
///
/// `SinkProvided` is only part of the set when the kind requires a sink, or
/// when the instance sets an optional one.
#[must_use]
pub fn condition_set<T: Reconcilable>(obj: &T) -> ConditionSet {
    let wants_sink = match T::SINK {
        SinkSupport::Required => true,
        SinkSupport::Optional => obj.sink().is_some(),
        SinkSupport::Unsupported => false,
    };

    let mut dependents = Vec::with_capacity(3);
    if wants_sink {
        dependents.push(CONDITION_SINK_PROVIDED);
    }
    dependents.push(CONDITION_RBAC_PROVISIONED);
    dependents.push(CONDITION_DEPLOYED);
    ConditionSet::new(dependents)
}

/// Reconciler of the instances of one kind.
pub struct AdapterReconciler<T, B> {
    ctx: Arc<Context>,
    instances: Arc<dyn ObjectApi<T>>,
    builder: B,
}

impl<T, B> AdapterReconciler<T, B>
where
    T: Reconcilable,
    B: AdapterBuilder<T>,
{
    #[must_use]
    pub fn new(ctx: Arc<Context>, instances: Arc<dyn ObjectApi<T>>, builder: B) -> Self {
        Self {
            ctx,
            instances,
            builder,
        }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Reconcile one instance and persist its status.
    ///
    /// A failure is also recorded as a warning event on the instance.
    ///
    /// # Errors
    ///
    /// Returns the first failure of the sequence, or a transient error if
    /// only the status write failed.
    pub async fn reconcile_adapter(&self, obj: &T) -> Result<ReconcileOutcome, ReconcileError> {
        let namespace = obj.namespace().unwrap_or_default();
        let name = obj.name_any();
        debug!(kind = %T::KIND, namespace = %namespace, name = %name, "Reconciling");

        let mut status = StatusUpdater::new(obj, condition_set(obj));
        let result = self.sync(obj, &mut status).await;
        let persisted = status.apply(self.instances.as_ref()).await;

        let result = match (result, persisted) {
            (Ok(()), Ok(_)) => Ok(ReconcileOutcome {
                ready: status.is_ready(),
            }),
            (Ok(()), Err(e)) => Err(ReconcileError::transient(
                REASON_FAILED_STATUS_UPDATE,
                format!("Failed to update status of {} {name:?}: {e}", T::KIND),
            )),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(e)) => {
                warn!(
                    kind = %T::KIND,
                    namespace = %namespace,
                    name = %name,
                    error = %e,
                    "Failed to update status after reconcile failure"
                );
                Err(err)
            }
        };

        if let Err(err) = &result {
            self.ctx
                .events
                .publish(&obj.object_ref(&()), err.event())
                .await;
        }
        result
    }

    async fn sync(&self, obj: &T, status: &mut StatusUpdater) -> Result<(), ReconcileError> {
        let sink = self.sync_sink(obj, status).await?;

        let mut workload = self.builder.build_adapter(obj, sink.as_ref()).map_err(|e| {
            let message = format!("Invalid spec: {e}");
            status.mark_false(CONDITION_DEPLOYED, REASON_INVALID_SPEC, &message);
            ReconcileError::permanent(REASON_INVALID_SPEC, message)
        })?;

        let owners = if obj.wants_own_service_account() {
            service_account_owners(obj, &[])
        } else {
            let namespace = obj.namespace().unwrap_or_default();
            let siblings = self.instances.list(&namespace, "").await.map_err(|e| {
                let message = format!("Failed to list {} instances: {e}", T::KIND);
                status.mark_false(CONDITION_RBAC_PROVISIONED, REASON_RBAC_NOT_BOUND, &message);
                ReconcileError::transient(REASON_FAILED_OWNERS_LIST, message)
            })?;
            service_account_owners(obj, &siblings)
        };

        let service_account = match reconcile_rbac(&self.ctx, obj, owners).await {
            Ok(Some(sa)) => sa,
            Ok(None) => return Ok(()),
            Err(err) => {
                status.mark_false(
                    CONDITION_RBAC_PROVISIONED,
                    REASON_RBAC_NOT_BOUND,
                    &err.event().message,
                );
                return Err(err);
            }
        };
        status.mark_true(CONDITION_RBAC_PROVISIONED, REASON_RBAC_BOUND, "");

        if T::MULTI_TENANT {
            let owner = controller_owner_ref(&service_account).ok_or_else(|| {
                ReconcileError::transient(
                    REASON_FAILED_RBAC_GET,
                    format!("ServiceAccount {:?} has no UID", service_account.name_any()),
                )
            })?;
            workload.set_controller(owner);
        }

        let instance = obj.object_ref(&());
        let selector = label_selector(&identity_labels(obj));
        let applied = match workload {
            Workload::Pool(deployment) => {
                self.apply_workload(&instance, &selector, deployment).await
            }
            Workload::OnDemand(service) => self.apply_workload(&instance, &selector, service).await,
        };
        let (availability, address) = applied.map_err(|err| {
            status.mark_unknown(CONDITION_DEPLOYED, err.reason(), &err.event().message);
            err
        })?;

        let route = T::MULTI_TENANT.then(|| {
            format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
        });
        status.propagate_availability(&availability, address.as_deref(), route.as_deref());
        Ok(())
    }

    /// Resolve the sink and reflect the outcome in `SinkProvided` and
    /// `status.sinkUri`.
    async fn sync_sink(
        &self,
        obj: &T,
        status: &mut StatusUpdater,
    ) -> Result<Option<Url>, ReconcileError> {
        if obj.sink().is_none() {
            status.set_sink_uri(None);
            if T::SINK == SinkSupport::Required {
                status.mark_false(
                    CONDITION_SINK_PROVIDED,
                    REASON_SINK_EMPTY,
                    "The sink has neither a reference nor a URI",
                );
            }
            return Ok(None);
        }

        match resolve_sink(obj, self.ctx.resolver.as_ref()).await {
            Ok(sink) => {
                status.mark_true(CONDITION_SINK_PROVIDED, REASON_SINK_RESOLVED, "");
                status.set_sink_uri(sink.as_ref());
                Ok(sink)
            }
            Err(e) => {
                let message = format!("Could not resolve sink URI: {e}");
                status.mark_false(CONDITION_SINK_PROVIDED, REASON_SINK_NOT_FOUND, &message);
                status.set_sink_uri(None);
                Err(if e.is_permanent() {
                    ReconcileError::permanent(REASON_BAD_SINK_URI, message)
                } else {
                    ReconcileError::transient(REASON_BAD_SINK_URI, message)
                })
            }
        }
    }

    async fn apply_workload<W: AdapterWorkload>(
        &self,
        instance: &ObjectReference,
        selector: &str,
        desired: W,
    ) -> Result<(Availability, Option<String>), ReconcileError> {
        let current = reconcile_workload(&self.ctx, T::KIND, instance, selector, desired).await?;

        let mut availability = current.availability();
        if let Some(pods) = current.pod_selector() {
            let namespace = instance.namespace.as_deref().unwrap_or_default();
            availability =
                explain_unavailability(&self.ctx, namespace, &pods, availability).await;
        }
        Ok((availability, current.address()))
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
