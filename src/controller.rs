// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! kube-runtime wiring of the adapter engine.
//!
//! [`run_adapter_controller`] runs one controller per kind. Besides the
//! instances themselves, it watches the objects the engine creates for them
//! (adapter workloads and `ServiceAccounts`, selected by their common labels)
//! so that drift is corrected as soon as it happens.
//!
//! A child owned by instances triggers those instances. A shared child that
//! no instance owns, such as the workload of a multi-tenant kind, triggers
//! every instance of the kind in its namespace.

use crate::api::{KubeObjectApi, ObjectApi};
use crate::config::OperatorConfig;
use crate::constants::{REQUEUE_WHEN_NOT_READY_SECS, REQUEUE_WHEN_READY_SECS};
use crate::context::Context;
use crate::errors::ReconcileError;
use crate::knative::KnService;
use crate::metrics;
use crate::reconcilers::adapter::{common_labels, label_selector};
use crate::reconcilers::{AdapterBuilder, AdapterReconciler, Reconcilable};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::runtime::controller::{self, Action};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::runtime::{watcher, Controller};
use kube::{Api, Client, Resource, ResourceExt};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Key identifying an instance in logs and in the backoff tracker.
#[must_use]
pub fn object_key<T: Reconcilable>(obj: &T) -> String {
    instance_key::<T>(obj.namespace().as_deref(), &obj.name_any())
}

fn instance_key<T: Reconcilable>(namespace: Option<&str>, name: &str) -> String {
    format!("{}/{}/{name}", T::KIND, namespace.unwrap_or_default())
}

/// Drop the retry state of an instance that no longer exists.
pub fn forget_instance<T: Reconcilable>(ctx: &Context, namespace: Option<&str>, name: &str) {
    let key = instance_key::<T>(namespace, name);
    if ctx.backoff.attempts(&key) > 0 {
        debug!(key = %key, "Instance gone, dropping its backoff");
    }
    ctx.backoff.reset(&key);
}

/// Delay before a successfully reconciled instance is looked at again.
#[must_use]
pub fn requeue_delay(ready: bool) -> Duration {
    if ready {
        Duration::from_secs(REQUEUE_WHEN_READY_SECS)
    } else {
        Duration::from_secs(REQUEUE_WHEN_NOT_READY_SECS)
    }
}

/// Instances to reconcile after a change of `child`.
///
/// `instances` is the current cache of instances of the kind.
#[must_use]
pub fn affected_instances<T, W>(child: &W, instances: &[Arc<T>]) -> Vec<ObjectRef<T>>
where
    T: Reconcilable,
    W: Resource,
{
    let namespace = child.meta().namespace.clone();
    let api_version = T::api_version(&());

    let owners: Vec<ObjectRef<T>> = child
        .owner_references()
        .iter()
        .filter(|o| o.kind == T::KIND && o.api_version == api_version)
        .map(|o| {
            let reference = ObjectRef::new(&o.name);
            match namespace.as_deref() {
                Some(ns) => reference.within(ns),
                None => reference,
            }
        })
        .collect();
    if !owners.is_empty() {
        return owners;
    }

    instances
        .iter()
        .filter(|i| i.meta().namespace == namespace)
        .map(|i| ObjectRef::from_obj(i.as_ref()))
        .collect()
}

fn fan_out<T, W>(store: Store<T>) -> impl Fn(W) -> Vec<ObjectRef<T>> + Send + Sync + 'static
where
    T: Reconcilable,
    W: Resource,
{
    move |child: W| affected_instances(&child, &store.state())
}

/// Run the controller of kind `T` until a termination signal is received.
///
/// # Errors
///
/// This function does not fail once started; the `Result` leaves room for
/// setup failures of the caller.
pub async fn run_adapter_controller<T, B>(
    client: Client,
    ctx: Arc<Context>,
    builder: B,
    config: &OperatorConfig,
) -> anyhow::Result<()>
where
    T: Reconcilable,
    B: AdapterBuilder<T>,
{
    info!(kind = %T::KIND, concurrency = config.concurrency, "Starting controller");

    let instances: Arc<dyn ObjectApi<T>> =
        Arc::new(KubeObjectApi::new(client.clone(), &config.field_manager));
    let reconciler = Arc::new(AdapterReconciler::new(ctx.clone(), instances, builder));

    let children =
        watcher::Config::default().labels(&label_selector(&common_labels(T::KIND)));

    let controller = Controller::new(Api::<T>::all(client.clone()), watcher::Config::default());
    let store = controller.store();

    controller
        .watches(
            Api::<ServiceAccount>::all(client.clone()),
            children.clone(),
            fan_out::<T, ServiceAccount>(store.clone()),
        )
        .watches(
            Api::<Deployment>::all(client.clone()),
            children.clone(),
            fan_out::<T, Deployment>(store.clone()),
        )
        .watches(
            Api::<KnService>::all(client),
            children,
            fan_out::<T, KnService>(store),
        )
        .with_config(controller::Config::default().concurrency(config.concurrency))
        .shutdown_on_signal()
        .run(reconcile::<T, B>, error_policy::<T, B>, reconciler)
        .for_each(|result| {
            match result {
                Ok((obj, _)) => debug!(kind = %T::KIND, object = %obj, "Reconciled"),
                // Deleted before its queued reconcile ran
                Err(controller::Error::ObjectNotFound(obj)) => {
                    forget_instance::<T>(&ctx, obj.namespace.as_deref(), &obj.name);
                }
                Err(e) => warn!(kind = %T::KIND, error = %e, "Controller error"),
            }
            futures::future::ready(())
        })
        .await;

    info!(kind = %T::KIND, "Controller stopped");
    Ok(())
}

/// Run the metrics server next to the controllers until the controllers stop.
///
/// Controllers return once they have drained after a termination signal,
/// which is a clean exit. The server is not expected to return at all.
///
/// # Errors
///
/// Returns the error of a failed controller, or an error if the server
/// exits first.
pub async fn supervise<S, C>(server: S, controllers: C) -> anyhow::Result<()>
where
    S: Future<Output = anyhow::Result<()>>,
    C: Future<Output = anyhow::Result<()>>,
{
    tokio::select! {
        result = server => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        result = controllers => {
            if let Err(e) = &result {
                error!("CRITICAL: controller failed: {:?}", e);
            }
            result?;
            info!("All controllers stopped, shutting down");
            Ok(())
        }
    }
}

async fn reconcile<T, B>(
    obj: Arc<T>,
    reconciler: Arc<AdapterReconciler<T, B>>,
) -> Result<Action, ReconcileError>
where
    T: Reconcilable,
    B: AdapterBuilder<T>,
{
    let start = Instant::now();
    let key = object_key(obj.as_ref());

    match reconciler.reconcile_adapter(&obj).await {
        Ok(outcome) => {
            reconciler.context().backoff.reset(&key);
            metrics::record_reconciliation_success(T::KIND, start.elapsed());

            let delay = requeue_delay(outcome.ready);
            debug!(
                key = %key,
                ready = outcome.ready,
                requeue_secs = delay.as_secs(),
                "Reconciled instance"
            );
            Ok(Action::requeue(delay))
        }
        Err(err) => {
            metrics::record_reconciliation_error(T::KIND, start.elapsed());
            metrics::record_error(T::KIND, err.reason(), err.is_permanent());
            Err(err)
        }
    }
}

/// Permanent failures wait for the instance to change; transient ones are
/// retried with a per-key exponential backoff. Instances being deleted are
/// not retried.
fn error_policy<T, B>(
    obj: Arc<T>,
    err: &ReconcileError,
    reconciler: Arc<AdapterReconciler<T, B>>,
) -> Action
where
    T: Reconcilable,
    B: AdapterBuilder<T>,
{
    let key = object_key(obj.as_ref());

    if obj.meta().deletion_timestamp.is_some() {
        debug!(key = %key, error = %err, "Instance is being deleted, not retrying");
        reconciler.context().backoff.reset(&key);
        return Action::await_change();
    }

    if err.is_permanent() {
        warn!(key = %key, reason = %err.reason(), error = %err, "Reconcile failed permanently");
        return Action::await_change();
    }

    let delay = reconciler.context().backoff.next_delay(&key);
    metrics::record_reconciliation_requeue(T::KIND, err.reason());
    warn!(
        key = %key,
        reason = %err.reason(),
        error = %err,
        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        "Reconcile failed, retrying"
    );
    Action::requeue(delay)
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
