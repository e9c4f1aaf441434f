// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of adapter-backed resources.
//!
//! Every resource kind managed by Switchyard is reconciled by the same
//! engine, instantiated once per kind. A kind only describes itself through
//! [`Reconcilable`] and supplies an [`AdapterBuilder`]; the engine takes care
//! of everything else.
//!
//! # Reconciliation Architecture
//!
//! Switchyard follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Monitor instances, their adapters and their identities
//! 2. **Reconcile** - Compare the desired adapter with the observed one
//! 3. **Update** - Create or replace what differs, never delete
//! 4. **Status** - Report the outcome through the instance's conditions
//!
//! # Building Blocks
//!
//! - [`engine`] - The per-instance sequence ([`AdapterReconciler`])
//! - [`adapter`] - Naming, labels and the shared adapter template
//! - [`sink`] - Resolution of sinks to URLs
//! - [`rbac`] - `ServiceAccount` and `RoleBindings` of adapters
//! - [`workload`] - Create-or-update of `Deployments` and Knative `Services`
//! - [`pods`] - Why an adapter `Deployment` is unavailable
//! - [`semantic`] - Comparison of desired and observed objects
//! - [`ownership`] - Owner references and their merging
//! - [`conditions`] / [`status`] - Conditions and status writes
//! - [`retry`] - Backoff of transient failures
//!
//! # Example: Reconciling an Instance
//!
//! ```rust,no_run
//! use switchyard::adapters::WebhookSourceAdapter;
//! use switchyard::context::Context;
//! use switchyard::crd::WebhookSource;
//! use switchyard::reconcilers::AdapterReconciler;
//! use std::sync::Arc;
//!
//! async fn reconcile(
//!     reconciler: &AdapterReconciler<WebhookSource, WebhookSourceAdapter>,
//!     source: WebhookSource,
//! ) -> anyhow::Result<bool> {
//!     let outcome = reconciler.reconcile_adapter(&source).await?;
//!     Ok(outcome.ready)
//! }
//! ```

pub mod adapter;
pub mod conditions;
pub mod engine;
pub mod ownership;
pub mod pods;
pub mod rbac;
pub mod reconcilable;
pub mod retry;
pub mod semantic;
pub mod sink;
pub mod status;
pub mod workload;

#[cfg(test)]
pub mod testing;

pub use engine::{condition_set, AdapterReconciler, ReconcileOutcome};
pub use reconcilable::{AdapterBuilder, BuildError, Reconcilable, SinkSupport};
