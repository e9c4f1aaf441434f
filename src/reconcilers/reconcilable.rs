// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Capabilities a resource kind must provide to be reconciled by the adapter engine.
//!
//! A kind implements [`Reconcilable`] once, and supplies an [`AdapterBuilder`]
//! that turns an instance into the desired adapter workload. The engine is
//! generic over both and instantiated once per kind.

use crate::crd::{AdapterOverrides, AdapterStatus, CloudEventAttributes, Destination};
use crate::reconcilers::adapter::Workload;
use kube::core::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use url::Url;

/// Whether a kind sends events to a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkSupport {
    /// The kind never sends events.
    Unsupported,
    /// Events (e.g. replies) are sent only when a sink is set.
    Optional,
    /// The kind cannot work without a sink.
    Required,
}

/// A user-declared resource whose behavior is carried out by an adapter workload.
pub trait Reconcilable:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
    /// Kind name, used for naming, labels, logs and metrics
    const KIND: &'static str;

    /// Instances of a multi-tenant kind share one adapter per namespace
    const MULTI_TENANT: bool = false;

    /// Whether instances send events to a sink
    const SINK: SinkSupport;

    /// Destination of the events sent by this instance.
    fn sink(&self) -> Option<&Destination>;

    /// Status last persisted for this instance.
    fn adapter_status(&self) -> Option<&AdapterStatus>;

    fn adapter_overrides(&self) -> Option<&AdapterOverrides> {
        None
    }

    /// Attributes of the events this instance emits (event sources).
    fn emitted_event_types(&self) -> Vec<CloudEventAttributes> {
        Vec::new()
    }

    /// Types of the events this instance accepts (event receivers).
    fn accepted_event_types(&self) -> Vec<String> {
        Vec::new()
    }

    /// Run the adapter under a `ServiceAccount` private to this instance
    /// instead of the one shared by all instances of the kind.
    fn wants_own_service_account(&self) -> bool {
        false
    }
}

/// The desired state of an adapter could not be generated from an instance.
///
/// This is a permanent failure: only a change of the instance can fix it.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("spec.{0} must not be empty")]
    MissingField(&'static str),

    #[error("{0} has no UID")]
    MissingUid(String),

    #[error("{0}")]
    Invalid(String),
}

/// Maps an instance to its desired adapter workload.
///
/// Implementations are pure: no I/O, and the same input always yields the
/// same workload. The workload must carry the identity labels returned by
/// [`crate::reconcilers::adapter::common_labels`] so that it can be found
/// again regardless of its name.
pub trait AdapterBuilder<T: Reconcilable>: Send + Sync + 'static {
    /// # Errors
    ///
    /// Returns a [`BuildError`] when the instance's spec can not be turned
    /// into a valid workload.
    fn build_adapter(&self, obj: &T, sink: Option<&Url>) -> Result<Workload, BuildError>;
}
