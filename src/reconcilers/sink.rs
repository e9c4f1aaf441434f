// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resolution of an instance's sink to a URL.

use crate::api::AddressResolver;
use crate::crd::{Destination, KReference};
use crate::errors::is_not_found;
use crate::reconcilers::reconcilable::Reconcilable;
use kube::ResourceExt;
use tracing::debug;
use url::Url;

/// Failure to resolve a sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The destination sets neither `ref` nor `uri`.
    #[error("destination must set either ref or uri")]
    Empty,

    /// The referenced object does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// The referenced object does not expose an address yet.
    #[error("{kind} {namespace}/{name} does not expose an address")]
    NotAddressable {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("invalid URI {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Any other failure of the lookup.
    #[error("failed to look up {kind} {namespace}/{name}: {source}")]
    Lookup {
        kind: String,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
}

impl SinkError {
    /// Whether retrying can not fix the error without a change of the instance.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Empty | Self::NotFound { .. } | Self::InvalidUri { .. }
        )
    }
}

/// Resolve the sink of `obj`.
///
/// Returns `Ok(None)` when the instance has no sink.
///
/// # Errors
///
/// Returns a [`SinkError`] when the destination can not be turned into a URL.
pub async fn resolve_sink<T: Reconcilable>(
    obj: &T,
    resolver: &dyn AddressResolver,
) -> Result<Option<Url>, SinkError> {
    match obj.sink() {
        Some(destination) => {
            let namespace = obj.namespace().unwrap_or_default();
            resolve_destination(destination, &namespace, resolver)
                .await
                .map(Some)
        }
        None => Ok(None),
    }
}

/// Resolve a destination to a URL.
///
/// References default to `namespace`. A `uri` set next to a `ref` is resolved
/// relative to the address of the referenced object; a `uri` alone must be
/// absolute.
///
/// # Errors
///
/// Returns a [`SinkError`] when the destination can not be turned into a URL.
pub async fn resolve_destination(
    destination: &Destination,
    namespace: &str,
    resolver: &dyn AddressResolver,
) -> Result<Url, SinkError> {
    match (&destination.r#ref, destination.uri.as_deref()) {
        (Some(reference), uri) => {
            let base = resolve_reference(reference, namespace, resolver).await?;
            match uri.filter(|u| !u.is_empty()) {
                Some(uri) => base.join(uri).map_err(|e| SinkError::InvalidUri {
                    uri: uri.to_string(),
                    reason: e.to_string(),
                }),
                None => Ok(base),
            }
        }
        (None, Some(uri)) if !uri.is_empty() => {
            Url::parse(uri).map_err(|e| SinkError::InvalidUri {
                uri: uri.to_string(),
                reason: e.to_string(),
            })
        }
        (None, _) => Err(SinkError::Empty),
    }
}

async fn resolve_reference(
    reference: &KReference,
    default_namespace: &str,
    resolver: &dyn AddressResolver,
) -> Result<Url, SinkError> {
    let namespace = reference
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .unwrap_or(default_namespace);

    let address = resolver
        .address_of(namespace, reference)
        .await
        .map_err(|source| {
            if is_not_found(&source) {
                SinkError::NotFound {
                    kind: reference.kind.clone(),
                    namespace: namespace.to_string(),
                    name: reference.name.clone(),
                }
            } else {
                SinkError::Lookup {
                    kind: reference.kind.clone(),
                    namespace: namespace.to_string(),
                    name: reference.name.clone(),
                    source,
                }
            }
        })?;

    let Some(address) = address else {
        return Err(SinkError::NotAddressable {
            kind: reference.kind.clone(),
            namespace: namespace.to_string(),
            name: reference.name.clone(),
        });
    };

    debug!(
        kind = %reference.kind,
        namespace = %namespace,
        name = %reference.name,
        address = %address,
        "Resolved sink reference"
    );

    Url::parse(&address).map_err(|e| SinkError::InvalidUri {
        uri: address.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod sink_tests;
