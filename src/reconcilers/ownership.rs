// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Owner references of the objects created by the engine.
//!
//! A `ServiceAccount` shared by all instances of a kind is owned, without a
//! controller, by every live instance. Garbage collection deletes it once the
//! last owner is gone. The owner list is recomputed from scratch on every
//! reconcile so that it never depends on who reconciled last.

use crate::reconcilers::reconcilable::Reconcilable;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;

/// Controlling owner reference to `obj`. `None` if `obj` has no UID yet.
#[must_use]
pub fn controller_owner_ref<K: Resource<DynamicType = ()>>(obj: &K) -> Option<OwnerReference> {
    obj.controller_owner_ref(&())
}

/// Non-controlling owner reference to `obj`. `None` if `obj` has no UID yet.
#[must_use]
pub fn owner_ref<K: Resource<DynamicType = ()>>(obj: &K) -> Option<OwnerReference> {
    let mut reference = obj.owner_ref(&())?;
    reference.controller = Some(false);
    reference.block_owner_deletion = Some(false);
    Some(reference)
}

/// UID of the controlling owner of an object.
#[must_use]
pub fn controller_uid(meta: &ObjectMeta) -> Option<&str> {
    meta.owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|o| o.controller == Some(true))
        .map(|o| o.uid.as_str())
}

/// Owner references of the `ServiceAccount` used by `obj`'s adapter.
///
/// Kinds with a private identity yield `obj` alone. Otherwise the result is
/// `obj` merged with its `siblings` (every instance of the kind in the
/// namespace), minus the instances being deleted, sorted by UID.
#[must_use]
pub fn service_account_owners<T: Reconcilable>(obj: &T, siblings: &[T]) -> Vec<OwnerReference> {
    if obj.wants_own_service_account() {
        return owner_ref(obj).into_iter().collect();
    }

    let live = std::iter::once(obj)
        .chain(siblings.iter())
        .filter(|o| o.meta().deletion_timestamp.is_none())
        .filter_map(owner_ref);

    merge_owners(Vec::new(), live, &[])
}

/// Union of `current` and `added` by UID, without the owners in `removed`,
/// sorted by UID.
///
/// The first reference seen for a UID wins.
#[must_use]
pub fn merge_owners(
    current: Vec<OwnerReference>,
    added: impl IntoIterator<Item = OwnerReference>,
    removed: &[String],
) -> Vec<OwnerReference> {
    let mut merged: Vec<OwnerReference> = Vec::new();
    for reference in current.into_iter().chain(added) {
        if removed.contains(&reference.uid) || merged.iter().any(|o| o.uid == reference.uid) {
            continue;
        }
        merged.push(reference);
    }
    merged.sort_by(|a, b| a.uid.cmp(&b.uid));
    merged
}

/// Whether two owner reference lists designate the same owners with the
/// same flags, regardless of order.
#[must_use]
pub fn owner_references_equal(a: &[OwnerReference], b: &[OwnerReference]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(|x, y| x.uid.cmp(&y.uid));
    b.sort_by(|x, y| x.uid.cmp(&y.uid));
    a == b
}

#[cfg(test)]
#[path = "ownership_tests.rs"]
mod ownership_tests;
