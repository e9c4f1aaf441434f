// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Semantic comparison of desired and observed objects.
//!
//! The API server fills in defaults (image pull policy, revision history,
//! probes, ...) that a freshly built desired object never contains, so a
//! field-by-field comparison would report a difference on every reconcile.
//! Instead, the desired object is compared with the observed one as a
//! *derivative*: every field set in the desired object must match, fields left
//! at their zero value are ignored.
//!
//! Two exceptions keep removals from going unnoticed:
//!
//! - Environment variables are matched by name and value strictly, so a
//!   variable removed from the desired list, or emptied, is a difference.
//! - The Knative visibility label is compared strictly, so making a service
//!   public again (removing the label) is a difference.

use crate::labels::KNATIVE_VISIBILITY_LABEL;
use crate::reconcilers::ownership::owner_references_equal;
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::Resource;
use serde::Serialize;
use serde_json::Value;

/// Whether `desired` is a derivative of `current`.
#[must_use]
pub fn is_derivative(desired: &Value, current: &Value) -> bool {
    derivative(desired, current, None)
}

fn derivative(desired: &Value, current: &Value, field: Option<&str>) -> bool {
    match desired {
        Value::Null => true,
        Value::String(s) if s.is_empty() => true,
        Value::Number(n) if n.as_i64() == Some(0) => true,
        Value::Bool(false) if current.is_null() => true,
        Value::Array(a) if a.is_empty() => true,
        Value::Object(o) if o.is_empty() && field != Some("labels") => true,
        Value::Array(a) if field == Some("env") => env_derivative(a, current),
        Value::Array(a) => match current {
            Value::Array(b) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| derivative(x, y, None))
            }
            _ => false,
        },
        Value::Object(o) => {
            let Value::Object(b) = current else {
                return false;
            };
            if field == Some("labels")
                && o.get(KNATIVE_VISIBILITY_LABEL) != b.get(KNATIVE_VISIBILITY_LABEL)
            {
                return false;
            }
            o.iter().all(|(key, value)| {
                let current = b.get(key).unwrap_or(&Value::Null);
                derivative(value, current, Some(key))
            })
        }
        _ => desired == current,
    }
}

/// Environment variables: same names and literal values in the same order;
/// `valueFrom` compared as a derivative.
fn env_derivative(desired: &[Value], current: &Value) -> bool {
    let Value::Array(current) = current else {
        return false;
    };
    if desired.len() != current.len() {
        return false;
    }

    let text = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).unwrap_or("").to_string();

    desired.iter().zip(current).all(|(a, b)| {
        text(a, "name") == text(b, "name")
            && text(a, "value") == text(b, "value")
            && derivative(
                a.get("valueFrom").unwrap_or(&Value::Null),
                b.get("valueFrom").unwrap_or(&Value::Null),
                None,
            )
    })
}

/// Whether the `metadata` and `spec` of a desired workload are a derivative
/// of the observed workload. Status is ignored.
#[must_use]
pub fn workload_equal<K: Serialize>(desired: &K, current: &K) -> bool {
    let (Ok(desired), Ok(current)) = (serde_json::to_value(desired), serde_json::to_value(current))
    else {
        return false;
    };

    ["metadata", "spec"].into_iter().all(|section| {
        derivative(
            desired.get(section).unwrap_or(&Value::Null),
            current.get(section).unwrap_or(&Value::Null),
            None,
        )
    })
}

/// Whether an observed `ServiceAccount` has the desired owners and labels.
#[must_use]
pub fn service_account_equal(desired: &ServiceAccount, current: &ServiceAccount) -> bool {
    let owners = |sa: &ServiceAccount| sa.meta().owner_references.clone().unwrap_or_default();
    if !owner_references_equal(&owners(desired), &owners(current)) {
        return false;
    }

    let labels = |sa: &ServiceAccount| {
        serde_json::to_value(sa.meta().labels.clone().unwrap_or_default()).unwrap_or_default()
    };
    derivative(&labels(desired), &labels(current), Some("labels"))
}

#[cfg(test)]
#[path = "semantic_tests.rs"]
mod semantic_tests;
