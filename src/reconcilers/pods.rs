// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Failure details of adapter pods.
//!
//! A `Deployment` only says that it lacks available replicas. When that
//! happens, the pods it selects usually tell why: a container waiting in
//! `CrashLoopBackOff`, an image that can not be pulled, a missing `Secret`.
//! The first such waiting state is surfaced on the `Deployed` condition.

use crate::context::Context;
use crate::reconcilers::status::Availability;
use crate::status_reasons::{REASON_APP_RUNTIME_FAILURE, REASON_BAD_CONTAINER_IMAGE};
use k8s_openapi::api::core::v1::{ContainerStateWaiting, Pod};
use tracing::warn;

/// Prefix of reasons naming a missing resource, e.g. `MissingSecret`
const REASON_MISSING_PREFIX: &str = "Missing";

const RUNTIME_ERROR_REASONS: &[&str] = &[
    "CrashLoopBackOff",
    "RunContainerError",
    "RunInitContainerError",
    "CreatePodSandboxError",
    "ConfigPodSandboxError",
    "VerifyNonRootError",
];

const IMAGE_PULL_ERROR_REASONS: &[&str] = &[
    "ImagePullBackOff",
    "ImageInspectError",
    "ErrImagePull",
    "ErrImageNeverPull",
    "RegistryUnavailable",
    "InvalidImageName",
];

const RESOURCE_MISSING_ERROR_REASONS: &[&str] =
    &["CreateContainerConfigError", "CreateContainerError"];

/// Maximum length of a Kubernetes object name
const MAX_RESOURCE_NAME_LENGTH: usize = 253;

/// Waiting state of the first container of a pod that is neither running nor
/// completed.
#[must_use]
pub fn waiting_state(pods: &[Pod]) -> Option<&ContainerStateWaiting> {
    pods.iter()
        .filter_map(|p| p.status.as_ref())
        .filter(|s| !matches!(s.phase.as_deref(), Some("Running" | "Succeeded")))
        .flat_map(|s| s.container_statuses.iter().flatten())
        .find_map(|c| c.state.as_ref().and_then(|s| s.waiting.as_ref()))
}

/// CamelCase reason describing a container failure more precisely than the
/// kubelet does, or `reason` itself.
#[must_use]
pub fn exact_reason(reason: &str, message: &str) -> String {
    if RUNTIME_ERROR_REASONS.contains(&reason) {
        return REASON_APP_RUNTIME_FAILURE.to_string();
    }
    if IMAGE_PULL_ERROR_REASONS.contains(&reason) {
        return REASON_BAD_CONTAINER_IMAGE.to_string();
    }
    if RESOURCE_MISSING_ERROR_REASONS.contains(&reason) {
        if let Some(kind) = missing_resource_kind(message) {
            return format!("{REASON_MISSING_PREFIX}{kind}");
        }
    }
    reason.to_string()
}

/// Kind of resource named in a standard API "not found" message, e.g.
/// `Secret` in `couldn't find key: secret "token" not found`.
fn missing_resource_kind(message: &str) -> Option<String> {
    let message = message.strip_suffix('.').unwrap_or(message);
    let head = message.strip_suffix("\" not found")?;

    let open = head.rfind('"')?;
    if open == 0 || head.len() - open + 1 > MAX_RESOURCE_NAME_LENGTH {
        return None;
    }
    let before = head[..open].strip_suffix(' ')?;

    let word_len: usize = before
        .chars()
        .rev()
        .take_while(|c| c.is_alphabetic())
        .map(char::len_utf8)
        .sum();
    let word = &before[before.len() - word_len..];

    let mut chars = word.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

/// Refine an unavailable availability with the waiting state of a pod.
#[must_use]
pub fn with_waiting_state(
    availability: Availability,
    waiting: Option<&ContainerStateWaiting>,
) -> Availability {
    match (availability, waiting) {
        (Availability::Unavailable { reason, mut message }, Some(waiting)) => {
            let waiting_reason = waiting.reason.as_deref().unwrap_or_default();
            let waiting_message = waiting.message.as_deref().unwrap_or_default();

            let reason = if waiting_reason.is_empty() {
                reason
            } else {
                exact_reason(waiting_reason, waiting_message)
            };
            if !waiting_message.is_empty() {
                message.push_str(": ");
                message.push_str(waiting_message);
            }
            Availability::Unavailable { reason, message }
        }
        (availability, _) => availability,
    }
}

/// Look at the pods matching `selector` to explain an unavailable workload.
///
/// A failed lookup leaves `availability` as it is.
pub async fn explain_unavailability(
    ctx: &Context,
    namespace: &str,
    selector: &str,
    availability: Availability,
) -> Availability {
    if !matches!(availability, Availability::Unavailable { .. }) {
        return availability;
    }

    match ctx.pods.list(namespace, selector).await {
        Ok(pods) => with_waiting_state(availability, waiting_state(&pods)),
        Err(e) => {
            warn!(
                namespace = %namespace,
                selector = %selector,
                error = %e,
                "Unable to look up the statuses of adapter pods"
            );
            availability
        }
    }
}

#[cfg(test)]
#[path = "pods_tests.rs"]
mod pods_tests;
