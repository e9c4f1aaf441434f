// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers and the adapter condition set.
//!
//! # Condition Format
//!
//! Kubernetes conditions follow a standard format:
//! - `type`: The aspect of the resource being reported (e.g., "Ready", "Deployed")
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (`CamelCase`)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the condition changed
//!
//! # Ready Aggregation
//!
//! [`ConditionSet`] owns the list of conditions `Ready` depends on. Conditions
//! are only changed through its `mark_*` functions, each of which recomputes
//! `Ready` before returning:
//!
//! - all dependents `True` ⇒ `Ready=True`
//! - any dependent `False` ⇒ `Ready=False` with the reason and message of the
//!   first `False` dependent
//! - otherwise ⇒ `Ready=Unknown` with the reason and message of the first
//!   `Unknown` dependent
//!
//! A dependent that is missing from the list counts as `Unknown`.

use crate::crd::Condition;
use crate::status_reasons::{
    CONDITION_READY, REASON_ALL_READY, REASON_INITIALIZING, STATUS_FALSE, STATUS_TRUE,
    STATUS_UNKNOWN,
};
use chrono::Utc;

/// Create a new Kubernetes condition with the current timestamp.
///
/// # Example
///
/// ```rust
/// # use switchyard::reconcilers::conditions::create_condition;
/// let condition = create_condition(
///     "Deployed",
///     "True",
///     "AdapterAvailable",
///     "The adapter is available"
/// );
/// assert_eq!(condition.r#type, "Deployed");
/// assert_eq!(condition.status, "True");
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in a mutable conditions list (in-memory, no API call).
///
/// Preserves the `lastTransitionTime` if the status hasn't changed, or sets a
/// new timestamp if it has.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Compare two condition lists to check if they are semantically equal.
///
/// Ignores `lastTransitionTime` and ordering; only compares type, status,
/// reason and message.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    new.iter().all(|new_cond| {
        find_condition(current, &new_cond.r#type).is_some_and(|curr_cond| {
            curr_cond.status == new_cond.status
                && curr_cond.reason == new_cond.reason
                && curr_cond.message == new_cond.message
        })
    })
}

/// Whether the condition of the given type is `True`.
#[must_use]
pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_condition(conditions, condition_type).is_some_and(|c| c.status == STATUS_TRUE)
}

/// The conditions an instance's `Ready` condition is derived from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionSet {
    dependents: Vec<&'static str>,
}

impl ConditionSet {
    #[must_use]
    pub fn new(dependents: Vec<&'static str>) -> Self {
        Self { dependents }
    }

    #[must_use]
    pub fn dependents(&self) -> &[&'static str] {
        &self.dependents
    }

    /// Whether `condition_type` is part of this set (`Ready` included).
    #[must_use]
    pub fn contains(&self, condition_type: &str) -> bool {
        condition_type == CONDITION_READY || self.dependents.contains(&condition_type)
    }

    /// Ensure every condition of the set exists and drop conditions that no
    /// longer belong to it.
    ///
    /// Missing conditions are added as `Unknown`.
    pub fn initialize(&self, conditions: &mut Vec<Condition>) {
        conditions.retain(|c| self.contains(&c.r#type));
        for condition_type in std::iter::once(CONDITION_READY).chain(self.dependents.iter().copied())
        {
            if find_condition(conditions, condition_type).is_none() {
                conditions.push(create_condition(
                    condition_type,
                    STATUS_UNKNOWN,
                    REASON_INITIALIZING,
                    "",
                ));
            }
        }
        self.recompute_ready(conditions);
    }

    pub fn mark_true(
        &self,
        conditions: &mut Vec<Condition>,
        condition_type: &str,
        reason: &str,
        message: &str,
    ) {
        self.mark(conditions, condition_type, STATUS_TRUE, reason, message);
    }

    pub fn mark_false(
        &self,
        conditions: &mut Vec<Condition>,
        condition_type: &str,
        reason: &str,
        message: &str,
    ) {
        self.mark(conditions, condition_type, STATUS_FALSE, reason, message);
    }

    pub fn mark_unknown(
        &self,
        conditions: &mut Vec<Condition>,
        condition_type: &str,
        reason: &str,
        message: &str,
    ) {
        self.mark(conditions, condition_type, STATUS_UNKNOWN, reason, message);
    }

    fn mark(
        &self,
        conditions: &mut Vec<Condition>,
        condition_type: &str,
        status: &str,
        reason: &str,
        message: &str,
    ) {
        update_condition_in_memory(conditions, condition_type, status, reason, message);
        self.recompute_ready(conditions);
    }

    /// Derive `Ready` from the dependent conditions.
    pub fn recompute_ready(&self, conditions: &mut Vec<Condition>) {
        let mut first_unknown: Option<(String, String)> = None;

        for condition_type in &self.dependents {
            match find_condition(conditions, condition_type) {
                Some(c) if c.status == STATUS_TRUE => {}
                Some(c) if c.status == STATUS_FALSE => {
                    let reason = c.reason.clone().unwrap_or_default();
                    let message = c.message.clone().unwrap_or_default();
                    update_condition_in_memory(
                        conditions,
                        CONDITION_READY,
                        STATUS_FALSE,
                        &reason,
                        &message,
                    );
                    return;
                }
                other => {
                    if first_unknown.is_none() {
                        first_unknown = Some(other.map_or_else(
                            || (REASON_INITIALIZING.to_string(), String::new()),
                            |c| {
                                (
                                    c.reason.clone().unwrap_or_default(),
                                    c.message.clone().unwrap_or_default(),
                                )
                            },
                        ));
                    }
                }
            }
        }

        match first_unknown {
            Some((reason, message)) => update_condition_in_memory(
                conditions,
                CONDITION_READY,
                STATUS_UNKNOWN,
                &reason,
                &message,
            ),
            None => {
                update_condition_in_memory(
                    conditions,
                    CONDITION_READY,
                    STATUS_TRUE,
                    REASON_ALL_READY,
                    "",
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "conditions_tests.rs"]
mod conditions_tests;
