// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation error types.
//!
//! Every error returned by the adapter engine carries the event it should be
//! reported as, and whether retrying can possibly help. Permanent errors stop
//! the retry loop until the object changes; transient errors are retried with
//! exponential backoff.

use kube::runtime::events::EventType;
use std::fmt;

/// An event to be recorded against a reconciled object.
#[derive(Clone, Debug)]
pub struct ReconcileEvent {
    pub type_: EventType,
    /// Stable, `CamelCase` reason code.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
}

impl ReconcileEvent {
    #[must_use]
    pub fn normal(reason: &str, message: impl Into<String>) -> Self {
        Self {
            type_: EventType::Normal,
            reason: reason.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(reason: &str, message: impl Into<String>) -> Self {
        Self {
            type_: EventType::Warning,
            reason: reason.to_string(),
            message: message.into(),
        }
    }

    /// Whether this is a warning event.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self.type_, EventType::Warning)
    }
}

impl fmt::Display for ReconcileEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

/// Failure of a single reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Will not resolve until the object's spec changes. Not retried.
    #[error("permanent error: {0}")]
    Permanent(ReconcileEvent),

    /// Expected to resolve on its own. Retried with backoff.
    #[error("{0}")]
    Transient(ReconcileEvent),
}

impl ReconcileError {
    /// Permanent error reported as a warning event.
    #[must_use]
    pub fn permanent(reason: &str, message: impl Into<String>) -> Self {
        Self::Permanent(ReconcileEvent::warning(reason, message))
    }

    /// Transient error reported as a warning event.
    #[must_use]
    pub fn transient(reason: &str, message: impl Into<String>) -> Self {
        Self::Transient(ReconcileEvent::warning(reason, message))
    }

    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    #[must_use]
    pub fn event(&self) -> &ReconcileEvent {
        match self {
            Self::Permanent(event) | Self::Transient(event) => event,
        }
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.event().reason
    }
}

/// HTTP status code of an API error, if the error came from the API server.
#[must_use]
pub fn api_error_code(err: &kube::Error) -> Option<u16> {
    match err {
        kube::Error::Api(response) => Some(response.code),
        _ => None,
    }
}

/// The requested object does not exist.
#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    api_error_code(err) == Some(404)
}

/// A create was rejected because an object with the same name exists.
#[must_use]
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 409 && response.reason == "AlreadyExists")
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
