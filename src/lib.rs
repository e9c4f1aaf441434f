// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Switchyard - adapter reconciliation for event-integration components
//!
//! Switchyard turns custom resources describing event sources, targets and
//! routing components into running receive adapters. Each kind declares its
//! adapter once; a shared engine takes care of everything else.
//!
//! ## Overview
//!
//! For every instance, the engine:
//!
//! - resolves the event sink into a URI
//! - grants the adapter an identity (`ServiceAccount` and `RoleBinding`)
//! - renders and applies the adapter workload, either a `Deployment` or a
//!   Knative `Service`
//! - propagates the workload availability and address to the instance status
//!
//! Multi-tenant kinds share one adapter per namespace, owned by every
//! instance of the kind in that namespace.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types of the built-in kinds
//! - [`adapters`] - Adapter builders of the built-in kinds
//! - [`reconcilers`] - The generic adapter reconciliation engine
//! - [`controller`] - kube-runtime wiring of the engine
//! - [`context`] - Shared context handed to every reconciliation
//!
//! ## Example
//!
//! ```rust,no_run
//! use switchyard::crd::{WebhookSource, WebhookSourceSpec};
//!
//! let source = WebhookSource::new(
//!     "hooks",
//!     WebhookSourceSpec {
//!         event_type: "io.example.push".to_string(),
//!         event_source: None,
//!         basic_auth_username: None,
//!         sink: None,
//!         adapter_overrides: None,
//!     },
//! );
//! ```

pub mod adapters;
pub mod api;
pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod events;
pub mod knative;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
pub mod server;
pub mod status_reasons;
