// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration.
//!
//! Every setting can be given as a command-line flag or through the
//! environment. The parsed configuration is immutable once the operator runs.

use crate::constants::{
    DEFAULT_CLUSTER_DOMAIN, DEFAULT_CONTROLLER_CONCURRENCY, DEFAULT_FIELD_MANAGER,
    DEFAULT_METRICS_BIND_ADDRESS, DEFAULT_WORKER_THREADS,
};
use clap::Parser;
use std::net::SocketAddr;

/// Default adapter image of `WebhookSource`
pub const DEFAULT_WEBHOOKSOURCE_IMAGE: &str = "ghcr.io/switchyard-io/webhooksource-adapter:latest";

/// Default adapter image of `HttpTarget`
pub const DEFAULT_HTTPTARGET_IMAGE: &str = "ghcr.io/switchyard-io/httptarget-adapter:latest";

/// Default adapter image of `Filter`
pub const DEFAULT_FILTER_IMAGE: &str = "ghcr.io/switchyard-io/filter-adapter:latest";

/// Switchyard controller
#[derive(Clone, Debug, Parser)]
#[command(name = "switchyard-controller", version, about)]
pub struct OperatorConfig {
    /// Address the metrics and health endpoints listen on
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    pub metrics_bind_address: SocketAddr,

    /// Maximum number of objects reconciled in parallel by each controller
    #[arg(long, env = "CONTROLLER_CONCURRENCY", default_value_t = DEFAULT_CONTROLLER_CONCURRENCY)]
    pub concurrency: u16,

    /// Number of tokio worker threads
    #[arg(long, env = "WORKER_THREADS", default_value_t = DEFAULT_WORKER_THREADS)]
    pub worker_threads: usize,

    /// Field manager of writes and reporting controller of events
    #[arg(long, env = "FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    pub field_manager: String,

    /// DNS domain of the cluster, used to address core Services
    #[arg(long, env = "CLUSTER_DOMAIN", default_value = DEFAULT_CLUSTER_DOMAIN)]
    pub cluster_domain: String,

    /// Adapter image of WebhookSource
    #[arg(long, env = "WEBHOOKSOURCE_ADAPTER_IMAGE", default_value = DEFAULT_WEBHOOKSOURCE_IMAGE)]
    pub webhook_source_image: String,

    /// Adapter image of HttpTarget
    #[arg(long, env = "HTTPTARGET_ADAPTER_IMAGE", default_value = DEFAULT_HTTPTARGET_IMAGE)]
    pub http_target_image: String,

    /// Adapter image of Filter
    #[arg(long, env = "FILTER_ADAPTER_IMAGE", default_value = DEFAULT_FILTER_IMAGE)]
    pub filter_image: String,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
