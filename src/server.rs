// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP endpoints of the operator: Prometheus metrics and health probes.

use crate::metrics::gather_metrics;
use axum::http::StatusCode;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tracing::{error, info};

/// `/metrics` handler, in the Prometheus text format.
pub async fn metrics_handler() -> (StatusCode, String) {
    match gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// `/healthz` and `/readyz` handler.
///
/// The process serves requests only once the controllers are running, so
/// answering at all is enough.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
        .route("/readyz", get(health_handler))
}

/// Serve [`router`] on `addr` until the process exits.
///
/// # Errors
///
/// Returns an error if the address can not be bound or the server fails.
pub async fn run_server(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Metrics server listening");
    axum::serve(listener, router()).await?;
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
