// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use kube::Client;
use std::sync::Arc;
use switchyard::{
    adapters::{FilterAdapter, HttpTargetAdapter, WebhookSourceAdapter},
    config::OperatorConfig,
    context::Context,
    controller::{run_adapter_controller, supervise},
    crd::{Filter, HttpTarget, WebhookSource},
    server::run_server,
};
use tracing::{debug, info};

fn main() -> Result<()> {
    let config = OperatorConfig::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .thread_name("switchyard-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

fn init_tracing() {
    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT (text or json)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: OperatorConfig) -> Result<()> {
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        concurrency = config.concurrency,
        "Starting Switchyard controller"
    );
    debug!(?config, "Configuration loaded");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let ctx = Arc::new(Context::new(&client, &config));

    info!("Starting all controllers");

    // Each controller drains on SIGTERM/SIGINT and then returns
    let controllers = async {
        tokio::try_join!(
            run_adapter_controller::<WebhookSource, _>(
                client.clone(),
                ctx.clone(),
                WebhookSourceAdapter::new(config.webhook_source_image.clone()),
                &config,
            ),
            run_adapter_controller::<HttpTarget, _>(
                client.clone(),
                ctx.clone(),
                HttpTargetAdapter::new(config.http_target_image.clone()),
                &config,
            ),
            run_adapter_controller::<Filter, _>(
                client.clone(),
                ctx.clone(),
                FilterAdapter::new(config.filter_image.clone()),
                &config,
            ),
        )
        .map(|_| ())
    };

    supervise(run_server(config.metrics_bind_address), controllers).await
}
