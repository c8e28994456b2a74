//! Webhook relay entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse options** from flags and `RELAY_*` environment variables.
//! 2. **Wire observability**: `tracing-subscriber` with a JSON or pretty
//!    layer, plus an OpenTelemetry OTLP exporter when configured.
//! 3. **Load configuration**: read the YAML file and validate it into a
//!    [`routing::RoutingTable`]. Any problem aborts startup.
//! 4. **Serve** `POST /{handle_path}` until Ctrl-C or SIGTERM, then drain
//!    in-flight deliveries before exiting.

mod config;
mod options;
mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use dispatcher::{
    Dispatcher, DispatcherConfig, HttpTransport, HttpTransportConfig, RetryConfig, RetryPolicy,
};
use listener::{build_router, InboundGate};

use crate::options::Options;

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::parse();
    options.validate()?;

    let telemetry = telemetry::init(options.log_format, options.otlp_endpoint.as_deref())?;
    let result = run(&options).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "Relay stopped with an error");
    }
    telemetry.shutdown();
    result
}

async fn run(options: &Options) -> Result<()> {
    let table = config::load_routing_table(&options.config_file)?;
    info!(
        config_file = %options.config_file.display(),
        destinations = table.destinations().len(),
        scopes = table.scope_count(),
        "Loaded routing configuration"
    );

    let transport = HttpTransport::new(HttpTransportConfig {
        request_timeout: options.request_timeout(),
        ..HttpTransportConfig::default()
    })
    .context("failed to build HTTP client")?;
    let dispatcher = Dispatcher::new(
        Arc::new(transport),
        DispatcherConfig {
            retry: RetryConfig::with_retries(options.max_retries),
            retry_policy: RetryPolicy::RetryTransient,
        },
    );

    let gate = InboundGate::new(Arc::new(table), dispatcher.clone());
    let app = build_router(gate, options.handle_path());

    let addr = SocketAddr::from(([0, 0, 0, 0], options.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, path = %format!("/{}", options.handle_path()), "Listening for webhooks");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    dispatcher.shutdown(options.drain_timeout()).await;

    info!("Relay shut down");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
