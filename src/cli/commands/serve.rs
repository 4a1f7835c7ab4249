//! `serve` command
//!
//! Loads the model (refusing to start without one), opens the audit sinks
//! and runs the HTTP server until Ctrl-C.

use crate::cli::ServeArgs;
use crate::config::ServiceConfig;
use crate::server;
use crate::service::InferenceService;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Merge flags over the environment configuration
fn build_config(args: ServeArgs) -> Result<ServiceConfig> {
    let mut config = ServiceConfig::from_env().context("Invalid environment configuration")?;

    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(model) = args.model {
        config.model_path = model;
    }
    if let Some(path) = args.audit_log {
        config.audit_log_path = path;
    }
    if let Some(path) = args.audit_table {
        config.audit_table_path = path;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Run the HTTP server
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = build_config(args)?;
    let addr = config.socket_addr()?;

    info!(
        host = %config.host,
        port = config.port,
        "Starting housing inference server"
    );

    let (service, writer) = InferenceService::start(&config)?;
    let service = Arc::new(service);
    let listener = server::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    server::serve(listener, Arc::clone(&service), config.max_body_bytes, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    // Dropping the last handle closes the audit queue; the writer then drains and exits.
    drop(service);
    match tokio::task::spawn_blocking(move || writer.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => warn!("Audit writer thread panicked"),
        Err(e) => warn!(error = %e, "Failed to join audit writer"),
    }

    info!("Server stopped");
    Ok(())
}
