//! HTTP server for the inference service
//!
//! A tokio accept loop that spawns one task per connection. Each task reads
//! a single request, routes it and closes the connection.

mod http;
mod routes;

pub use http::{read_request, HttpRequest, HttpResponse, ReadOutcome};
pub use routes::{route_request, PredictResponse, METRICS_CONTENT_TYPE};

use crate::service::InferenceService;
use anyhow::Result;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// How long shutdown waits for in-flight connections
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Serve connections until `shutdown` resolves.
///
/// After shutdown, in-flight connections get up to [`SHUTDOWN_GRACE`] to
/// finish, then pending audit entries are flushed before returning.
pub async fn serve(
    listener: TcpListener,
    service: Arc<InferenceService>,
    max_body_bytes: usize,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /         - Welcome");
    info!("  GET  /health   - Health check");
    info!("  POST /predict  - Predict median house value");
    info!("  GET  /metrics  - Prometheus metrics");
    info!("  POST /reload   - Reload model artifact");

    tokio::pin!(shutdown);
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote_addr) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        continue;
                    }
                };
                let service = Arc::clone(&service);
                let span = info_span!("request", id = %Uuid::new_v4(), remote = %remote_addr);

                connections.spawn(
                    async move {
                        if let Err(e) = handle_connection(stream, service, max_body_bytes).await {
                            error!("Connection error from {}: {}", remote_addr, e);
                        }
                    }
                    .instrument(span),
                );
            }
            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = finished {
                    error!(error = %e, "Connection task failed");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
        }
    }

    if !connections.is_empty() {
        info!(in_flight = connections.len(), "Waiting for in-flight connections");
    }
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(
            remaining = connections.len(),
            "Shutdown grace period elapsed, aborting connections"
        );
        connections.shutdown().await;
    }

    service.flush_audit().await;
    Ok(())
}

/// Handle a single connection
async fn handle_connection(
    mut stream: TcpStream,
    service: Arc<InferenceService>,
    max_body_bytes: usize,
) -> Result<()> {
    let response = match read_request(&mut stream, max_body_bytes).await? {
        ReadOutcome::Request(request) => {
            debug!(method = %request.method, path = %request.path, "Incoming request");
            let response = route_request(&service, &request);
            info!(
                method = %request.method,
                path = %request.path,
                status = response.status,
                "Request handled"
            );
            response
        }
        ReadOutcome::TooLarge => HttpResponse::payload_too_large(),
    };

    stream.write_all(&response.to_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Bind a listener for the given address
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    Ok(TcpListener::bind(addr).await?)
}
