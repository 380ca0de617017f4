//! API server lifecycle: bind, spawn, shut down.
//!
//! bind → spawn background task → return handle with shutdown channel.
//! `serve` wraps this for the CLI and runs until Ctrl-C.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::api_router;
use crate::api::types::ApiContext;
use crate::batch::{build_workflow, code_source, BatchError};
use crate::config::PipelineSettings;
use crate::pipeline::codes::CodeSetSource;
use crate::pipeline::llm::LlmClient;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind API server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("API server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API server task failed: {0}")]
    Task(String),
}

// ═══════════════════════════════════════════════════════════
// Public types
// ═══════════════════════════════════════════════════════════

/// Handle to a running API server.
pub struct ApiServer {
    /// Address actually bound; differs from the requested one for port 0.
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ApiServer {
    /// Ask the server to stop accepting connections. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Wait for the server task to finish.
    pub async fn wait(self) -> Result<(), ServerError> {
        flatten(self.task.await)
    }
}

fn flatten(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    match joined {
        Ok(result) => Ok(result?),
        Err(e) => Err(ServerError::Task(e.to_string())),
    }
}

// ═══════════════════════════════════════════════════════════
// Server lifecycle
// ═══════════════════════════════════════════════════════════

/// Load the reference codes and assemble the shared context.
///
/// Code-set failures are fatal here, same as for a batch run.
pub fn build_context(
    settings: &PipelineSettings,
    llm: Box<dyn LlmClient + Send + Sync>,
) -> Result<ApiContext, BatchError> {
    let codes = code_source(settings).load()?;
    tracing::info!(codes = codes.len(), "Reference codes loaded");
    Ok(ApiContext::new(build_workflow(settings, llm), codes))
}

/// Bind `addr` and spawn the server in a background task.
pub async fn start_api_server(ctx: ApiContext, addr: SocketAddr) -> Result<ApiServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local = listener.local_addr()?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = api_router(ctx);
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tracing::info!(addr = %local, "API server listening");

    Ok(ApiServer {
        addr: local,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

/// Run the API server until Ctrl-C or until the server task exits.
pub async fn serve(ctx: ApiContext, addr: SocketAddr) -> Result<(), ServerError> {
    let mut server = start_api_server(ctx, addr).await?;

    tokio::select! {
        joined = &mut server.task => return flatten(joined),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Shutdown signal received");
        }
    }

    server.shutdown();
    server.wait().await
}
