//! Serving-context lifecycle.
//!
//! [`SessionLifecycle::start`] binds the listener and mounts the MCP service; the returned
//! [`RunningServer`] owns the serve task. Dropping it cancels serving, so the listener is
//! released on every exit path. Call [`RunningServer::stop`] to also wait for the task.

use crate::handler::CollabMcpServer;
use axum::Json;
use axum::Router;
use axum::routing::get;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct SessionLifecycle;

impl SessionLifecycle {
    /// Bind `bind` and start serving `server`.
    ///
    /// Routes:
    /// - `GET /healthz` -> `{"status":"ok"}`
    /// - everything else -> MCP streamable HTTP (stateless)
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(bind: SocketAddr, server: CollabMcpServer) -> std::io::Result<RunningServer> {
        let cancel = CancellationToken::new();
        let app = router(server);

        let listener = tokio::net::TcpListener::bind(bind).await?;
        let local_addr = listener.local_addr()?;

        let shutdown = cancel.clone();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        });

        info!(addr = %local_addr, "serving MCP over streamable HTTP");
        Ok(RunningServer {
            local_addr,
            cancel,
            handle: Some(handle),
        })
    }
}

fn router(server: CollabMcpServer) -> Router {
    let mut config = StreamableHttpServerConfig::default();
    config.stateful_mode = false;

    let mcp = StreamableHttpService::new(
        move || Ok(server.clone()),
        Arc::new(LocalSessionManager::default()),
        config,
    );

    Router::new()
        .route("/healthz", get(healthz))
        .fallback_service(mcp)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Guard for a running server. Serving stops when this is dropped.
pub struct RunningServer {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    handle: Option<JoinHandle<std::io::Result<()>>>,
}

impl RunningServer {
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    ///
    /// # Errors
    ///
    /// Returns the serve loop's I/O error, or an error if the serve task panicked.
    pub async fn stop(mut self) -> std::io::Result<()> {
        self.cancel.cancel();
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let result = handle.await.map_err(std::io::Error::other)?;
        info!(addr = %self.local_addr, "server stopped");
        result
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
