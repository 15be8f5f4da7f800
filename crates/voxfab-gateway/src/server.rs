//! Gateway bootstrap - the composition root.
//!
//! The only place where the memory store, registry, and agent connector
//! are instantiated and wired into the axum server.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use axum::Router;
use axum::routing::{delete, get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use voxfab_core::ports::memory::MemoryStore;
use voxfab_memory::store_from_url;

use crate::agent_link::{AgentConnector, WsAgentConnector};
use crate::config::GatewayConfig;
use crate::registry::AgentRegistry;
use crate::session::SessionDeps;

/// Shared state for the gateway's axum handlers.
pub struct GatewayContext {
    pub config: GatewayConfig,
    pub registry: Arc<AgentRegistry>,
    pub store: Arc<dyn MemoryStore>,
    pub connector: Arc<dyn AgentConnector>,
}

impl GatewayContext {
    /// Assemble the context from resolved configuration.
    pub fn build(config: GatewayConfig, shutdown: CancellationToken) -> Result<Self> {
        let store = store_from_url(&config.memory_url)
            .with_context(|| format!("building memory store from {}", config.memory_url))?;
        let registry = Arc::new(AgentRegistry::new(config.health_interval, shutdown));
        Ok(Self {
            config,
            registry,
            store,
            connector: Arc::new(WsAgentConnector),
        })
    }

    /// Per-session dependency bundle.
    #[must_use]
    pub fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
            connector: Arc::clone(&self.connector),
            default_workflow: self.config.default_workflow.clone(),
            keepalive_idle: self.config.keepalive_idle,
            keepalive_grace: self.config.keepalive_grace,
        }
    }
}

/// Build the gateway's router.
pub fn build_router(ctx: Arc<GatewayContext>) -> Router {
    Router::new()
        .route("/ws", get(crate::ws::client_handler))
        .route("/agents/register", post(crate::http::register_agent))
        .route("/agents/:id", delete(crate::http::deregister_agent))
        .route("/agents", get(crate::http::list_agents))
        .route("/health", get(crate::http::health))
        .with_state(ctx)
}

/// Failure phase, so the binary can map to the right exit code.
#[derive(Debug, thiserror::Error)]
pub enum GatewayRunError {
    /// Anything before the listener is serving (exit code 1).
    #[error("startup failed: {0:#}")]
    Startup(#[source] anyhow::Error),

    /// The serving loop itself failed (exit code 2).
    #[error("runtime failure: {0:#}")]
    Runtime(#[source] anyhow::Error),
}

/// Run the gateway until shutdown.
pub async fn run(config: GatewayConfig, cancel: CancellationToken) -> Result<(), GatewayRunError> {
    let port = config.port;
    let ctx = Arc::new(
        GatewayContext::build(config, cancel.clone()).map_err(GatewayRunError::Startup)?,
    );

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding gateway port {port}"))
        .map_err(GatewayRunError::Startup)?;
    let addr = listener
        .local_addr()
        .context("reading listener address")
        .map_err(GatewayRunError::Startup)?;
    info!(addr = %addr, default_workflow = %ctx.config.default_workflow, "Gateway listening");

    let app = build_router(Arc::clone(&ctx));
    axum::serve(listener, app)
        .with_graceful_shutdown({
            let cancel = cancel.clone();
            async move { cancel.cancelled().await }
        })
        .await
        .map_err(|e| GatewayRunError::Runtime(e.into()))?;

    info!("Gateway shut down");
    Ok(())
}
