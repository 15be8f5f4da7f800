//! Agent server bootstrap - the composition root.
//!
//! This module is the ONLY place where the agent's infrastructure is wired
//! together: workflow and tool files are loaded, the model backend and tool
//! transport are constructed, and the axum server is started.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use axum::{Json, Router, extract::State, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use voxfab_core::WorkflowDefinition;
use voxfab_tools::{HttpToolTransport, ToolCatalog, ToolExecutor};
use voxfab_voice::backend::ModelBackend;
use voxfab_voice::backend::ws::WsModelBackend;
use voxfab_workflow::load_workflow;

use crate::config::AgentConfig;
use crate::phantom::PhantomWatcher;
use crate::registration;
use crate::session::SessionDeps;

/// Fallback persona when the workflow metadata does not carry one.
const DEFAULT_PERSONA: &str =
    "You are a helpful voice assistant. Follow the conversation workflow and use the \
     session context in the section above when it is present.";

/// Shared state for the agent's axum handlers.
pub struct AgentContext {
    pub config: AgentConfig,
    pub workflow: WorkflowDefinition,
    pub catalog: Arc<ToolCatalog>,
    pub executor: Arc<ToolExecutor>,
    pub backend: Arc<dyn ModelBackend>,
    pub persona: String,
    pub phantom: PhantomWatcher,
}

impl AgentContext {
    /// Assemble the context from resolved configuration.
    ///
    /// Fails (exit code 1 territory) on unreadable/invalid workflow, tool,
    /// or phantom-rule files.
    pub fn build(config: AgentConfig) -> Result<Self> {
        let workflow = load_workflow(&config.workflow_file)
            .with_context(|| format!("loading workflow {}", config.workflow_file.display()))?;

        let catalog = match &config.tools_dir {
            Some(dir) => ToolCatalog::load_dir(dir)
                .with_context(|| format!("loading tools from {}", dir.display()))?,
            None => ToolCatalog::default(),
        };
        let catalog = Arc::new(catalog);

        let transport = HttpToolTransport::new(config.local_tools_url.clone(), config.tool_timeout)
            .context("building tool transport")?;
        let executor = Arc::new(ToolExecutor::new(Arc::clone(&catalog), Arc::new(transport)));

        let backend: Arc<dyn ModelBackend> = Arc::new(WsModelBackend::new(
            config.voice_model_url.clone(),
            config.voice_model_api_key.clone(),
        ));

        let persona = workflow
            .metadata
            .as_ref()
            .and_then(|m| m.persona.clone())
            .unwrap_or_else(|| DEFAULT_PERSONA.to_string());

        let phantom = match &config.phantom_rules_file {
            Some(path) => PhantomWatcher::from_file(path)
                .with_context(|| format!("loading phantom rules {}", path.display()))?,
            None => PhantomWatcher::default(),
        };

        Ok(Self {
            config,
            workflow,
            catalog,
            executor,
            backend,
            persona,
            phantom,
        })
    }

    /// Per-session dependency bundle for a new actor.
    #[must_use]
    pub fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            agent_id: self.config.agent_id.clone(),
            mode: self.config.mode,
            backend: Arc::clone(&self.backend),
            executor: Arc::clone(&self.executor),
            catalog: Arc::clone(&self.catalog),
            workflow: self.workflow.clone(),
            persona: self.persona.clone(),
            voice_id: self
                .config
                .voice_id
                .clone()
                .or_else(|| self.workflow.voice_id.clone()),
            runtime_arn: self.config.runtime_arn.clone(),
            phantom: self.phantom.clone(),
        }
    }
}

/// Build the agent's router.
pub fn build_router(ctx: Arc<AgentContext>) -> Router {
    Router::new()
        .route("/session", get(crate::ws::session_handler))
        .route("/health", get(health))
        .with_state(ctx)
}

async fn health(State(ctx): State<Arc<AgentContext>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "agentId": ctx.config.agent_id,
        "workflow": ctx.workflow.id,
    }))
}

/// Failure phase, so the binary can map to the right exit code.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Anything before the listener is serving (exit code 1).
    #[error("startup failed: {0:#}")]
    Startup(#[source] anyhow::Error),

    /// The serving loop itself failed (exit code 2).
    #[error("runtime failure: {0:#}")]
    Runtime(#[source] anyhow::Error),
}

/// Run the agent until shutdown. Returns once the listener stops.
pub async fn run(config: AgentConfig, cancel: CancellationToken) -> Result<(), AgentError> {
    let agent_id = config.agent_id.clone();
    let gateway_url = config.gateway_url.clone();
    let ctx = Arc::new(AgentContext::build(config).map_err(AgentError::Startup)?);

    let listener = TcpListener::bind(("0.0.0.0", ctx.config.port))
        .await
        .with_context(|| format!("binding agent port {}", ctx.config.port))
        .map_err(AgentError::Startup)?;
    let addr = listener
        .local_addr()
        .context("reading listener address")
        .map_err(AgentError::Startup)?;
    info!(
        agent_id = %agent_id,
        addr = %addr,
        workflow = %ctx.workflow.id,
        tools = ctx.catalog.len(),
        "Agent listening"
    );

    // Registration happens alongside serving; the gateway may not be up yet.
    let client = reqwest::Client::new();
    let record = registration::registration(
        &ctx.config,
        ctx.catalog.names(),
        ctx.config
            .voice_id
            .clone()
            .or_else(|| ctx.workflow.voice_id.clone()),
    );
    tokio::spawn({
        let client = client.clone();
        let gateway_url = gateway_url.clone();
        let cancel = cancel.clone();
        async move {
            registration::register_with_retry(&client, &gateway_url, &record, &cancel).await;
        }
    });

    let app = build_router(Arc::clone(&ctx));
    axum::serve(listener, app)
        .with_graceful_shutdown({
            let cancel = cancel.clone();
            async move { cancel.cancelled().await }
        })
        .await
        .map_err(|e| AgentError::Runtime(e.into()))?;

    registration::deregister(&client, &gateway_url, &agent_id).await;
    Ok(())
}
