//! The handoff orchestrator.
//!
//! Moving a live session between agents follows a strict order:
//!
//! 1. validate the target against the registry (failure keeps the current
//!    agent and surfaces an `error` to the client),
//! 2. write everything worth carrying into session memory — **before** the
//!    successor is initialised,
//! 3. gracefully end the predecessor leg (bounded drain),
//! 4. connect the successor and send `session_init` with the full bag,
//! 5. let the caller emit exactly one `handoff_event` and resume proxying.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{info, warn};

use voxfab_core::ports::memory::MemoryStore;
use voxfab_core::{AgentBound, AgentInfo, HandoffContext, SessionMemory};

use crate::agent_link::{AgentChannel, AgentConnector, Frame};
use crate::credentials::{extract_credentials, extract_from_variables};
use crate::error::GatewayError;
use crate::registry::AgentRegistry;

/// Cap on flushing the predecessor's `end_session` (the drain phase).
const DRAIN_DEADLINE: Duration = Duration::from_secs(2);

/// The reason string the executor falls back to; not a real user intent.
const DEFAULT_REASON: &str = "User needs specialist assistance";

/// Executes the handoff protocol for one gateway.
pub struct HandoffOrchestrator {
    registry: Arc<AgentRegistry>,
    store: Arc<dyn MemoryStore>,
    connector: Arc<dyn AgentConnector>,
}

impl HandoffOrchestrator {
    pub fn new(
        registry: Arc<AgentRegistry>,
        store: Arc<dyn MemoryStore>,
        connector: Arc<dyn AgentConnector>,
    ) -> Self {
        Self {
            registry,
            store,
            connector,
        }
    }

    /// Step 1: resolve and health-check the target.
    pub async fn validate(&self, handle: &str) -> Result<AgentInfo, GatewayError> {
        self.registry.resolve_available(handle).await
    }

    /// Steps 2–4. On success the returned channel is already initialised
    /// and proxying can resume; on failure the session has lost its agent
    /// leg and the caller must end it.
    pub async fn execute(
        &self,
        session_id: &str,
        target: AgentInfo,
        context: &HandoffContext,
        graph_state: Option<&Value>,
        predecessor: AgentChannel,
    ) -> Result<AgentChannel, GatewayError> {
        // Memory write lands before anything touches the successor.
        let patch = carry_forward_patch(context, graph_state);
        if let Err(e) = self.store.put(session_id, patch).await {
            warn!(session_id, error = %e, "Memory write dropped; continuing degraded");
        }

        self.close_predecessor(session_id, predecessor).await;

        let memory = match self.store.get(session_id).await {
            Ok(memory) => memory,
            Err(e) => {
                warn!(session_id, error = %e, "Memory read degraded to empty bag");
                SessionMemory::default()
            }
        };

        let mut channel = self.connector.connect(&target).await?;
        let init = AgentBound::SessionInit {
            session_id: session_id.to_string(),
            memory,
            trace_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now().timestamp_millis(),
        };
        let text = init
            .encode()
            .map_err(|e| GatewayError::AgentConnection(e.to_string()))?;
        channel
            .tx
            .send(Frame::Text(text))
            .await
            .map_err(|_| GatewayError::AgentConnection("successor leg closed".to_string()))?;

        info!(
            session_id,
            from = %context.from_agent,
            to = %target.id,
            reason = %context.reason,
            "Handoff complete"
        );
        Ok(channel)
    }

    /// Step 3: graceful `end_session` to the predecessor, bounded drain.
    async fn close_predecessor(&self, session_id: &str, predecessor: AgentChannel) {
        let end = AgentBound::EndSession {
            session_id: session_id.to_string(),
        };
        if let Ok(text) = end.encode() {
            let send = predecessor.tx.send(Frame::Text(text));
            if timeout(DRAIN_DEADLINE, send).await.is_err() {
                warn!(session_id, "Predecessor drain exceeded deadline");
            }
        }
        // Dropping the channel closes the leg.
    }
}

/// Step 2's payload: what a handoff carries into session memory.
#[must_use]
pub fn carry_forward_patch(context: &HandoffContext, graph_state: Option<&Value>) -> SessionMemory {
    let mut patch = SessionMemory {
        last_agent: Some(context.from_agent.clone()),
        last_user_message: context.last_user_message.clone(),
        graph_state: graph_state.cloned(),
        ..SessionMemory::default()
    };

    if context.verified == Some(true) {
        patch.verified = Some(true);
        patch.user_name.clone_from(&context.user_name);
        patch.account.clone_from(&context.account);
        patch.sort_code.clone_from(&context.sort_code);
    }

    // The executor's fixed fallback is not a user intent; don't store it.
    if context.reason != DEFAULT_REASON {
        patch.user_intent = Some(context.reason.clone());
        patch
            .extra
            .insert("handoffReason".into(), Value::String(context.reason.clone()));
    }

    if let Some(task) = &context.task_completed {
        patch
            .extra
            .insert("lastTaskCompleted".into(), Value::String(task.clone()));
    }
    if let Some(summary) = &context.summary {
        patch
            .extra
            .insert("lastTaskSummary".into(), Value::String(summary.clone()));
    }

    // Partial-credential carry-forward: store whichever is present, even
    // if only one, so the successor prompts just for what is missing.
    if patch.account.is_none() || patch.sort_code.is_none() {
        let mut found = context
            .last_user_message
            .as_deref()
            .map(extract_credentials)
            .unwrap_or_default();
        if let Some(variables) = graph_state.and_then(|g| g.get("variables")) {
            let from_vars = extract_from_variables(variables);
            if found.account.is_none() {
                found.account = from_vars.account;
            }
            if found.sort_code.is_none() {
                found.sort_code = from_vars.sort_code;
            }
        }
        if patch.account.is_none() {
            patch.account = found.account;
        }
        if patch.sort_code.is_none() {
            patch.sort_code = found.sort_code;
        }
    }

    patch
}
