//! Per-session client proxy.
//!
//! One `ClientSession` owns one client connection and its current agent
//! leg. Frames are proxied verbatim in both directions except for the
//! gateway-directed vocabulary (`update_memory`, `handoff_request`) on the
//! agent side and the binding vocabulary (`select_workflow`,
//! `session_init`) on the client side. Independent sessions never share
//! state beyond the registry and the memory store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use voxfab_core::contracts::pcm;
use voxfab_core::ports::memory::MemoryStore;
use voxfab_core::{
    AgentBound, AgentInfo, ClientFrame, GatewayBound, ProtocolError, ServerFrame, SessionMemory,
    mint_session_id,
};

use crate::agent_link::{AgentChannel, AgentConnector, Frame};
use crate::credentials::extract_credentials;
use crate::handoff::HandoffOrchestrator;
use crate::registry::AgentRegistry;

/// Dependencies shared by every client session.
#[derive(Clone)]
pub struct SessionDeps {
    pub registry: Arc<AgentRegistry>,
    pub store: Arc<dyn MemoryStore>,
    pub connector: Arc<dyn AgentConnector>,
    pub default_workflow: String,
    pub keepalive_idle: Duration,
    pub keepalive_grace: Duration,
}

/// One client connection's proxy loop.
pub struct ClientSession {
    deps: SessionDeps,
    orchestrator: HandoffOrchestrator,
    session_id: String,
    client_tx: mpsc::Sender<Frame>,
    client_rx: mpsc::Receiver<Frame>,

    /// Selected workflow handle until binding; the agent afterwards.
    selection: String,
    agent: Option<AgentInfo>,
    leg: Option<AgentChannel>,

    last_activity: Instant,
    pinged: bool,
    ended: bool,
}

impl ClientSession {
    /// Create a session for an accepted client connection.
    #[must_use]
    pub fn new(
        deps: SessionDeps,
        client_tx: mpsc::Sender<Frame>,
        client_rx: mpsc::Receiver<Frame>,
    ) -> Self {
        let orchestrator = HandoffOrchestrator::new(
            Arc::clone(&deps.registry),
            Arc::clone(&deps.store),
            Arc::clone(&deps.connector),
        );
        let selection = deps.default_workflow.clone();
        Self {
            deps,
            orchestrator,
            session_id: mint_session_id(),
            client_tx,
            client_rx,
            selection,
            agent: None,
            leg: None,
            last_activity: Instant::now(),
            pinged: false,
            ended: false,
        }
    }

    /// Run the session to completion.
    pub async fn run(mut self) {
        self.send_server(ServerFrame::Connected {
            session_id: self.session_id.clone(),
            timestamp: Utc::now().timestamp_millis(),
        })
        .await;

        let mut keepalive = interval(Duration::from_secs(5));
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Select first, handle after: the borrows taken by the select arms
        // must end before a handler can take `&mut self`.
        enum Wake {
            Client(Option<Frame>),
            Agent(Option<Frame>),
            Tick,
        }

        while !self.ended {
            // A `None` leg before binding: only the client side can speak.
            let wake = match &mut self.leg {
                Some(leg) => tokio::select! {
                    frame = self.client_rx.recv() => Wake::Client(frame),
                    frame = leg.rx.recv() => Wake::Agent(frame),
                    _ = keepalive.tick() => Wake::Tick,
                },
                None => tokio::select! {
                    frame = self.client_rx.recv() => Wake::Client(frame),
                    _ = keepalive.tick() => Wake::Tick,
                },
            };

            match wake {
                Wake::Client(Some(frame)) => self.on_client_frame(frame).await,
                Wake::Client(None) => self.end("client disconnected"),
                Wake::Agent(Some(frame)) => self.on_agent_frame(frame).await,
                Wake::Agent(None) => {
                    self.send_server(ServerFrame::error("agent disconnected")).await;
                    self.end("agent leg closed");
                }
                Wake::Tick => self.on_keepalive_tick().await,
            }
        }

        // Dropping the leg closes the agent side; memory stays until TTL.
        info!(session_id = %self.session_id, "Client session closed");
    }

    // ── Client → agent ─────────────────────────────────────────────

    async fn on_client_frame(&mut self, frame: Frame) {
        self.last_activity = Instant::now();
        self.pinged = false;

        match frame {
            Frame::Binary(bytes) => {
                self.ensure_bound().await;
                // Ingress half of the even-length defence.
                self.forward_to_agent(Frame::Binary(pcm::pad_even(bytes))).await;
            }
            Frame::Text(text) => self.on_client_text(text).await,
            Frame::Ping => {}
        }
    }

    async fn on_client_text(&mut self, text: String) {
        match ClientFrame::decode(&text) {
            Ok(ClientFrame::SelectWorkflow { workflow_id }) => {
                if self.leg.is_some() {
                    debug!(session_id = %self.session_id, "select_workflow after binding ignored");
                    return;
                }
                self.selection = workflow_id;
                // Selection is the signal to bind; audio may follow at once.
                self.ensure_bound().await;
            }
            Ok(ClientFrame::SessionInit { session_id, memory }) => {
                if self.leg.is_some() {
                    debug!(session_id = %self.session_id, "session_init after binding ignored");
                    return;
                }
                if let Some(explicit) = session_id {
                    debug!(from = %self.session_id, to = %explicit, "Resuming explicit session");
                    self.session_id = explicit;
                }
                if let Some(memory) = memory {
                    if let Err(e) = self.deps.store.put(&self.session_id, memory).await {
                        warn!(session_id = %self.session_id, error = %e, "Memory write dropped");
                    }
                }
            }
            Ok(ClientFrame::UserInput { .. } | ClientFrame::EndOfSpeech) => {
                self.ensure_bound().await;
                self.forward_to_agent(Frame::Text(text)).await;
            }
            Ok(ClientFrame::Ping) => {} // liveness only; activity already noted
            Err(ProtocolError::UnknownType(ty)) => {
                debug!(session_id = %self.session_id, frame_type = %ty, "Ignoring unknown frame type");
            }
            Err(e) => {
                self.send_server(ServerFrame::error(format!("malformed frame: {e}"))).await;
            }
        }
    }

    /// Bind to the initially selected agent on first need.
    async fn ensure_bound(&mut self) {
        if self.leg.is_some() || self.ended {
            return;
        }

        let handle = self.selection.clone();
        let agent = match self.deps.registry.resolve_available(&handle).await {
            Ok(agent) => agent,
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Initial agent unavailable");
                self.send_server(ServerFrame::error(e.to_string())).await;
                self.end("no initial agent");
                return;
            }
        };

        let memory = match self.deps.store.get(&self.session_id).await {
            Ok(memory) => memory,
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Memory read degraded to empty bag");
                SessionMemory::default()
            }
        };

        match self.open_leg(&agent, memory).await {
            Ok(leg) => {
                info!(session_id = %self.session_id, agent_id = %agent.id, "Session bound");
                self.leg = Some(leg);
                self.agent = Some(agent);
            }
            Err(e) => {
                self.send_server(ServerFrame::error(e.to_string())).await;
                self.end("initial agent connection failed");
            }
        }
    }

    async fn open_leg(
        &self,
        agent: &AgentInfo,
        memory: SessionMemory,
    ) -> Result<AgentChannel, crate::error::GatewayError> {
        let channel = self.deps.connector.connect(agent).await?;
        let init = AgentBound::SessionInit {
            session_id: self.session_id.clone(),
            memory,
            trace_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now().timestamp_millis(),
        };
        let text = init
            .encode()
            .map_err(|e| crate::error::GatewayError::AgentConnection(e.to_string()))?;
        channel
            .tx
            .send(Frame::Text(text))
            .await
            .map_err(|_| crate::error::GatewayError::AgentConnection("agent leg closed".into()))?;
        Ok(channel)
    }

    async fn forward_to_agent(&mut self, frame: Frame) {
        let Some(leg) = &self.leg else { return };
        if leg.tx.send(frame).await.is_err() {
            self.send_server(ServerFrame::error("agent disconnected")).await;
            self.end("agent leg closed mid-forward");
        }
    }

    // ── Agent → client ─────────────────────────────────────────────

    async fn on_agent_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Binary(bytes) => {
                // Egress half of the even-length defence.
                self.send_client(Frame::Binary(pcm::pad_even(bytes))).await;
            }
            Frame::Text(text) => match GatewayBound::intercept(&text) {
                Some(GatewayBound::UpdateMemory { memory }) => self.on_memory_update(memory).await,
                Some(GatewayBound::HandoffRequest {
                    target_agent_id,
                    context,
                    graph_state,
                }) => {
                    self.on_handoff(target_agent_id, context, graph_state).await;
                }
                // Everything else is the agent talking to the client.
                None => self.send_client(Frame::Text(text)).await,
            },
            Frame::Ping => {}
        }
    }

    /// `update_memory` interception: merge, plus credential sniffing on the
    /// fresh last-user-message so partial credentials survive a handoff
    /// that happens before verification.
    async fn on_memory_update(&mut self, memory: SessionMemory) {
        let mut patch = memory;
        if patch.account.is_none() || patch.sort_code.is_none() {
            if let Some(found) = patch
                .last_user_message
                .as_deref()
                .map(extract_credentials)
                .filter(|found| !found.is_empty())
            {
                info!(
                    session_id = %self.session_id,
                    has_account = found.account.is_some(),
                    has_sort_code = found.sort_code.is_some(),
                    "Credentials detected in utterance"
                );
                let creds = found.into_patch();
                if patch.account.is_none() {
                    patch.account = creds.account;
                }
                if patch.sort_code.is_none() {
                    patch.sort_code = creds.sort_code;
                }
            }
        }

        if let Err(e) = self.deps.store.put(&self.session_id, patch).await {
            warn!(session_id = %self.session_id, error = %e, "Memory write dropped");
        }
    }

    /// `handoff_request` interception: the full protocol.
    async fn on_handoff(
        &mut self,
        target_agent_id: String,
        context: voxfab_core::HandoffContext,
        graph_state: Option<serde_json::Value>,
    ) {
        // The client sees the request (drives UI state) before the outcome.
        self.send_server(ServerFrame::HandoffRequest {
            target_agent_id: target_agent_id.clone(),
            context: context.clone(),
            graph_state: graph_state.clone(),
        })
        .await;

        let target = match self.orchestrator.validate(&target_agent_id).await {
            Ok(target) => target,
            Err(e) => {
                // Refused: current agent stays live, no handoff_event.
                warn!(session_id = %self.session_id, error = %e, "Handoff refused");
                self.send_server(ServerFrame::error(e.to_string())).await;
                return;
            }
        };

        let Some(predecessor) = self.leg.take() else {
            self.send_server(ServerFrame::error("no active agent to hand off from")).await;
            return;
        };
        let from = self
            .agent
            .as_ref()
            .map_or_else(|| context.from_agent.clone(), |a| a.id.clone());

        match self
            .orchestrator
            .execute(
                &self.session_id,
                target.clone(),
                &context,
                graph_state.as_ref(),
                predecessor,
            )
            .await
        {
            Ok(leg) => {
                self.leg = Some(leg);
                self.agent = Some(target.clone());
                self.send_server(ServerFrame::HandoffEvent {
                    from,
                    to: target.id,
                })
                .await;
            }
            Err(e) => {
                // Predecessor is gone and the successor never came up.
                warn!(session_id = %self.session_id, error = %e, "Handoff failed mid-flight");
                self.send_server(ServerFrame::error(e.to_string())).await;
                self.end("handoff failed after predecessor close");
            }
        }
    }

    // ── Keepalive ──────────────────────────────────────────────────

    async fn on_keepalive_tick(&mut self) {
        // A live session is activity: keep its memory from idling out of
        // the store mid-conversation.
        if self.leg.is_some() {
            if let Err(e) = self.deps.store.touch(&self.session_id).await {
                debug!(session_id = %self.session_id, error = %e, "Memory touch dropped");
            }
        }

        let idle = self.last_activity.elapsed();
        if self.pinged {
            if idle >= self.deps.keepalive_idle + self.deps.keepalive_grace {
                info!(session_id = %self.session_id, "Keepalive expired");
                self.end("keepalive timeout");
            }
        } else if idle >= self.deps.keepalive_idle {
            debug!(session_id = %self.session_id, "Sending keepalive ping");
            self.send_client(Frame::Ping).await;
            self.pinged = true;
        }
    }

    // ── Plumbing ───────────────────────────────────────────────────

    async fn send_server(&mut self, frame: ServerFrame) {
        match frame.encode() {
            Ok(text) => self.send_client(Frame::Text(text)).await,
            Err(e) => warn!(session_id = %self.session_id, error = %e, "Dropping unencodable frame"),
        }
    }

    async fn send_client(&mut self, frame: Frame) {
        if self.client_tx.send(frame).await.is_err() {
            self.end("client send failed");
        }
    }

    fn end(&mut self, why: &str) {
        if !self.ended {
            debug!(session_id = %self.session_id, why, "Ending session");
            self.ended = true;
        }
    }
}
