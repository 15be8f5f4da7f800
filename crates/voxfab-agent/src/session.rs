//! Per-session actor — the agent runtime state machine.
//!
//! One task owns one session; every mutation flows through its inbox, so
//! ordering follows from single-consumer semantics and no per-session lock
//! exists anywhere. The actor bridges three worlds:
//!
//! - **gateway leg** (frames in via [`SessionInput`], frames out via
//!   [`Outbound`]),
//! - **voice model** (the bridge's event channel),
//! - **tool pipeline** (the executor, awaited inline while the session is
//!   in `WaitingTool`).
//!
//! ```text
//! [Idle] → [Connected] → [Configured] → [Streaming] ⇄ [WaitingTool]
//!                                           │
//!                                           └── handoff / fatal ──→ [Ended]
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use voxfab_core::{
    GatewayBound, Role, ServerFrame, Session, SessionMemory, SessionMode,
};
use voxfab_tools::{SessionSnapshot, ToolCatalog, ToolExecutor};
use voxfab_voice::{BridgeConfig, BridgeEvent, VoiceBridge, backend::ModelBackend};
use voxfab_workflow::WorkflowEngine;

use crate::phantom::PhantomWatcher;
use crate::prompt::{SYSTEM_MARKER, compose_system_prompt, priming_message};

/// Inputs delivered to a session actor by the gateway leg.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    /// Binary PCM16 frame from the client microphone.
    Audio(Vec<u8>),

    /// `user_input` text turn.
    UserText(String),

    /// `end_of_speech` marker.
    EndOfSpeech,

    /// Graceful end (gateway `end_session` or socket close).
    EndSession,
}

/// Outputs a session actor emits toward the gateway leg.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Control frame for the client.
    Server(ServerFrame),

    /// Frame addressed to the gateway itself (memory update, handoff).
    Gateway(GatewayBound),

    /// Binary PCM16 audio for the client (already even-length).
    Audio(Vec<u8>),
}

/// Actor lifecycle state (mirrors the session state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Configured,
    Streaming,
    WaitingTool,
    Ended,
}

/// Everything a session actor needs beyond its channels.
#[derive(Clone)]
pub struct SessionDeps {
    pub agent_id: String,
    pub mode: SessionMode,
    pub backend: Arc<dyn ModelBackend>,
    pub executor: Arc<ToolExecutor>,
    pub catalog: Arc<ToolCatalog>,
    pub workflow: voxfab_core::WorkflowDefinition,
    pub persona: String,
    pub voice_id: Option<String>,
    pub runtime_arn: Option<String>,
    pub phantom: PhantomWatcher,
}

/// The owning task for one live session.
pub struct SessionActor {
    deps: SessionDeps,
    session: Session,
    engine: WorkflowEngine,
    state: RunState,
    outbound: mpsc::Sender<Outbound>,

    // Per-assistant-turn phantom tracking.
    turn_text: String,
    turn_tools: Vec<String>,
}

impl SessionActor {
    /// Build an actor for `session_id` with inherited `memory`.
    #[must_use]
    pub fn new(
        deps: SessionDeps,
        session_id: &str,
        memory: &SessionMemory,
        outbound: mpsc::Sender<Outbound>,
    ) -> Self {
        let mut session = Session::new(session_id, deps.agent_id.clone());
        session.verified_user = memory.verified_user();
        session.user_intent = memory.user_intent.clone();

        let mut engine = WorkflowEngine::new(deps.workflow.clone());
        engine.enter();
        if let Some(graph_state) = &memory.graph_state {
            engine.restore(graph_state);
        }
        session.current_node = engine.current().map(str::to_string);

        Self {
            deps,
            session,
            engine,
            state: RunState::Configured,
            outbound,
            turn_text: String::new(),
            turn_tools: Vec::new(),
        }
    }

    /// Run the session to completion.
    ///
    /// Consumes the actor; returns when the session has ended from any side.
    /// Teardown is unconditional: the bridge is stopped on every exit path.
    pub async fn run(mut self, memory: SessionMemory, mut inputs: mpsc::Receiver<SessionInput>) {
        let mut bridge = VoiceBridge::new(Arc::clone(&self.deps.backend), self.session.id.clone());

        let config = BridgeConfig {
            system_prompt: compose_system_prompt(
                &memory,
                &self.deps.persona,
                &self.deps.catalog,
                &self.engine.describe(),
            ),
            tools: self.deps.catalog.definitions(),
            voice_id: self
                .deps
                .voice_id
                .clone()
                .or_else(|| self.deps.workflow.voice_id.clone()),
            runtime_arn: self.deps.runtime_arn.clone(),
            inference: voxfab_voice::InferenceConfig::default(),
        };
        if let Err(e) = bridge.set_config(config) {
            self.fail_fast(&e.to_string()).await;
            return;
        }

        let mut events = match bridge.start().await {
            Ok(events) => events,
            Err(e) => {
                self.fail_fast(&format!("voice stream failed to open: {e}")).await;
                return;
            }
        };
        self.set_state(RunState::Streaming);
        info!(session_id = %self.session.id, agent = %self.deps.agent_id, "Session streaming");

        // The model never rereads the system prompt after start; inherited
        // state must be primed on the live stream.
        if let Some(priming) = priming_message(&memory) {
            if let Err(e) = bridge.send_text(&priming).await {
                warn!(session_id = %self.session.id, error = %e, "Failed to prime session");
            }
        }

        while self.state != RunState::Ended {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => self.handle_input(&bridge, input).await,
                    None => {
                        debug!(session_id = %self.session.id, "Input channel closed");
                        self.set_state(RunState::Ended);
                    }
                },
                event = events.recv() => match event {
                    Some(event) => self.handle_event(&bridge, event).await,
                    None => {
                        debug!(session_id = %self.session.id, "Bridge event channel closed");
                        self.set_state(RunState::Ended);
                    }
                },
            }
        }

        self.session.usage = bridge.usage().await;
        bridge.stop();
        info!(
            session_id = %self.session.id,
            audio_in = self.session.audio_chunks_in,
            audio_out = self.session.audio_chunks_out,
            total_tokens = self.session.usage.total_tokens,
            "Session ended"
        );
    }

    // ── Input handling (client → model) ────────────────────────────

    async fn handle_input(&mut self, bridge: &VoiceBridge, input: SessionInput) {
        match input {
            SessionInput::Audio(pcm) => {
                if self.deps.mode == SessionMode::Text {
                    debug!(session_id = %self.session.id, "Dropping audio frame in text mode");
                    return;
                }
                self.session.audio_chunks_in += 1;
                if let Err(e) = bridge.send_audio_chunk(pcm).await {
                    self.bridge_failed(&e).await;
                }
            }
            SessionInput::UserText(text) => {
                if let Err(e) = bridge.send_text(&text).await {
                    self.bridge_failed(&e).await;
                }
            }
            SessionInput::EndOfSpeech => {
                if let Err(e) = bridge.end_audio_input().await {
                    self.bridge_failed(&e).await;
                }
            }
            SessionInput::EndSession => {
                self.set_state(RunState::Ended);
            }
        }
    }

    // ── Event handling (model → client/gateway) ────────────────────

    async fn handle_event(&mut self, bridge: &VoiceBridge, event: BridgeEvent) {
        match event {
            BridgeEvent::Audio(bytes) => {
                self.session.audio_chunks_out += 1;
                self.emit(Outbound::Audio(bytes)).await;
            }

            BridgeEvent::Transcript {
                role,
                text,
                is_final,
            } => self.handle_transcript(role, text, is_final).await,

            BridgeEvent::ToolUse {
                tool_name,
                tool_use_id,
                input,
            } => self.handle_tool_use(bridge, tool_name, tool_use_id, input).await,

            BridgeEvent::Metadata(data) => {
                self.emit(Outbound::Server(ServerFrame::Metadata { data })).await;
            }

            BridgeEvent::Interruption(data) => {
                debug!(session_id = %self.session.id, "Barge-in");
                self.emit(Outbound::Server(ServerFrame::Interruption { data })).await;
            }

            BridgeEvent::Usage {
                input_tokens,
                output_tokens,
                total_tokens,
            } => {
                self.session.usage.add(input_tokens, output_tokens, total_tokens);
                self.emit(Outbound::Server(ServerFrame::Usage {
                    input_tokens,
                    output_tokens,
                    total_tokens,
                }))
                .await;
            }

            BridgeEvent::SessionStart(data) => {
                self.emit(Outbound::Server(ServerFrame::SessionStart { data })).await;
            }

            BridgeEvent::ContentStart(data) => {
                self.emit(Outbound::Server(ServerFrame::ContentStart { data })).await;
            }

            BridgeEvent::ContentEnd(data) => {
                self.emit(Outbound::Server(ServerFrame::ContentEnd { data })).await;
            }

            BridgeEvent::InteractionTurnEnd => {
                self.emit(Outbound::Server(ServerFrame::InteractionTurnEnd)).await;
                self.finish_assistant_turn(bridge).await;
            }

            BridgeEvent::Error { message, fatal } => {
                self.emit(Outbound::Server(ServerFrame::error(message.clone()))).await;
                if fatal {
                    warn!(session_id = %self.session.id, %message, "Fatal voice stream error");
                    self.set_state(RunState::Ended);
                }
            }
        }
    }

    async fn handle_transcript(&mut self, role: Role, text: String, is_final: bool) {
        // Internal control turns (and their echoes) never reach the client.
        if text.trim_start().starts_with(SYSTEM_MARKER) {
            debug!(session_id = %self.session.id, "Filtered internal transcript");
            return;
        }

        self.emit(Outbound::Server(ServerFrame::Transcript {
            role,
            text: text.clone(),
            is_final: Some(is_final),
            id: None,
            timestamp: Utc::now().timestamp_millis(),
        }))
        .await;

        if !is_final {
            return;
        }

        match role {
            Role::User => {
                self.session.push_transcript(Role::User, text.clone());

                let newly_classified = self.session.user_intent.is_none();
                if newly_classified {
                    self.session.user_intent = Some(text.clone());
                }

                // Keep the gateway's copy fresh for handoff carry-forward.
                self.emit(Outbound::Gateway(GatewayBound::UpdateMemory {
                    memory: SessionMemory {
                        user_intent: self.session.user_intent.clone(),
                        last_user_message: Some(text),
                        ..SessionMemory::default()
                    },
                }))
                .await;

                self.advance_workflow_on_user_turn();
            }
            Role::Assistant => {
                self.session.push_transcript(Role::Assistant, text.clone());
                self.turn_text.push_str(&text);
                self.turn_text.push(' ');
            }
        }
    }

    async fn handle_tool_use(
        &mut self,
        bridge: &VoiceBridge,
        tool_name: String,
        tool_use_id: String,
        input: serde_json::Value,
    ) {
        self.set_state(RunState::WaitingTool);
        self.turn_tools.push(tool_name.clone());

        self.emit(Outbound::Server(ServerFrame::ToolUse {
            tool_name: tool_name.clone(),
            tool_use_id: tool_use_id.clone(),
            input: input.clone(),
        }))
        .await;

        // Tool-node transitions: the model invoking a tool *is* the
        // conversation reaching that node.
        if let Some(node) = self
            .deps
            .workflow
            .nodes
            .iter()
            .find(|n| n.tool_name.as_deref() == Some(tool_name.as_str()))
        {
            let id = node.id.clone();
            self.engine.transition(&id);
            self.session.current_node = Some(id);
        }

        let snapshot = SessionSnapshot {
            agent_id: self.deps.agent_id.clone(),
            user_intent: self.session.user_intent.clone(),
            verified_user: self.session.verified_user.clone(),
            last_user_message: self.session.last_user_message().map(str::to_string),
            graph_state: Some(self.engine.snapshot()),
        };
        let outcome = self
            .deps
            .executor
            .execute(&snapshot, &tool_name, input, &tool_use_id)
            .await;

        // tool_use then tool_result, in that order, to client and model both.
        self.emit(Outbound::Server(ServerFrame::ToolResult {
            tool_name: tool_name.clone(),
            tool_use_id: tool_use_id.clone(),
            success: outcome.result.success,
            result: outcome.result.result.clone(),
            error: outcome.result.error.clone(),
        }))
        .await;

        if let Some(user) = outcome.verified_user {
            info!(session_id = %self.session.id, user = %user.user_name, "Session verified");
            let mut patch = SessionMemory::default();
            patch.set_verified_user(&user);
            self.session.verified_user = Some(user);
            self.emit(Outbound::Gateway(GatewayBound::UpdateMemory { memory: patch })).await;
        }

        if let Some(handoff) = outcome.handoff.clone() {
            self.emit(Outbound::Gateway(GatewayBound::HandoffRequest {
                target_agent_id: handoff.target_agent_id,
                context: handoff.context,
                graph_state: handoff.graph_state,
            }))
            .await;
        }

        let model_payload = if outcome.result.success {
            outcome.result.result.clone().unwrap_or_else(|| json!({}))
        } else {
            json!({ "error": outcome.result.error })
        };
        if let Err(e) = bridge
            .send_tool_result(&tool_use_id, model_payload, !outcome.result.success)
            .await
        {
            self.bridge_failed(&e).await;
            return;
        }

        if self.state == RunState::WaitingTool {
            self.set_state(RunState::Streaming);
        }
    }

    // ── Turn bookkeeping ───────────────────────────────────────────

    /// Phantom check at the end of an assistant turn: at most one corrective
    /// turn is ever sent for it.
    async fn finish_assistant_turn(&mut self, bridge: &VoiceBridge) {
        if let Some(phantom) = self.deps.phantom.check(&self.turn_text, &self.turn_tools) {
            let correction = PhantomWatcher::correction(&phantom);
            if let Err(e) = bridge.send_text(&correction).await {
                warn!(session_id = %self.session.id, error = %e, "Failed to send phantom correction");
            }
        }
        self.turn_text.clear();
        self.turn_tools.clear();
    }

    /// Deterministic single-edge progression: a user turn moves the session
    /// along when the current node has exactly one way forward.
    fn advance_workflow_on_user_turn(&mut self) {
        let Some(current) = self.engine.current().map(str::to_string) else {
            return;
        };
        let mut edges = self.deps.workflow.edges_from(&current);
        let (Some(only), None) = (edges.next(), edges.next()) else {
            return;
        };
        let to = only.to.clone();
        self.engine.transition(&to);
        self.session.current_node = Some(to);
    }

    // ── Plumbing ───────────────────────────────────────────────────

    async fn emit(&mut self, outbound: Outbound) {
        if self.outbound.send(outbound).await.is_err() {
            // Gateway leg is gone; nothing left to serve.
            self.set_state(RunState::Ended);
        }
    }

    async fn bridge_failed(&mut self, error: &voxfab_voice::BridgeError) {
        warn!(session_id = %self.session.id, error = %error, "Bridge operation failed");
        if error.is_fatal() {
            self.emit(Outbound::Server(ServerFrame::error(error.to_string()))).await;
            self.set_state(RunState::Ended);
        }
    }

    async fn fail_fast(&mut self, message: &str) {
        self.emit(Outbound::Server(ServerFrame::error(message))).await;
        self.set_state(RunState::Ended);
    }

    fn set_state(&mut self, state: RunState) {
        if self.state != state {
            debug!(session_id = %self.session.id, from = ?self.state, to = ?state, "Session state");
            self.state = state;
        }
    }
}
