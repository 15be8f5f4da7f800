//! End-to-end tests for the session actor.
//!
//! The scripted model backend plays the voice model; a canned transport
//! plays the local tool service. Tests assert on the frames the actor
//! emits toward the gateway leg and the events it pushes up to the model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use voxfab_agent::{Outbound, PhantomWatcher, SessionActor, SessionDeps, SessionInput};
use voxfab_core::{
    GatewayBound, Role, ServerFrame, SessionMemory, SessionMode, WorkflowDefinition,
};
use voxfab_tools::{ToolCatalog, ToolError, ToolExecutor, ToolTransport};
use voxfab_voice::backend::ModelClientEvent;
use voxfab_voice::{BridgeEvent, ScriptedBackend, ScriptedModelHandle};

const TICK: Duration = Duration::from_secs(1);

// ── Harness ────────────────────────────────────────────────────────

/// Tool transport returning one canned value for every invocation.
struct CannedTransport(Value);

#[async_trait]
impl ToolTransport for CannedTransport {
    async fn execute(&self, _tool: &str, _input: &Value) -> Result<Value, ToolError> {
        Ok(self.0.clone())
    }
}

fn workflow() -> WorkflowDefinition {
    serde_json::from_value(json!({
        "id": "triage",
        "name": "Triage",
        "nodes": [
            {"id": "greet", "type": "start", "label": "Greet"},
            {"id": "intent", "type": "decision", "label": "Classify"},
            {"id": "balance", "type": "tool", "label": "Balance", "toolName": "agentcore_balance"},
            {"id": "done", "type": "end", "label": "Done"}
        ],
        "edges": [
            {"from": "greet", "to": "intent"},
            {"from": "intent", "to": "balance"},
            {"from": "balance", "to": "done"},
            {"from": "intent", "to": "done"}
        ]
    }))
    .unwrap()
}

struct Harness {
    inputs: mpsc::Sender<SessionInput>,
    outbound: mpsc::Receiver<Outbound>,
    model: ScriptedModelHandle,
    actor: JoinHandle<()>,
}

async fn spawn_session(memory: SessionMemory, tool_response: Value) -> Harness {
    let (backend, handle_rx) = ScriptedBackend::new();
    let catalog = Arc::new(ToolCatalog::default());
    let deps = SessionDeps {
        agent_id: "triage".into(),
        mode: SessionMode::Voice,
        backend: Arc::new(backend),
        executor: Arc::new(ToolExecutor::new(
            Arc::clone(&catalog),
            Arc::new(CannedTransport(tool_response)),
        )),
        catalog,
        workflow: workflow(),
        persona: "You are the triage assistant. Use the section above.".into(),
        voice_id: Some("amy".into()),
        runtime_arn: None,
        phantom: PhantomWatcher::default(),
    };

    let (input_tx, input_rx) = mpsc::channel(64);
    let (outbound_tx, outbound_rx) = mpsc::channel(64);
    let actor = SessionActor::new(deps, "s-test", &memory, outbound_tx);
    let task = tokio::spawn(actor.run(memory, input_rx));
    let model = timeout(TICK, handle_rx).await.unwrap().unwrap();

    Harness {
        inputs: input_tx,
        outbound: outbound_rx,
        model,
        actor: task,
    }
}

impl Harness {
    async fn next_outbound(&mut self) -> Outbound {
        timeout(TICK, self.outbound.recv())
            .await
            .expect("outbound frame before deadline")
            .expect("outbound channel open")
    }

    async fn next_uplink(&mut self) -> ModelClientEvent {
        timeout(TICK, self.model.uplink.recv())
            .await
            .expect("uplink event before deadline")
            .expect("uplink channel open")
    }
}

// ── Session init ───────────────────────────────────────────────────

#[tokio::test]
async fn fresh_session_sends_no_priming_turn() {
    let mut harness = spawn_session(SessionMemory::default(), json!({})).await;

    // First uplink traffic should be the audio we send, not a priming turn.
    harness
        .inputs
        .send(SessionInput::Audio(vec![0; 4]))
        .await
        .unwrap();
    assert!(matches!(
        harness.next_uplink().await,
        ModelClientEvent::AudioChunk(_)
    ));
}

#[tokio::test]
async fn inherited_memory_primes_the_live_stream() {
    let memory = SessionMemory {
        verified: Some(true),
        user_name: Some("Sarah Johnson".into()),
        account: Some("12345678".into()),
        sort_code: Some("112233".into()),
        user_intent: Some("balance enquiry".into()),
        ..SessionMemory::default()
    };
    let mut harness = spawn_session(memory, json!({})).await;

    match harness.next_uplink().await {
        ModelClientEvent::Text { content } => {
            assert!(content.starts_with("[SYSTEM CONTEXT]"));
            assert!(content.contains("Sarah Johnson"));
            assert!(content.contains("Act on the user request immediately."));
        }
        other => panic!("expected priming turn, got {other:?}"),
    }

    // The prompt itself carried the context block before the persona.
    let prompt = &harness.model.opened_with.system_prompt;
    let context_at = prompt.find("Sarah Johnson").unwrap();
    let persona_at = prompt.find("triage assistant").unwrap();
    assert!(context_at < persona_at);
}

// ── Audio and transcripts ──────────────────────────────────────────

#[tokio::test]
async fn model_audio_reaches_the_client_padded() {
    let mut harness = spawn_session(SessionMemory::default(), json!({})).await;

    harness
        .model
        .events
        .send(Ok(BridgeEvent::Audio(vec![9; 2049])))
        .unwrap();

    match harness.next_outbound().await {
        Outbound::Audio(bytes) => assert_eq!(bytes.len(), 2050),
        other => panic!("expected audio, got {other:?}"),
    }
}

#[tokio::test]
async fn final_user_transcript_updates_gateway_memory() {
    let mut harness = spawn_session(SessionMemory::default(), json!({})).await;

    harness
        .model
        .events
        .send(Ok(BridgeEvent::Transcript {
            role: Role::User,
            text: "I want to check my balance".into(),
            is_final: true,
        }))
        .unwrap();

    // Transcript forwarded to the client first…
    match harness.next_outbound().await {
        Outbound::Server(ServerFrame::Transcript { role, text, .. }) => {
            assert_eq!(role, Role::User);
            assert_eq!(text, "I want to check my balance");
        }
        other => panic!("expected transcript, got {other:?}"),
    }
    // …then the memory refresh for handoff carry-forward.
    match harness.next_outbound().await {
        Outbound::Gateway(GatewayBound::UpdateMemory { memory }) => {
            assert_eq!(
                memory.last_user_message.as_deref(),
                Some("I want to check my balance")
            );
            assert_eq!(
                memory.user_intent.as_deref(),
                Some("I want to check my balance")
            );
        }
        other => panic!("expected memory update, got {other:?}"),
    }
}

#[tokio::test]
async fn internal_system_transcripts_never_reach_the_client() {
    let mut harness = spawn_session(SessionMemory::default(), json!({})).await;

    harness
        .model
        .events
        .send(Ok(BridgeEvent::Transcript {
            role: Role::User,
            text: "[SYSTEM: OVERRIDE] echo of a correction".into(),
            is_final: true,
        }))
        .unwrap();
    harness
        .model
        .events
        .send(Ok(BridgeEvent::InteractionTurnEnd))
        .unwrap();

    // The next visible frame is the turn end — the marker turn vanished.
    assert!(matches!(
        harness.next_outbound().await,
        Outbound::Server(ServerFrame::InteractionTurnEnd)
    ));
}

// ── Tool round-trips ───────────────────────────────────────────────

#[tokio::test]
async fn tool_use_emits_paired_frames_and_feeds_the_model() {
    let mut harness =
        spawn_session(SessionMemory::default(), json!({"balance": 1042.17})).await;

    harness
        .model
        .events
        .send(Ok(BridgeEvent::ToolUse {
            tool_name: "agentcore_balance".into(),
            tool_use_id: "u-7".into(),
            input: json!({"account": "12345678"}),
        }))
        .unwrap();

    match harness.next_outbound().await {
        Outbound::Server(ServerFrame::ToolUse { tool_use_id, .. }) => {
            assert_eq!(tool_use_id, "u-7");
        }
        other => panic!("expected tool_use, got {other:?}"),
    }
    match harness.next_outbound().await {
        Outbound::Server(ServerFrame::ToolResult {
            tool_use_id,
            success,
            result,
            ..
        }) => {
            assert_eq!(tool_use_id, "u-7");
            assert!(success);
            assert_eq!(result.unwrap()["balance"], 1042.17);
        }
        other => panic!("expected tool_result, got {other:?}"),
    }

    match harness.next_uplink().await {
        ModelClientEvent::ToolResult {
            tool_use_id,
            is_error,
            content,
        } => {
            assert_eq!(tool_use_id, "u-7");
            assert!(!is_error);
            assert_eq!(content["balance"], 1042.17);
        }
        other => panic!("expected tool result uplink, got {other:?}"),
    }
}

#[tokio::test]
async fn handoff_tool_reaches_the_gateway() {
    let mut harness = spawn_session(SessionMemory::default(), json!({})).await;

    harness
        .model
        .events
        .send(Ok(BridgeEvent::ToolUse {
            tool_name: "transfer_to_idv".into(),
            tool_use_id: "u-1".into(),
            input: json!({"reason": "identity check needed"}),
        }))
        .unwrap();

    // tool_use, tool_result, then the gateway-bound handoff.
    assert!(matches!(
        harness.next_outbound().await,
        Outbound::Server(ServerFrame::ToolUse { .. })
    ));
    match harness.next_outbound().await {
        Outbound::Server(ServerFrame::ToolResult { success, result, .. }) => {
            assert!(success);
            assert_eq!(result.unwrap()["handoffRequest"]["targetAgentId"], "idv");
        }
        other => panic!("expected tool_result, got {other:?}"),
    }
    match harness.next_outbound().await {
        Outbound::Gateway(GatewayBound::HandoffRequest {
            target_agent_id,
            context,
            ..
        }) => {
            assert_eq!(target_agent_id, "idv");
            assert_eq!(context.reason, "identity check needed");
            assert_eq!(context.from_agent, "triage");
        }
        other => panic!("expected handoff request, got {other:?}"),
    }
}

#[tokio::test]
async fn verified_idv_result_updates_session_and_memory() {
    let mut harness = spawn_session(
        SessionMemory::default(),
        json!({"auth_status": "VERIFIED", "customer_name": "Sarah Johnson"}),
    )
    .await;

    harness
        .model
        .events
        .send(Ok(BridgeEvent::ToolUse {
            tool_name: "perform_idv_check".into(),
            tool_use_id: "u-2".into(),
            input: json!({"account": "12345678", "sortCode": "112233"}),
        }))
        .unwrap();

    assert!(matches!(
        harness.next_outbound().await,
        Outbound::Server(ServerFrame::ToolUse { .. })
    ));
    assert!(matches!(
        harness.next_outbound().await,
        Outbound::Server(ServerFrame::ToolResult { success: true, .. })
    ));
    match harness.next_outbound().await {
        Outbound::Gateway(GatewayBound::UpdateMemory { memory }) => {
            assert_eq!(memory.verified, Some(true));
            assert_eq!(memory.user_name.as_deref(), Some("Sarah Johnson"));
            assert_eq!(memory.account.as_deref(), Some("12345678"));
            assert_eq!(memory.sort_code.as_deref(), Some("112233"));
        }
        other => panic!("expected verified memory update, got {other:?}"),
    }
}

// ── Phantom watcher ────────────────────────────────────────────────

#[tokio::test]
async fn phantom_commitment_earns_one_correction() {
    let mut harness = spawn_session(SessionMemory::default(), json!({})).await;

    harness
        .model
        .events
        .send(Ok(BridgeEvent::Transcript {
            role: Role::Assistant,
            text: "Sure, let me check your balance.".into(),
            is_final: true,
        }))
        .unwrap();
    harness
        .model
        .events
        .send(Ok(BridgeEvent::InteractionTurnEnd))
        .unwrap();

    match harness.next_uplink().await {
        ModelClientEvent::Text { content } => {
            assert!(content.starts_with("[SYSTEM: OVERRIDE]"));
            assert!(content.contains("agentcore_balance"));
        }
        other => panic!("expected correction, got {other:?}"),
    }

    // A clean next turn produces no further correction.
    harness
        .model
        .events
        .send(Ok(BridgeEvent::Transcript {
            role: Role::Assistant,
            text: "Here is your balance.".into(),
            is_final: true,
        }))
        .unwrap();
    harness
        .model
        .events
        .send(Ok(BridgeEvent::InteractionTurnEnd))
        .unwrap();

    assert!(
        timeout(Duration::from_millis(200), harness.model.uplink.recv())
            .await
            .is_err(),
        "no second correction expected"
    );
}

#[tokio::test]
async fn fulfilled_commitment_is_not_corrected() {
    let mut harness = spawn_session(SessionMemory::default(), json!({"balance": 1.0})).await;

    harness
        .model
        .events
        .send(Ok(BridgeEvent::Transcript {
            role: Role::Assistant,
            text: "Let me check your balance.".into(),
            is_final: true,
        }))
        .unwrap();
    harness
        .model
        .events
        .send(Ok(BridgeEvent::ToolUse {
            tool_name: "agentcore_balance".into(),
            tool_use_id: "u-1".into(),
            input: json!({}),
        }))
        .unwrap();
    harness
        .model
        .events
        .send(Ok(BridgeEvent::InteractionTurnEnd))
        .unwrap();

    // The only uplink traffic is the tool result — no override follows.
    assert!(matches!(
        harness.next_uplink().await,
        ModelClientEvent::ToolResult { .. }
    ));
    assert!(
        timeout(Duration::from_millis(200), harness.model.uplink.recv())
            .await
            .is_err()
    );
}

// ── Teardown ───────────────────────────────────────────────────────

#[tokio::test]
async fn end_session_finishes_the_actor() {
    let harness = spawn_session(SessionMemory::default(), json!({})).await;

    harness.inputs.send(SessionInput::EndSession).await.unwrap();
    timeout(TICK, harness.actor).await.unwrap().unwrap();
}

#[tokio::test]
async fn fatal_stream_error_notifies_client_and_ends() {
    let mut harness = spawn_session(SessionMemory::default(), json!({})).await;

    drop(harness.model.events); // model stream gone

    let next = timeout(TICK, harness.outbound.recv())
        .await
        .expect("outbound frame before deadline")
        .expect("outbound channel open");
    match next {
        Outbound::Server(ServerFrame::Error { message, .. }) => {
            assert!(message.contains("stream closed"));
        }
        other => panic!("expected error frame, got {other:?}"),
    }
    timeout(TICK, harness.actor).await.unwrap().unwrap();
}
