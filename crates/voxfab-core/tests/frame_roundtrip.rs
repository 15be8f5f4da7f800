//! Round-trip identity tests for the control-frame codec.
//!
//! Encoding then decoding any control frame must yield the original frame.
//! These cover every variant of each vocabulary, including the payloads
//! with flattened extension maps.

use serde_json::{Map, json};

use voxfab_core::domain::memory::SessionMemory;
use voxfab_core::domain::session::Role;
use voxfab_core::domain::tool::HandoffContext;
use voxfab_core::{AgentBound, ClientFrame, GatewayBound, ServerFrame};

fn map(pairs: &[(&str, serde_json::Value)]) -> Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

#[test]
fn client_frames_round_trip() {
    let frames = vec![
        ClientFrame::SelectWorkflow {
            workflow_id: "triage".into(),
        },
        ClientFrame::SessionInit {
            session_id: Some("s-42".into()),
            memory: Some(SessionMemory {
                user_intent: Some("balance".into()),
                ..SessionMemory::default()
            }),
        },
        ClientFrame::SessionInit {
            session_id: None,
            memory: None,
        },
        ClientFrame::UserInput {
            text: "my account is 12345678".into(),
        },
        ClientFrame::EndOfSpeech,
        ClientFrame::Ping,
    ];

    for frame in frames {
        let text = frame.encode().expect("encode");
        let back = ClientFrame::decode(&text).expect("decode");
        assert_eq!(back, frame, "round-trip changed {text}");
    }
}

#[test]
fn server_frames_round_trip() {
    let frames = vec![
        ServerFrame::Connected {
            session_id: "s-42".into(),
            timestamp: 1_722_470_400_000,
        },
        ServerFrame::Transcript {
            role: Role::Assistant,
            text: "How can I help?".into(),
            is_final: Some(true),
            id: Some("t-1".into()),
            timestamp: 1_722_470_401_000,
        },
        ServerFrame::ToolUse {
            tool_name: "agentcore_balance".into(),
            tool_use_id: "u-7".into(),
            input: json!({"account": "12345678"}),
        },
        ServerFrame::ToolResult {
            tool_name: "agentcore_balance".into(),
            tool_use_id: "u-7".into(),
            success: true,
            result: Some(json!({"balance": 1042.17})),
            error: None,
        },
        ServerFrame::HandoffRequest {
            target_agent_id: "banking".into(),
            context: HandoffContext {
                from_agent: "triage".into(),
                reason: "User needs specialist assistance".into(),
                ..HandoffContext::default()
            },
            graph_state: Some(json!({"currentNodeId": "n3"})),
        },
        ServerFrame::HandoffEvent {
            from: "triage".into(),
            to: "banking".into(),
        },
        ServerFrame::Metadata {
            data: map(&[("sentiment", json!("positive"))]),
        },
        ServerFrame::Interruption { data: Map::new() },
        ServerFrame::Usage {
            input_tokens: 120,
            output_tokens: 48,
            total_tokens: 168,
        },
        ServerFrame::error("target agent unreachable: banking"),
        ServerFrame::SessionStart { data: Map::new() },
        ServerFrame::ContentStart {
            data: map(&[("role", json!("assistant"))]),
        },
        ServerFrame::ContentEnd { data: Map::new() },
        ServerFrame::InteractionTurnEnd,
    ];

    for frame in frames {
        let text = frame.encode().expect("encode");
        let back = ServerFrame::decode(&text).expect("decode");
        assert_eq!(back, frame, "round-trip changed {text}");
    }
}

#[test]
fn gateway_legs_round_trip() {
    let agent_bound = vec![
        AgentBound::SessionInit {
            session_id: "s-42".into(),
            memory: SessionMemory {
                verified: Some(true),
                user_name: Some("Sarah Johnson".into()),
                account: Some("12345678".into()),
                sort_code: Some("112233".into()),
                ..SessionMemory::default()
            },
            trace_id: "trace-1".into(),
            timestamp: 1_722_470_400_000,
        },
        AgentBound::EndSession {
            session_id: "s-42".into(),
        },
    ];
    for frame in agent_bound {
        let text = frame.encode().expect("encode");
        assert_eq!(AgentBound::decode(&text).expect("decode"), frame);
    }

    let gateway_bound = vec![
        GatewayBound::UpdateMemory {
            memory: SessionMemory {
                user_intent: Some("dispute".into()),
                ..SessionMemory::default()
            },
        },
        GatewayBound::HandoffRequest {
            target_agent_id: "idv".into(),
            context: HandoffContext {
                from_agent: "triage".into(),
                reason: "identity check".into(),
                ..HandoffContext::default()
            },
            graph_state: None,
        },
    ];
    for frame in gateway_bound {
        let text = frame.encode().expect("encode");
        assert_eq!(GatewayBound::decode(&text).expect("decode"), frame);
    }
}

#[test]
fn wire_field_names_are_camel_case() {
    let frame = ServerFrame::ToolUse {
        tool_name: "perform_idv_check".into(),
        tool_use_id: "u-1".into(),
        input: json!({}),
    };
    let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
    assert_eq!(value["type"], "tool_use");
    assert!(value.get("toolName").is_some());
    assert!(value.get("toolUseId").is_some());
}
