//! Typed JSON control frames for every connection leg.
//!
//! Four closed vocabularies, one per direction that carries control frames:
//!
//! - [`ClientFrame`] — browser → gateway (and forwarded verbatim to agents)
//! - [`ServerFrame`] — gateway/agent → browser
//! - [`AgentBound`] — gateway → agent (session control)
//! - [`GatewayBound`] — agent → gateway (intercepted, never reaches clients)
//!
//! Decoding distinguishes malformed JSON (callers answer with an `error`
//! frame) from a well-formed frame of unknown `type` (callers ignore and
//! log). Encoding then decoding any frame is the identity — integration
//! tests in `tests/frame_roundtrip.rs` hold the codec to that.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::domain::memory::SessionMemory;
use crate::domain::session::Role;
use crate::domain::tool::HandoffContext;

/// Frame codec failure.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Not valid JSON, not an object, or missing/invalid fields for a known type.
    #[error("malformed control frame: {0}")]
    Malformed(String),

    /// Well-formed JSON object whose `type` is not in this leg's vocabulary.
    #[error("unknown control frame type `{0}`")]
    UnknownType(String),

    /// A frame failed to serialize (unrepresentable payload).
    #[error("failed to encode control frame: {0}")]
    Encode(String),
}

/// Decode a tagged control frame, classifying failures per the taxonomy.
fn decode_tagged<T: DeserializeOwned>(
    text: &str,
    known: &'static [&'static str],
) -> Result<T, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let Some(ty) = value.get("type").and_then(Value::as_str) else {
        return Err(ProtocolError::Malformed(
            "control frame missing `type` field".to_string(),
        ));
    };
    if !known.contains(&ty) {
        return Err(ProtocolError::UnknownType(ty.to_string()));
    }
    let ty = ty.to_string();
    serde_json::from_value(value)
        .map_err(|e| ProtocolError::Malformed(format!("invalid `{ty}` frame: {e}")))
}

fn encode_tagged<T: Serialize>(frame: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(frame).map_err(|e| ProtocolError::Encode(e.to_string()))
}

// ── Client → gateway ───────────────────────────────────────────────

/// Control frames a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Choose the initial agent before binding.
    #[serde(rename_all = "camelCase")]
    SelectWorkflow { workflow_id: String },

    /// Resume or initialise an explicit session.
    #[serde(rename_all = "camelCase")]
    SessionInit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        memory: Option<SessionMemory>,
    },

    /// Inject a text turn (text mode or hybrid interjection).
    UserInput { text: String },

    /// Mark end of the user utterance.
    EndOfSpeech,

    /// Liveness probe.
    Ping,
}

impl ClientFrame {
    /// Wire `type` values of this vocabulary.
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "select_workflow",
        "session_init",
        "user_input",
        "end_of_speech",
        "ping",
    ];

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        decode_tagged(text, Self::KNOWN_TYPES)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_tagged(self)
    }
}

// ── Gateway/agent → client ─────────────────────────────────────────

/// Control frames delivered to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    Connected { session_id: String, timestamp: i64 },

    #[serde(rename_all = "camelCase")]
    Transcript {
        role: Role,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_final: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        timestamp: i64,
    },

    #[serde(rename_all = "camelCase")]
    ToolUse {
        tool_name: String,
        tool_use_id: String,
        input: Value,
    },

    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_name: String,
        tool_use_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    HandoffRequest {
        target_agent_id: String,
        context: HandoffContext,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        graph_state: Option<Value>,
    },

    /// One per completed transition; drives the voice-id swap in the UI.
    HandoffEvent { from: String, to: String },

    Metadata {
        #[serde(flatten)]
        data: Map<String, Value>,
    },

    /// Barge-in marker.
    Interruption {
        #[serde(flatten)]
        data: Map<String, Value>,
    },

    #[serde(rename_all = "camelCase")]
    Usage {
        input_tokens: u64,
        output_tokens: u64,
        total_tokens: u64,
    },

    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },

    // Lifecycle markers. The mixed naming below is the wire contract.
    SessionStart {
        #[serde(flatten)]
        data: Map<String, Value>,
    },

    #[serde(rename = "contentStart")]
    ContentStart {
        #[serde(flatten)]
        data: Map<String, Value>,
    },

    #[serde(rename = "contentEnd")]
    ContentEnd {
        #[serde(flatten)]
        data: Map<String, Value>,
    },

    #[serde(rename = "interactionTurnEnd")]
    InteractionTurnEnd,
}

impl ServerFrame {
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "connected",
        "transcript",
        "tool_use",
        "tool_result",
        "handoff_request",
        "handoff_event",
        "metadata",
        "interruption",
        "usage",
        "error",
        "session_start",
        "contentStart",
        "contentEnd",
        "interactionTurnEnd",
    ];

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        decode_tagged(text, Self::KNOWN_TYPES)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_tagged(self)
    }

    /// Shorthand for an error frame with no details.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            details: None,
        }
    }
}

// ── Gateway → agent ────────────────────────────────────────────────

/// Session-control frames the gateway sends to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentBound {
    /// Bind a session to this agent, carrying inherited memory.
    #[serde(rename_all = "camelCase")]
    SessionInit {
        session_id: String,
        #[serde(default)]
        memory: SessionMemory,
        trace_id: String,
        timestamp: i64,
    },

    /// Gracefully end the agent's leg of the session (handoff or teardown).
    #[serde(rename_all = "camelCase")]
    EndSession { session_id: String },
}

impl AgentBound {
    pub const KNOWN_TYPES: &'static [&'static str] = &["session_init", "end_session"];

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        decode_tagged(text, Self::KNOWN_TYPES)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_tagged(self)
    }
}

// ── Agent → gateway ────────────────────────────────────────────────

/// Frames addressed to the gateway itself; intercepted, never proxied on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayBound {
    /// Merge a patch into the session memory store.
    UpdateMemory { memory: SessionMemory },

    /// Move the session to another agent.
    #[serde(rename_all = "camelCase")]
    HandoffRequest {
        target_agent_id: String,
        context: HandoffContext,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        graph_state: Option<Value>,
    },
}

impl GatewayBound {
    pub const KNOWN_TYPES: &'static [&'static str] = &["update_memory", "handoff_request"];

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        decode_tagged(text, Self::KNOWN_TYPES)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_tagged(self)
    }

    /// Classify a text frame on the agent → client path.
    ///
    /// Returns `Some` for frames the gateway must intercept, `None` for
    /// anything that should be proxied verbatim (including frames that do
    /// not parse — the agent leg is trusted and pass-through is cheaper
    /// than re-encoding).
    #[must_use]
    pub fn intercept(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let ty = value.get("type").and_then(Value::as_str)?;
        if !Self::KNOWN_TYPES.contains(&ty) {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_json_is_malformed_not_unknown() {
        let err = ClientFrame::decode("{not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn missing_type_field_is_malformed() {
        let err = ClientFrame::decode(r#"{"text":"hi"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn unknown_type_is_reported_as_unknown() {
        let err = ClientFrame::decode(r#"{"type":"telemetry","x":1}"#).unwrap_err();
        match err {
            ProtocolError::UnknownType(ty) => assert_eq!(ty, "telemetry"),
            other => panic!("expected UnknownType, got {other:?}"),
        }
    }

    #[test]
    fn known_type_with_bad_fields_is_malformed() {
        let err = ClientFrame::decode(r#"{"type":"user_input"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn lifecycle_tags_use_wire_casing() {
        let text = ServerFrame::InteractionTurnEnd.encode().unwrap();
        assert_eq!(text, r#"{"type":"interactionTurnEnd"}"#);

        let frame = ServerFrame::ContentStart { data: Map::new() };
        assert_eq!(frame.encode().unwrap(), r#"{"type":"contentStart"}"#);
    }

    #[test]
    fn intercept_picks_out_gateway_bound_frames_only() {
        let handoff = json!({
            "type": "handoff_request",
            "targetAgentId": "banking",
            "context": {"fromAgent": "triage", "reason": "balance"}
        })
        .to_string();
        assert!(GatewayBound::intercept(&handoff).is_some());

        let transcript = json!({
            "type": "transcript",
            "role": "assistant",
            "text": "hello",
            "timestamp": 0
        })
        .to_string();
        assert!(GatewayBound::intercept(&transcript).is_none());
        assert!(GatewayBound::intercept("{broken").is_none());
    }

    #[test]
    fn session_init_defaults_missing_memory_to_empty() {
        let frame = AgentBound::decode(
            r#"{"type":"session_init","sessionId":"s-1","traceId":"t-1","timestamp":0}"#,
        )
        .unwrap();
        match frame {
            AgentBound::SessionInit { memory, .. } => assert!(memory.is_empty()),
            other => panic!("unexpected frame {other:?}"),
        }
    }
}
