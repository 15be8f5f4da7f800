//! Tool records and the closed dispatch classification.
//!
//! Tool names are classified **once, at load time**, into a closed tagged
//! variant; the executor pattern-matches at call time and never re-parses
//! name strings mid-conversation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix marking a handoff tool targeting a specific agent.
pub const TRANSFER_PREFIX: &str = "transfer_to_";

/// Handoff tool returning the session to triage.
pub const RETURN_TO_TRIAGE: &str = "return_to_triage";

/// Knowledge-base lookup tool.
pub const KNOWLEDGE_BASE_TOOL: &str = "search_knowledge_base";

/// Tools dispatched to the remote agent runtime, by name.
pub const RUNTIME_TOOLS: &[&str] = &[
    "perform_idv_check",
    "agentcore_balance",
    "get_account_transactions",
    "create_dispute_case",
    "lookup_merchant_alias",
];

/// A normalised tool record.
///
/// Loaders accept `input_schema`, `inputSchema`, or `parameters` on disk and
/// normalise to this single shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-schema description of the expected input object.
    pub input_schema: Value,
}

/// The two flavours of handoff tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffTool {
    /// `transfer_to_<handle>`; the handle is resolved against the registry.
    Transfer { handle: String },
    /// `return_to_triage`; requires `taskCompleted` in the input.
    ReturnToTriage,
}

/// Closed classification of a tool name. First match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolKind {
    Handoff(HandoffTool),
    /// Member of the runtime allow-list; dispatched over local tool HTTP.
    Runtime,
    KnowledgeBase,
    /// Anything else; default remote dispatch.
    Remote,
}

impl ToolKind {
    /// Classify a tool name. Deterministic; order matters.
    #[must_use]
    pub fn classify(name: &str) -> Self {
        if name == RETURN_TO_TRIAGE {
            return Self::Handoff(HandoffTool::ReturnToTriage);
        }
        if let Some(handle) = name.strip_prefix(TRANSFER_PREFIX) {
            if !handle.is_empty() {
                return Self::Handoff(HandoffTool::Transfer {
                    handle: handle.to_string(),
                });
            }
        }
        if RUNTIME_TOOLS.contains(&name) {
            return Self::Runtime;
        }
        if name == KNOWLEDGE_BASE_TOOL {
            return Self::KnowledgeBase;
        }
        Self::Remote
    }

    /// True for either handoff flavour.
    #[must_use]
    pub const fn is_handoff(&self) -> bool {
        matches!(self, Self::Handoff(_))
    }
}

/// Result of a tool invocation, as surfaced to both model and client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Successful result carrying a payload.
    #[must_use]
    pub const fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Failed result carrying an error message.
    #[must_use]
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Context travelling with a handoff, consumed by gateway and successor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HandoffContext {
    /// Id of the agent requesting the handoff.
    pub from_agent: String,

    /// Why the session is moving.
    pub reason: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_user_message: Option<String>,

    /// Set on `return_to_triage`: what the specialist finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_completed: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// True when the handoff is a return to triage.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_return: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A request, emitted by the tool executor, to move the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffRequest {
    /// Registry id or handoff alias of the successor.
    pub target_agent_id: String,

    pub context: HandoffContext,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_state: Option<Value>,
}
