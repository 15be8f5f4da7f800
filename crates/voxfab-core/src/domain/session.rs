//! Session state owned by the agent runtime.
//!
//! A session is one logical end-to-end conversation with a stable
//! identifier, possibly spanning multiple agents via handoff. The `Session`
//! struct here is the *agent-local* view; cross-agent state lives in
//! [`crate::domain::memory::SessionMemory`] and travels through the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mint a fresh opaque session identifier.
///
/// Used by the gateway when a client connects without announcing one.
#[must_use]
pub fn mint_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Operating mode of an agent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Bidirectional audio; binary PCM16 frames in both directions.
    #[default]
    Voice,

    /// Text turns only; no audio leg is opened.
    Text,

    /// Audio plus text interjections (`user_input` frames mid-stream).
    Hybrid,
}

/// Speaker role on a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One ordered transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
    /// Epoch milliseconds.
    pub ts: i64,
    /// Whether this entry is a finalised (non-streaming) transcript.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
}

/// Identity established by a successful verification tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedUser {
    pub user_name: String,
    pub account: String,
    pub sort_code: String,
}

/// Token usage accumulated over the lifetime of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounters {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl UsageCounters {
    /// Fold one usage event into the running counters.
    pub const fn add(&mut self, input: u64, output: u64, total: u64) {
        self.input_tokens += input;
        self.output_tokens += output;
        self.total_tokens += total;
    }
}

/// Agent-local state for one live session.
///
/// Invariant: a session id maps to at most one `Session` across the whole
/// fabric at any instant; the gateway enforces this by closing the
/// predecessor leg before opening a successor during handoff.
#[derive(Debug, Clone)]
pub struct Session {
    /// Stable opaque identifier, reused across handoffs.
    pub id: String,

    /// Id of the agent currently owning this session.
    pub agent_id: String,

    /// Ordered conversation transcript (final entries only).
    pub transcript: Vec<TranscriptEntry>,

    /// Current workflow node, once the graph has been entered.
    pub current_node: Option<String>,

    /// Identity record, present after successful verification.
    pub verified_user: Option<VerifiedUser>,

    /// Free-form classification of what the user wants.
    pub user_intent: Option<String>,

    /// Accumulated token usage.
    pub usage: UsageCounters,

    /// Count of inbound (client → model) audio chunks.
    pub audio_chunks_in: u64,

    /// Count of outbound (model → client) audio chunks.
    pub audio_chunks_out: u64,

    /// Wall-clock session start.
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session owned by `agent_id`.
    #[must_use]
    pub fn new(id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent_id: agent_id.into(),
            transcript: Vec::new(),
            current_node: None,
            verified_user: None,
            user_intent: None,
            usage: UsageCounters::default(),
            audio_chunks_in: 0,
            audio_chunks_out: 0,
            started_at: Utc::now(),
        }
    }

    /// Append a finalised transcript entry.
    pub fn push_transcript(&mut self, role: Role, text: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            role,
            text: text.into(),
            ts: Utc::now().timestamp_millis(),
            is_final: Some(true),
        });
    }

    /// Most recent user utterance, if any.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&str> {
        self.transcript
            .iter()
            .rev()
            .find(|e| e.role == Role::User)
            .map(|e| e.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_are_unique() {
        assert_ne!(mint_session_id(), mint_session_id());
    }

    #[test]
    fn last_user_message_skips_assistant_turns() {
        let mut session = Session::new("s-1", "triage");
        assert_eq!(session.last_user_message(), None);

        session.push_transcript(Role::User, "I want my balance");
        session.push_transcript(Role::Assistant, "Let me help with that");
        assert_eq!(session.last_user_message(), Some("I want my balance"));
    }

    #[test]
    fn usage_counters_accumulate() {
        let mut usage = UsageCounters::default();
        usage.add(10, 20, 30);
        usage.add(1, 2, 3);
        assert_eq!(usage.input_tokens, 11);
        assert_eq!(usage.output_tokens, 22);
        assert_eq!(usage.total_tokens, 33);
    }

    #[test]
    fn session_mode_wire_names_are_lowercase() {
        assert_eq!(
            serde_json::to_string(&SessionMode::Hybrid).unwrap(),
            "\"hybrid\""
        );
    }
}
