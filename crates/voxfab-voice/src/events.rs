//! Events emitted by the voice bridge to the agent runtime.

use serde_json::{Map, Value};

use voxfab_core::Role;

/// One event on a bridge session's ordered downstream channel.
///
/// The closed set mirrors the model stream's vocabulary; the bridge
/// guarantees emission order and the even-length invariant on `Audio`
/// payloads, and accumulates `Usage` into the session counters before
/// forwarding.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// Downstream PCM16 audio (already padded to even length).
    Audio(Vec<u8>),

    /// A user or assistant transcript segment.
    Transcript {
        role: Role,
        text: String,
        is_final: bool,
    },

    /// The model wants a tool invoked.
    ToolUse {
        tool_name: String,
        tool_use_id: String,
        input: Value,
    },

    /// Sentiment, language detection, and other model annotations.
    Metadata(Map<String, Value>),

    /// Barge-in: the user started speaking over the model.
    Interruption(Map<String, Value>),

    /// Token usage for the latest exchange.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
        total_tokens: u64,
    },

    /// Model acknowledged the session.
    SessionStart(Map<String, Value>),

    ContentStart(Map<String, Value>),

    ContentEnd(Map<String, Value>),

    /// The model finished its side of the interaction turn.
    InteractionTurnEnd,

    /// Stream-level error. Fatal errors end the session.
    Error { message: String, fatal: bool },
}
