//! Model stream backends.
//!
//! A backend opens one bidirectional stream per session and hands back the
//! two halves separately, so the bridge can pump each direction from its
//! own task without sharing a connection object across them.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::events::BridgeEvent;

pub mod scripted;
pub mod ws;

/// Events the bridge pushes up to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelClientEvent {
    /// A chunk of user audio (PCM16, already even-length).
    AudioChunk(Vec<u8>),

    /// A user-role text turn.
    Text { content: String },

    /// Result of a tool invocation the model asked for.
    ToolResult {
        tool_use_id: String,
        content: Value,
        is_error: bool,
    },

    /// End-of-user-utterance marker.
    EndAudio,
}

/// Factory for model streams. One `open` per session.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Open a stream for `session_id` with the given configuration applied.
    async fn open(
        &self,
        session_id: &str,
        config: &BridgeConfig,
    ) -> Result<(Box<dyn ModelSink>, Box<dyn ModelStream>), BridgeError>;
}

/// Uplink half: bridge → model.
#[async_trait]
pub trait ModelSink: Send {
    async fn send(&mut self, event: ModelClientEvent) -> Result<(), BridgeError>;

    /// Announce clean end-of-session and release the connection.
    async fn close(&mut self) -> Result<(), BridgeError>;
}

/// Downlink half: model → bridge. A finite, single-consumer event sequence.
#[async_trait]
pub trait ModelStream: Send {
    /// Next event, or `None` once the stream is finished.
    async fn next(&mut self) -> Option<Result<BridgeEvent, BridgeError>>;
}
