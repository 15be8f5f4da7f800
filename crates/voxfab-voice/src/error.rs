//! Voice bridge error types.

use thiserror::Error;

/// Errors that can occur on the voice bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// `start` was called before `set_config`.
    #[error("Voice bridge not configured — call set_config before start")]
    NotConfigured,

    /// `set_config` or `start` was called on a running bridge.
    #[error("Voice bridge session is already started")]
    AlreadyStarted,

    /// An upstream operation was attempted before `start`.
    #[error("Voice bridge session is not started")]
    NotStarted,

    /// The model stream has gone away (clean close or teardown).
    #[error("Voice model stream closed")]
    StreamClosed,

    /// Connection-level failure talking to the model endpoint.
    #[error("Voice model transport error: {0}")]
    Transport(String),

    /// The model sent something outside the event contract.
    #[error("Voice model protocol error: {0}")]
    Protocol(String),
}

impl BridgeError {
    /// Whether this error ends the session (vs. a recoverable hiccup).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::StreamClosed | Self::Transport(_))
    }
}
