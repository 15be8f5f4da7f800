//! Gateway error types.

use thiserror::Error;

/// Errors inside the gateway router.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Registration under an id that is already taken.
    #[error("agent id `{0}` is already registered")]
    DuplicateAgent(String),

    /// Handoff target not present in the registry.
    #[error("target agent unknown: {0}")]
    UnknownAgent(String),

    /// A handoff handle matched more than one agent's aliases.
    #[error("handoff handle `{0}` is ambiguous across registered agents")]
    AmbiguousHandle(String),

    /// Handoff target known but not currently serviceable.
    #[error("target agent unreachable: {0}")]
    AgentUnavailable(String),

    /// Failed to open or keep the leg to an agent.
    #[error("agent connection failed: {0}")]
    AgentConnection(String),
}
