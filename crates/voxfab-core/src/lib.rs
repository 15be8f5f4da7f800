#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod contracts;
pub mod domain;
pub mod ports;

// Re-export commonly used types for convenience
pub use contracts::frames::{AgentBound, ClientFrame, GatewayBound, ProtocolError, ServerFrame};
pub use domain::agent::{AgentHealth, AgentInfo, AgentRegistration};
pub use domain::memory::SessionMemory;
pub use domain::session::{
    Role, Session, SessionMode, TranscriptEntry, UsageCounters, VerifiedUser, mint_session_id,
};
pub use domain::tool::{
    HandoffContext, HandoffRequest, HandoffTool, ToolDefinition, ToolKind, ToolResult,
};
pub use domain::workflow::{NodeType, WorkflowDefinition, WorkflowEdge, WorkflowNode};
pub use ports::memory::{MemoryStore, MemoryStoreError};

// Silence unused dev-dependency warnings until async port tests land here
#[cfg(test)]
use tokio as _;
#[cfg(test)]
use tokio_test as _;
