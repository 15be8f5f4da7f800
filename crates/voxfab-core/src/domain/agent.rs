//! Agent registry records.
//!
//! The gateway exclusively owns the registry; agents announce themselves at
//! startup and the gateway infers liveness from periodic health pings.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::session::SessionMode;

/// Health status inferred from ping history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentHealth {
    #[default]
    Healthy,
    /// At least one missed ping, not yet written off.
    Degraded,
    /// Three consecutive ping intervals without success.
    Unreachable,
}

/// Registration announcement sent by an agent on startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRegistration {
    pub id: String,
    pub host: String,
    pub port: u16,

    /// Tool names this agent handles.
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Session modes this agent supports.
    #[serde(default)]
    pub modes: Vec<SessionMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,

    /// Short handles this agent answers handoffs for (e.g. `"banking"`
    /// for `transfer_to_banking`). Declared here so the gateway never
    /// needs a central alias table.
    #[serde(default)]
    pub handoff_aliases: HashSet<String>,

    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// A registered agent as tracked by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub capabilities: Vec<String>,
    pub modes: Vec<SessionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    pub handoff_aliases: HashSet<String>,
    pub health: AgentHealth,
    pub last_seen: DateTime<Utc>,
}

impl AgentInfo {
    /// Build a freshly-registered (healthy) record.
    #[must_use]
    pub fn from_registration(reg: AgentRegistration) -> Self {
        Self {
            id: reg.id,
            host: reg.host,
            port: reg.port,
            capabilities: reg.capabilities,
            modes: reg.modes,
            voice_id: reg.voice_id,
            persona: reg.persona,
            handoff_aliases: reg.handoff_aliases,
            health: AgentHealth::Healthy,
            last_seen: Utc::now(),
        }
    }

    /// WebSocket URL of the agent's session endpoint.
    #[must_use]
    pub fn session_url(&self) -> String {
        format!("ws://{}:{}/session", self.host, self.port)
    }

    /// HTTP URL of the agent's health endpoint.
    #[must_use]
    pub fn health_url(&self) -> String {
        format!("http://{}:{}/health", self.host, self.port)
    }

    /// Whether this agent answers to the given handoff handle.
    #[must_use]
    pub fn answers_to(&self, handle: &str) -> bool {
        self.id == handle || self.handoff_aliases.contains(handle)
    }
}
