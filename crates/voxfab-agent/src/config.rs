//! Agent configuration from the environment.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use voxfab_core::SessionMode;

/// Configuration problems that abort startup (exit code 1).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} has invalid value `{value}`: {detail}")]
    Invalid {
        name: &'static str,
        value: String,
        detail: String,
    },
}

/// Everything an agent process needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Registry identity (e.g. `persona-SimpleBanking`).
    pub agent_id: String,

    /// Host the gateway should dial back on.
    pub host: String,

    /// Listen port for the session/health endpoints.
    pub port: u16,

    pub mode: SessionMode,

    /// Workflow definition file driving this agent's conversations.
    pub workflow_file: PathBuf,

    /// Directory of tool definition files (absent = no tools).
    pub tools_dir: Option<PathBuf>,

    /// Gateway base URL for registration.
    pub gateway_url: String,

    /// Local tool service base URL.
    pub local_tools_url: String,

    /// Voice model WebSocket endpoint.
    pub voice_model_url: String,

    pub voice_model_api_key: Option<String>,

    /// Overrides the workflow's voice id when set.
    pub voice_id: Option<String>,

    /// Remote agent-runtime identifier for runtime tools.
    pub runtime_arn: Option<String>,

    /// Handoff handles this agent answers for (e.g. `banking`).
    pub handoff_aliases: HashSet<String>,

    /// Optional phantom-rule override file.
    pub phantom_rules_file: Option<PathBuf>,

    /// Per-invocation tool HTTP timeout.
    pub tool_timeout: Duration,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_mode(raw: Option<&str>) -> Result<SessionMode, ConfigError> {
    match raw {
        None | Some("voice") => Ok(SessionMode::Voice),
        Some("text") => Ok(SessionMode::Text),
        Some("hybrid") => Ok(SessionMode::Hybrid),
        Some(other) => Err(ConfigError::Invalid {
            name: "MODE",
            value: other.to_string(),
            detail: "expected one of voice|text|hybrid".to_string(),
        }),
    }
}

impl AgentConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = parse_mode(optional("MODE").as_deref())?;

        let port = match optional("AGENT_PORT") {
            None => 7100,
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "AGENT_PORT",
                value: raw,
                detail: "expected a port number".to_string(),
            })?,
        };

        let tool_timeout = match optional("TOOL_TIMEOUT_SECS") {
            None => Duration::from_secs(10),
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| ConfigError::Invalid {
                name: "TOOL_TIMEOUT_SECS",
                value: raw,
                detail: "expected seconds".to_string(),
            })?),
        };

        let handoff_aliases = optional("HANDOFF_ALIASES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            agent_id: required("AGENT_ID")?,
            host: optional("AGENT_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            mode,
            workflow_file: PathBuf::from(required("WORKFLOW_FILE")?),
            tools_dir: optional("TOOLS_DIR").map(PathBuf::from),
            gateway_url: optional("GATEWAY_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8900".to_string()),
            local_tools_url: optional("LOCAL_TOOLS_URL")
                .unwrap_or_else(|| "http://127.0.0.1:9950".to_string()),
            voice_model_url: required("VOICE_MODEL_URL")?,
            voice_model_api_key: optional("VOICE_MODEL_API_KEY"),
            voice_id: optional("VOICE_ID"),
            runtime_arn: optional("RUNTIME_ARN"),
            handoff_aliases,
            phantom_rules_file: optional("PHANTOM_RULES_FILE").map(PathBuf::from),
            tool_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_defaults_to_voice_and_rejects_unknown_values() {
        assert_eq!(parse_mode(None).unwrap(), SessionMode::Voice);
        assert_eq!(parse_mode(Some("text")).unwrap(), SessionMode::Text);
        assert_eq!(parse_mode(Some("hybrid")).unwrap(), SessionMode::Hybrid);
        assert!(matches!(
            parse_mode(Some("loud")),
            Err(ConfigError::Invalid { name: "MODE", .. })
        ));
    }
}
