//! Gateway configuration from the environment.

use std::time::Duration;

use thiserror::Error;

/// Configuration problems that abort startup (exit code 1).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value `{value}`: {detail}")]
    Invalid {
        name: &'static str,
        value: String,
        detail: String,
    },
}

/// Gateway process configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen port for client WebSockets and the registry REST surface.
    pub port: u16,

    /// Memory store URL (`MEMORY_URL`, `REDIS_URL` accepted as alias).
    pub memory_url: String,

    /// Workflow id → agent selection when the client names none.
    pub default_workflow: String,

    /// Agent health ping cadence.
    pub health_interval: Duration,

    /// No client traffic for this long triggers a keepalive ping.
    pub keepalive_idle: Duration,

    /// No traffic for this long after the ping ends the session.
    pub keepalive_grace: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8900,
            memory_url: "mem://local".to_string(),
            default_workflow: "triage".to_string(),
            health_interval: Duration::from_secs(15),
            keepalive_idle: Duration::from_secs(90),
            keepalive_grace: Duration::from_secs(30),
        }
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_secs(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::Invalid {
                name,
                value: raw,
                detail: "expected seconds".to_string(),
            }),
    }
}

impl GatewayConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match optional("GATEWAY_PORT") {
            None => defaults.port,
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "GATEWAY_PORT",
                value: raw,
                detail: "expected a port number".to_string(),
            })?,
        };

        Ok(Self {
            port,
            memory_url: optional("MEMORY_URL")
                .or_else(|| optional("REDIS_URL"))
                .unwrap_or(defaults.memory_url),
            default_workflow: optional("DEFAULT_WORKFLOW").unwrap_or(defaults.default_workflow),
            health_interval: parse_secs("HEALTH_INTERVAL_SECS", defaults.health_interval)?,
            keepalive_idle: parse_secs("KEEPALIVE_IDLE_SECS", defaults.keepalive_idle)?,
            keepalive_grace: parse_secs("KEEPALIVE_GRACE_SECS", defaults.keepalive_grace)?,
        })
    }
}
