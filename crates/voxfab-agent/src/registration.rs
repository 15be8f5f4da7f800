//! Gateway registration client.
//!
//! Agents announce themselves on startup and deregister on clean shutdown.
//! The gateway may come up after the agent, so registration retries with a
//! flat backoff until it lands or the process is shutting down.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use voxfab_core::AgentRegistration;

use crate::config::AgentConfig;

const RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Build this process's registration record.
#[must_use]
pub fn registration(config: &AgentConfig, capabilities: Vec<String>, voice_id: Option<String>) -> AgentRegistration {
    AgentRegistration {
        id: config.agent_id.clone(),
        host: config.host.clone(),
        port: config.port,
        capabilities,
        modes: vec![config.mode],
        voice_id,
        persona: None,
        handoff_aliases: config.handoff_aliases.clone(),
        metadata: BTreeMap::new(),
    }
}

/// Register with the gateway, retrying until success or cancellation.
pub async fn register_with_retry(
    client: &reqwest::Client,
    gateway_url: &str,
    registration: &AgentRegistration,
    cancel: &CancellationToken,
) {
    let url = format!("{}/agents/register", gateway_url.trim_end_matches('/'));
    loop {
        match client.post(&url).json(registration).send().await {
            Ok(response) if response.status().is_success() => {
                info!(agent_id = %registration.id, gateway = %url, "Registered with gateway");
                return;
            }
            Ok(response) => {
                warn!(
                    agent_id = %registration.id,
                    status = %response.status(),
                    "Gateway refused registration"
                );
                // A conflict (name collision) will not resolve by retrying.
                if response.status() == reqwest::StatusCode::CONFLICT {
                    return;
                }
            }
            Err(e) => {
                warn!(agent_id = %registration.id, error = %e, "Gateway not reachable yet");
            }
        }

        tokio::select! {
            () = tokio::time::sleep(RETRY_INTERVAL) => {}
            () = cancel.cancelled() => return,
        }
    }
}

/// Deregister on clean shutdown. Best effort.
pub async fn deregister(client: &reqwest::Client, gateway_url: &str, agent_id: &str) {
    let url = format!(
        "{}/agents/{}",
        gateway_url.trim_end_matches('/'),
        agent_id
    );
    match client.delete(&url).send().await {
        Ok(response) if response.status().is_success() => {
            info!(agent_id, "Deregistered from gateway");
        }
        Ok(response) => {
            warn!(agent_id, status = %response.status(), "Deregistration refused");
        }
        Err(e) => {
            warn!(agent_id, error = %e, "Deregistration failed");
        }
    }
}
