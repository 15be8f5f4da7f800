//! The agent registry — gateway-owned, authoritative.
//!
//! Agents register on start and deregister on clean shutdown; everything
//! else is inferred. One monitor task per agent polls its health endpoint;
//! a single missed interval degrades the agent, three write it off as
//! unreachable. Reads are snapshots taken under a short read lock — no
//! caller holds the lock across a suspension point.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use voxfab_core::{AgentHealth, AgentInfo, AgentRegistration};

use crate::error::GatewayError;

/// Consecutive missed pings before an agent is `unreachable`.
const UNREACHABLE_AFTER_MISSES: u32 = 3;

/// Per-ping HTTP timeout.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

struct Tracked {
    info: AgentInfo,
    monitor: CancellationToken,
}

/// Gateway-owned agent registry with built-in liveness monitoring.
pub struct AgentRegistry {
    agents: Arc<RwLock<HashMap<String, Tracked>>>,
    client: reqwest::Client,
    health_interval: Duration,
    shutdown: CancellationToken,
}

impl AgentRegistry {
    /// Create a registry; monitors tick every `health_interval`.
    #[must_use]
    pub fn new(health_interval: Duration, shutdown: CancellationToken) -> Self {
        let client = reqwest::Client::builder()
            .timeout(PING_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            agents: Arc::new(RwLock::new(HashMap::new())),
            client,
            health_interval,
            shutdown,
        }
    }

    /// Register a new agent. Name collisions are rejected.
    pub async fn register(&self, registration: AgentRegistration) -> Result<(), GatewayError> {
        let mut agents = self.agents.write().await;
        if agents.contains_key(&registration.id) {
            return Err(GatewayError::DuplicateAgent(registration.id));
        }

        let info = AgentInfo::from_registration(registration);
        info!(
            agent_id = %info.id,
            addr = %format!("{}:{}", info.host, info.port),
            aliases = ?info.handoff_aliases,
            "Agent registered"
        );

        let monitor = self.shutdown.child_token();
        self.spawn_monitor(info.clone(), monitor.clone());
        agents.insert(info.id.clone(), Tracked { info, monitor });
        Ok(())
    }

    /// Remove an agent (clean shutdown). Idempotent.
    pub async fn deregister(&self, agent_id: &str) {
        if let Some(tracked) = self.agents.write().await.remove(agent_id) {
            tracked.monitor.cancel();
            info!(agent_id, "Agent deregistered");
        }
    }

    /// Snapshot of all registered agents.
    pub async fn list(&self) -> Vec<AgentInfo> {
        self.agents
            .read()
            .await
            .values()
            .map(|t| t.info.clone())
            .collect()
    }

    /// Snapshot of one agent.
    pub async fn lookup(&self, agent_id: &str) -> Option<AgentInfo> {
        self.agents.read().await.get(agent_id).map(|t| t.info.clone())
    }

    /// Whether an agent exists and is currently serviceable.
    pub async fn is_available(&self, agent_id: &str) -> bool {
        self.agents
            .read()
            .await
            .get(agent_id)
            .is_some_and(|t| t.info.health != AgentHealth::Unreachable)
    }

    /// Resolve a handoff handle: exact id first, then a unique alias match.
    pub async fn resolve(&self, handle: &str) -> Result<AgentInfo, GatewayError> {
        let agents = self.agents.read().await;
        if let Some(tracked) = agents.get(handle) {
            return Ok(tracked.info.clone());
        }

        let mut matches = agents.values().filter(|t| t.info.answers_to(handle));
        match (matches.next(), matches.next()) {
            (Some(tracked), None) => Ok(tracked.info.clone()),
            (Some(_), Some(_)) => Err(GatewayError::AmbiguousHandle(handle.to_string())),
            (None, _) => Err(GatewayError::UnknownAgent(handle.to_string())),
        }
    }

    /// Resolve a handle and require it serviceable.
    pub async fn resolve_available(&self, handle: &str) -> Result<AgentInfo, GatewayError> {
        let info = self.resolve(handle).await?;
        if info.health == AgentHealth::Unreachable {
            return Err(GatewayError::AgentUnavailable(info.id));
        }
        Ok(info)
    }

    // ── Liveness ───────────────────────────────────────────────────

    fn spawn_monitor(&self, info: AgentInfo, cancel: CancellationToken) {
        let agents = Arc::clone(&self.agents);
        let client = self.client.clone();
        let period = self.health_interval;
        let url = info.health_url();
        let agent_id = info.id;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut misses: u32 = 0;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let healthy = matches!(
                            client.get(&url).send().await,
                            Ok(response) if response.status().is_success()
                        );

                        let status = if healthy {
                            misses = 0;
                            AgentHealth::Healthy
                        } else {
                            misses = misses.saturating_add(1);
                            if misses >= UNREACHABLE_AFTER_MISSES {
                                AgentHealth::Unreachable
                            } else {
                                AgentHealth::Degraded
                            }
                        };

                        let mut agents = agents.write().await;
                        let Some(tracked) = agents.get_mut(&agent_id) else {
                            break; // deregistered
                        };
                        if healthy {
                            tracked.info.last_seen = Utc::now();
                        }
                        if tracked.info.health != status {
                            // Log transitions once, not every tick.
                            warn!(agent_id = %agent_id, from = ?tracked.info.health, to = ?status, "Agent health changed");
                            tracked.info.health = status;
                        }
                    }
                    () = cancel.cancelled() => {
                        debug!(agent_id = %agent_id, "Health monitor stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Force a health status (tests and administrative overrides).
    pub async fn set_health(&self, agent_id: &str, health: AgentHealth) {
        if let Some(tracked) = self.agents.write().await.get_mut(agent_id) {
            tracked.info.health = health;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashSet};
    use voxfab_core::SessionMode;

    fn registry() -> AgentRegistry {
        AgentRegistry::new(Duration::from_secs(3600), CancellationToken::new())
    }

    fn registration(id: &str, aliases: &[&str]) -> AgentRegistration {
        AgentRegistration {
            id: id.into(),
            host: "127.0.0.1".into(),
            port: 7101,
            capabilities: Vec::new(),
            modes: vec![SessionMode::Voice],
            voice_id: None,
            persona: None,
            handoff_aliases: aliases.iter().map(|a| (*a).to_string()).collect::<HashSet<_>>(),
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn register_and_lookup() {
        let registry = registry();
        registry.register(registration("triage", &[])).await.unwrap();

        let info = registry.lookup("triage").await.unwrap();
        assert_eq!(info.health, AgentHealth::Healthy);
        assert!(registry.is_available("triage").await);
        assert!(!registry.is_available("nope").await);
    }

    #[tokio::test]
    async fn name_collisions_are_rejected() {
        let registry = registry();
        registry.register(registration("triage", &[])).await.unwrap();
        assert!(matches!(
            registry.register(registration("triage", &[])).await,
            Err(GatewayError::DuplicateAgent(_))
        ));
    }

    #[tokio::test]
    async fn resolve_prefers_exact_id_then_unique_alias() {
        let registry = registry();
        registry
            .register(registration("persona-SimpleBanking", &["banking"]))
            .await
            .unwrap();
        registry
            .register(registration("persona-mortgage", &["mortgage"]))
            .await
            .unwrap();

        assert_eq!(
            registry.resolve("persona-mortgage").await.unwrap().id,
            "persona-mortgage"
        );
        assert_eq!(
            registry.resolve("banking").await.unwrap().id,
            "persona-SimpleBanking"
        );
        assert!(matches!(
            registry.resolve("disputes").await,
            Err(GatewayError::UnknownAgent(_))
        ));
    }

    #[tokio::test]
    async fn ambiguous_aliases_are_an_error() {
        let registry = registry();
        registry.register(registration("a", &["specialist"])).await.unwrap();
        registry.register(registration("b", &["specialist"])).await.unwrap();
        assert!(matches!(
            registry.resolve("specialist").await,
            Err(GatewayError::AmbiguousHandle(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_agents_fail_resolve_available() {
        let registry = registry();
        registry.register(registration("banking", &[])).await.unwrap();
        registry.set_health("banking", AgentHealth::Unreachable).await;

        assert!(!registry.is_available("banking").await);
        assert!(matches!(
            registry.resolve_available("banking").await,
            Err(GatewayError::AgentUnavailable(_))
        ));

        // Degraded is still serviceable.
        registry.set_health("banking", AgentHealth::Degraded).await;
        assert!(registry.resolve_available("banking").await.is_ok());
    }

    #[tokio::test]
    async fn deregister_is_idempotent() {
        let registry = registry();
        registry.register(registration("triage", &[])).await.unwrap();
        registry.deregister("triage").await;
        registry.deregister("triage").await;
        assert!(registry.lookup("triage").await.is_none());
    }
}
