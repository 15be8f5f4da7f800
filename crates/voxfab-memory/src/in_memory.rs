//! In-process session memory store with per-entry idle TTL.
//!
//! Entries live in a `tokio::sync::RwLock` map guarded by deadlines; a
//! background sweeper task evicts expired entries so the map does not grow
//! without bound between reads. Expiry is also checked on the read path, so
//! a stale entry is never returned even if the sweeper has not run yet.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use voxfab_core::SessionMemory;
use voxfab_core::ports::memory::{MemoryStore, MemoryStoreError};

/// Default idle TTL for a session's memory entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// How often the sweeper scans for expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    memory: SessionMemory,
    expires_at: Instant,
}

/// In-process [`MemoryStore`] implementation.
///
/// Cloning shares the underlying map. Every successful operation resets the
/// entry's TTL (operations *are* activity).
#[derive(Clone)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
    sweeper: CancellationToken,
}

impl InMemoryStore {
    /// Create a store with the given idle TTL and start its sweeper task.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let store = Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            sweeper: CancellationToken::new(),
        };
        store.spawn_sweeper();
        store
    }

    /// Create a store with [`DEFAULT_TTL`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TTL)
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    /// True when no live entries remain.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn spawn_sweeper(&self) {
        // Weak reference: the sweeper must not keep the map alive after the
        // last store handle is gone.
        let entries = Arc::downgrade(&self.entries);
        let cancel = self.sweeper.clone();
        tokio::spawn(async move {
            let mut ticker = interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(entries) = entries.upgrade() else { break };
                        let now = Instant::now();
                        let mut map = entries.write().await;
                        let before = map.len();
                        map.retain(|_, e| e.expires_at > now);
                        let evicted = before - map.len();
                        if evicted > 0 {
                            debug!(evicted, remaining = map.len(), "Swept expired session memory");
                        }
                    }
                    () = cancel.cancelled() => break,
                }
            }
        });
    }
}

impl Drop for InMemoryStore {
    fn drop(&mut self) {
        // Last clone going away stops the sweeper.
        if Arc::strong_count(&self.entries) == 1 {
            self.sweeper.cancel();
        }
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn put(&self, session_id: &str, patch: SessionMemory) -> Result<(), MemoryStoreError> {
        let mut map = self.entries.write().await;
        let expires_at = Instant::now() + self.ttl;
        match map.get_mut(session_id) {
            // Read-path expiry: an expired entry is replaced, not merged into.
            Some(entry) if entry.expires_at > Instant::now() => {
                entry.memory.merge(patch);
                entry.expires_at = expires_at;
            }
            _ => {
                map.insert(
                    session_id.to_string(),
                    Entry {
                        memory: patch,
                        expires_at,
                    },
                );
            }
        }
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<SessionMemory, MemoryStoreError> {
        let map = self.entries.read().await;
        let memory = map
            .get(session_id)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.memory.clone())
            .unwrap_or_default();
        Ok(memory)
    }

    async fn delete(&self, session_id: &str) -> Result<(), MemoryStoreError> {
        self.entries.write().await.remove(session_id);
        Ok(())
    }

    async fn touch(&self, session_id: &str) -> Result<(), MemoryStoreError> {
        let mut map = self.entries.write().await;
        if let Some(entry) = map.get_mut(session_id) {
            if entry.expires_at > Instant::now() {
                entry.expires_at = Instant::now() + self.ttl;
            }
        }
        Ok(())
    }
}
