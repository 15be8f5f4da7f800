//! Session memory store port.
//!
//! The gateway is the sole writer; agents request updates by message. A
//! store failure is **non-fatal** for callers: reads degrade to an empty
//! bag, writes are dropped with a warning, and the session continues.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::memory::SessionMemory;

/// Errors surfaced by a memory store adapter.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    /// The backing store is unreachable. Callers degrade, never abort.
    #[error("session memory store unavailable: {0}")]
    Unavailable(String),
}

/// Durable key→value map of cross-agent session state with idle TTL.
///
/// Writes are atomic at the per-session level; fields within one patch are
/// last-writer-wins. Every successful operation resets the entry's TTL.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Merge `patch` into the stored bag, creating the entry if absent.
    async fn put(&self, session_id: &str, patch: SessionMemory) -> Result<(), MemoryStoreError>;

    /// Current bag for the session, or an empty bag when absent.
    async fn get(&self, session_id: &str) -> Result<SessionMemory, MemoryStoreError>;

    /// Remove the entry, if present.
    async fn delete(&self, session_id: &str) -> Result<(), MemoryStoreError>;

    /// Reset the entry's TTL without modifying it.
    async fn touch(&self, session_id: &str) -> Result<(), MemoryStoreError>;
}
