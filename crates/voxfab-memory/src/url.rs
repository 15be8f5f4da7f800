//! Memory-store selection from a configuration URL.
//!
//! The memory URL comes from `MEMORY_URL` (with `REDIS_URL` accepted as an
//! alias by the binaries). The scheme selects the adapter; anything this
//! build does not ship an adapter for is a startup configuration error, not
//! a runtime degradation.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use voxfab_core::ports::memory::MemoryStore;

use crate::in_memory::{DEFAULT_TTL, InMemoryStore};

/// A memory URL that cannot be turned into a store.
#[derive(Debug, Error)]
pub enum MemoryUrlError {
    #[error("unsupported memory store scheme in `{0}` (supported: mem://)")]
    UnsupportedScheme(String),

    #[error("invalid memory URL `{url}`: {detail}")]
    Invalid { url: String, detail: String },
}

/// Build a [`MemoryStore`] from a memory URL.
///
/// `mem://` selects the in-process store; an optional `ttl` query parameter
/// overrides the idle TTL in seconds (`mem://local?ttl=120`).
pub fn store_from_url(url: &str) -> Result<Arc<dyn MemoryStore>, MemoryUrlError> {
    let Some(rest) = url.strip_prefix("mem://") else {
        return Err(MemoryUrlError::UnsupportedScheme(url.to_string()));
    };

    let ttl = match rest.split_once("ttl=") {
        Some((_, secs)) => {
            let secs: u64 = secs.parse().map_err(|_| MemoryUrlError::Invalid {
                url: url.to_string(),
                detail: format!("ttl `{secs}` is not a number of seconds"),
            })?;
            Duration::from_secs(secs)
        }
        None => DEFAULT_TTL,
    };

    info!(ttl_secs = ttl.as_secs(), "Using in-process session memory store");
    Ok(Arc::new(InMemoryStore::new(ttl)))
}
