#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tokio_test as _;

pub mod in_memory;
pub mod url;

pub use in_memory::{DEFAULT_TTL, InMemoryStore};
pub use url::{MemoryUrlError, store_from_url};
