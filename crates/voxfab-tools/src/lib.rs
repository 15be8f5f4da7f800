#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tokio_test as _;

pub mod catalog;
pub mod error;
pub mod executor;
pub mod transport;

pub use catalog::{LoadedTool, ToolCatalog};
pub use error::{CatalogError, ToolError};
pub use executor::{SessionSnapshot, ToolExecutor, ToolOutcome};
pub use transport::{HttpToolTransport, ToolTransport};
