#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

pub mod engine;
pub mod error;
pub mod loader;

pub use engine::{Transition, WorkflowEngine};
pub use error::WorkflowError;
pub use loader::{load_workflow, validate_definition};
