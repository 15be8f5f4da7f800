#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tokio_test as _;

pub mod backend;
pub mod bridge;
pub mod config;
pub mod error;
pub mod events;

// Re-export key types for convenience
pub use backend::{ModelBackend, ModelClientEvent, ModelSink, ModelStream};
pub use bridge::VoiceBridge;
pub use config::{BridgeConfig, EndpointingSensitivity, InferenceConfig};
pub use backend::scripted::{ScriptedBackend, ScriptedModelHandle};
pub use error::BridgeError;
pub use events::BridgeEvent;
