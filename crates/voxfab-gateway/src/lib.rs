#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Binary-only deps, referenced here so the lib target sees them too
use dotenvy as _;
use tracing_subscriber as _;

#[cfg(test)]
use tokio_test as _;

pub mod agent_link;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handoff;
pub mod http;
pub mod registry;
pub mod server;
pub mod session;
pub mod ws;

pub use agent_link::{AgentChannel, AgentConnector, Frame, WsAgentConnector};
pub use config::GatewayConfig;
pub use credentials::extract_credentials;
pub use error::GatewayError;
pub use registry::AgentRegistry;
pub use server::{GatewayContext, run};
