#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Binary-only deps, referenced here so the lib target sees them too
use dotenvy as _;
use tracing_subscriber as _;

#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use tokio_test as _;

pub mod config;
pub mod phantom;
pub mod prompt;
pub mod registration;
pub mod server;
pub mod session;
pub mod ws;

pub use config::AgentConfig;
pub use phantom::{PhantomRule, PhantomWatcher};
pub use server::{AgentContext, AgentError, run};
pub use session::{Outbound, SessionActor, SessionDeps, SessionInput};
