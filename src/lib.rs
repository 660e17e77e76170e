// ABOUTME: Root library for the relay binary
// ABOUTME: CLI definitions, inbound Slack routing, and the Slack platform adapter

pub mod cli;
pub mod handler;
pub mod platform;

// Re-export the delivery layer and agent seam for convenience
pub use relay_core::{config, Config};
pub use relay_agent::{AgentEvent, AgentHandle, AgentRegistry};
