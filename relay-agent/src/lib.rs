// ABOUTME: Orchestration-engine seam for relay.
// ABOUTME: Typed agent events plus pluggable backends behind a Send+Sync AgentHandle.

pub mod backends;
pub mod event;
pub mod handle;
pub mod registry;

pub use event::{AgentEvent, ErrorCode, TokenKind};
pub use handle::{AgentHandle, EventReceiver, PromptRequest};
pub use registry::{AgentRegistry, BackendFactory};
