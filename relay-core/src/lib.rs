// ABOUTME: Platform-agnostic delivery of streaming agent output into chat threads
// ABOUTME: Chunking, Block Kit rendering, the per-turn delivery state machine, and batching

pub mod aggregator;
pub mod blocks;
pub mod chunk;
pub mod config;
pub mod driver;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod paths;
pub mod responder;
pub mod testing;
pub mod transport;
pub mod turn;

pub use aggregator::{Batcher, FragmentFilter};
pub use blocks::{EventKind, MessagePayload, Renderer};
pub use chunk::{chunk, ChunkBounds, Chunks};
pub use config::Config;
pub use driver::Driver;
pub use error::{DeliveryError, TransportError};
pub use responder::{respond_in_thread, TurnRequest};
pub use transport::{ChatTransport, Destination};
pub use turn::{ConversationTurn, DeliveryKind, DeliveryResult, Fragment};

// Re-export relay-agent types
pub use relay_agent::{AgentEvent, AgentHandle, AgentRegistry};
