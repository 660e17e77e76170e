// ABOUTME: Error types for the delivery layer.
// ABOUTME: Transport failures are recoverable on update paths; post failures surface as DeliveryFailed.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by the chat transport for a single call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("rate limited by platform")]
    RateLimited { retry_after: Option<Duration> },
    #[error("platform rejected request: {0}")]
    Platform(String),
    #[error("connection error: {0}")]
    Connection(String),
}

/// Errors surfaced by the chunker and the delivery state machine
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Programmer error, e.g. chunk bounds with `min >= max`
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// A post (first post or fallback post) failed; the turn cannot continue
    #[error("message delivery failed: {0}")]
    DeliveryFailed(#[source] TransportError),
}
