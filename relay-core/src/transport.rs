// ABOUTME: Chat transport capability consumed by the delivery layer.
// ABOUTME: Post/update are fallible and typed; react and typing status are best-effort.

use crate::blocks::MessagePayload;
use crate::error::TransportError;
use async_trait::async_trait;

// =============================================================================
// Destination
// =============================================================================

/// Where a conversation turn's messages go
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    /// Channel id (e.g., C0123ABCD, D0123ABCD)
    pub channel: String,
    /// Thread the turn replies into (Slack thread_ts)
    pub thread_id: String,
}

impl Destination {
    pub fn new(channel: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            thread_id: thread_id.into(),
        }
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Capability exposed by a chat platform for delivering agent output.
///
/// Implementations must be safe for concurrent independent calls; the
/// delivery layer serializes calls per turn, not per transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post a new message into the destination thread, returning its id
    async fn post(
        &self,
        destination: &Destination,
        payload: &MessagePayload,
    ) -> Result<String, TransportError>;

    /// Replace the content of an existing message
    async fn update(
        &self,
        message_id: &str,
        destination: &Destination,
        payload: &MessagePayload,
    ) -> Result<(), TransportError>;

    /// Add an emoji reaction to a message
    async fn react(
        &self,
        emoji: &str,
        message_id: &str,
        channel: &str,
    ) -> Result<(), TransportError>;

    /// Set the assistant typing status shown under the thread
    async fn set_typing_status(
        &self,
        text: &str,
        destination: &Destination,
    ) -> Result<(), TransportError>;
}

/// React, logging instead of failing
pub async fn react_best_effort(
    transport: &dyn ChatTransport,
    emoji: &str,
    message_id: &str,
    channel: &str,
) {
    if let Err(e) = transport.react(emoji, message_id, channel).await {
        tracing::warn!(error = %e, emoji, message_id, channel, "Failed to add reaction");
    }
}

/// Set the typing status, ignoring failures
pub async fn set_typing_status_best_effort(
    transport: &dyn ChatTransport,
    text: &str,
    destination: &Destination,
) {
    if let Err(e) = transport.set_typing_status(text, destination).await {
        tracing::debug!(
            error = %e,
            channel = %destination.channel,
            thread_ts = %destination.thread_id,
            "Failed to set typing status"
        );
    }
}
