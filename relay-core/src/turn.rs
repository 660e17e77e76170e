// ABOUTME: Per-turn delivery state machine: post first, then append-update, falling back to a new post.
// ABOUTME: Every mutation runs under the turn's async lock so updates never interleave.

use crate::blocks::{MessagePayload, Renderer};
use crate::chunk::rendered_len;
use crate::error::{DeliveryError, TransportError};
use crate::metrics;
use crate::transport::{ChatTransport, Destination};
use relay_agent::TokenKind;
use serde_json::Value;
use tokio::sync::Mutex;

/// A fine-grained piece of streamed output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub kind: TokenKind,
}

impl Fragment {
    pub fn new(text: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, TokenKind::Text)
    }
}

/// How a delivery reached the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    /// First message of the turn
    Posted,
    /// Existing message edited in place
    Updated,
    /// Edit failed or was too large; content went out as a new message
    FallbackPost,
}

impl DeliveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posted => "post",
            Self::Updated => "update",
            Self::FallbackPost => "fallback_post",
        }
    }
}

/// Outcome of a successful delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    /// Message now holding the turn's latest content
    pub message_id: String,
    pub kind: DeliveryKind,
}

#[derive(Debug, Default)]
struct TurnState {
    message_id: Option<String>,
    accumulated_text: String,
    rendered_block_cache: Vec<Value>,
}

/// One agent invocation bound to a channel thread.
///
/// States are `UNSENT` (no message id) and `SENT`. Both delivery paths hold
/// the turn's lock for the whole post/update/fallback sequence, so callers on
/// different tasks may share a turn behind an `Arc`.
#[derive(Debug)]
pub struct ConversationTurn {
    destination: Destination,
    renderer: Renderer,
    state: Mutex<TurnState>,
}

impl ConversationTurn {
    pub fn new(destination: Destination, renderer: Renderer) -> Self {
        Self {
            destination,
            renderer,
            state: Mutex::new(TurnState::default()),
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub async fn message_id(&self) -> Option<String> {
        self.state.lock().await.message_id.clone()
    }

    pub async fn accumulated_text(&self) -> String {
        self.state.lock().await.accumulated_text.clone()
    }

    pub async fn rendered_blocks(&self) -> Vec<Value> {
        self.state.lock().await.rendered_block_cache.clone()
    }

    /// Deliver a block payload, appending its blocks to the turn's message.
    ///
    /// Post failures surface as [`DeliveryError::DeliveryFailed`]. A failed or
    /// oversized update degrades to a fresh post carrying only `payload`.
    pub async fn deliver(
        &self,
        transport: &dyn ChatTransport,
        payload: &MessagePayload,
    ) -> Result<DeliveryResult, DeliveryError> {
        let mut state = self.state.lock().await;

        let Some(message_id) = state.message_id.clone() else {
            let message_id = self.post(transport, payload).await?;
            state.message_id = Some(message_id.clone());
            state.rendered_block_cache = payload.blocks.clone();
            return Ok(self.delivered(message_id, DeliveryKind::Posted));
        };

        let mut merged = state.rendered_block_cache.clone();
        merged.extend(payload.blocks.iter().cloned());

        let update = if merged.len() > self.renderer.max_blocks() {
            Err(TransportError::Platform(format!(
                "merged message would carry {} blocks, limit is {}",
                merged.len(),
                self.renderer.max_blocks()
            )))
        } else {
            let merged_payload = MessagePayload::new(payload.text.clone(), merged.clone());
            transport
                .update(&message_id, &self.destination, &merged_payload)
                .await
        };

        match update {
            Ok(()) => {
                state.rendered_block_cache = merged;
                Ok(self.delivered(message_id, DeliveryKind::Updated))
            }
            Err(e) => {
                self.log_update_failure(&message_id, &e);
                let new_id = self.post(transport, payload).await?;
                state.message_id = Some(new_id.clone());
                state.rendered_block_cache = payload.blocks.clone();
                Ok(self.delivered(new_id, DeliveryKind::FallbackPost))
            }
        }
    }

    /// Deliver streamed fragments as one growing plain-text message.
    ///
    /// Updates resend the whole accumulated text. Returns `None` when the
    /// fragments carry no text.
    pub async fn deliver_batch(
        &self,
        transport: &dyn ChatTransport,
        fragments: &[Fragment],
    ) -> Result<Option<DeliveryResult>, DeliveryError> {
        let new_text: String = fragments.iter().map(|f| f.text.as_str()).collect();
        if new_text.is_empty() {
            return Ok(None);
        }

        let mut state = self.state.lock().await;

        let Some(message_id) = state.message_id.clone() else {
            let (message_id, tail) = self.post_text(transport, &new_text).await?;
            state.message_id = Some(message_id.clone());
            state.accumulated_text = tail;
            return Ok(Some(self.delivered(message_id, DeliveryKind::Posted)));
        };

        let cumulative = format!("{}{}", state.accumulated_text, new_text);
        let ceiling = self.renderer.text_bounds().max;

        let update = if rendered_len(&cumulative) > ceiling {
            Err(TransportError::Platform(format!(
                "accumulated text exceeds {} characters",
                ceiling
            )))
        } else {
            let payload = MessagePayload::text_only(cumulative.clone());
            transport
                .update(&message_id, &self.destination, &payload)
                .await
        };

        match update {
            Ok(()) => {
                state.accumulated_text = cumulative;
                Ok(Some(self.delivered(message_id, DeliveryKind::Updated)))
            }
            Err(e) => {
                self.log_update_failure(&message_id, &e);
                let (new_id, tail) = self.post_text(transport, &new_text).await?;
                state.message_id = Some(new_id.clone());
                state.accumulated_text = tail;
                Ok(Some(self.delivered(new_id, DeliveryKind::FallbackPost)))
            }
        }
    }

    /// Post plain text, split into consecutive messages at the text ceiling.
    ///
    /// Returns the last message's id and text, which later batches extend.
    async fn post_text(
        &self,
        transport: &dyn ChatTransport,
        text: &str,
    ) -> Result<(String, String), DeliveryError> {
        let mut last = None;
        for chunk in self.renderer.text_bounds().chunks(text) {
            let payload = MessagePayload::text_only(chunk);
            let message_id = self.post(transport, &payload).await?;
            last = Some((message_id, chunk.to_string()));
        }
        // Chunks always yields at least one piece
        last.ok_or_else(|| {
            DeliveryError::DeliveryFailed(TransportError::Platform("nothing to post".to_string()))
        })
    }

    async fn post(
        &self,
        transport: &dyn ChatTransport,
        payload: &MessagePayload,
    ) -> Result<String, DeliveryError> {
        transport
            .post(&self.destination, payload)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    channel = %self.destination.channel,
                    thread_ts = %self.destination.thread_id,
                    "Failed to post message"
                );
                metrics::record_delivery_failure();
                DeliveryError::DeliveryFailed(e)
            })
    }

    fn delivered(&self, message_id: String, kind: DeliveryKind) -> DeliveryResult {
        metrics::record_delivery(kind.as_str());
        tracing::debug!(
            channel = %self.destination.channel,
            thread_ts = %self.destination.thread_id,
            message_id = %message_id,
            kind = kind.as_str(),
            "Delivered"
        );
        DeliveryResult { message_id, kind }
    }

    fn log_update_failure(&self, message_id: &str, error: &TransportError) {
        tracing::warn!(
            error = %error,
            channel = %self.destination.channel,
            thread_ts = %self.destination.thread_id,
            message_id,
            "Update failed, posting a new message instead"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_kind_labels() {
        assert_eq!(DeliveryKind::Posted.as_str(), "post");
        assert_eq!(DeliveryKind::Updated.as_str(), "update");
        assert_eq!(DeliveryKind::FallbackPost.as_str(), "fallback_post");
    }

    #[test]
    fn test_fragment_text_defaults_to_text_kind() {
        let f = Fragment::text("hi");
        assert_eq!(f.kind, TokenKind::Text);
        assert_eq!(f.text, "hi");
    }

    #[tokio::test]
    async fn test_new_turn_is_unsent() {
        let turn = ConversationTurn::new(Destination::new("C1", "1.0"), Renderer::default());
        assert!(turn.message_id().await.is_none());
        assert!(turn.accumulated_text().await.is_empty());
        assert!(turn.rendered_blocks().await.is_empty());
    }
}
