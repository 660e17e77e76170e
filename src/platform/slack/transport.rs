// ABOUTME: ChatTransport implementation over the Slack Web API via slack-morphism
// ABOUTME: Posts, updates, reactions, and assistant thread status for a single bot token

use async_trait::async_trait;
use relay_core::{ChatTransport, Destination, MessagePayload, TransportError};
use slack_morphism::errors::SlackClientError;
use slack_morphism::prelude::*;
use std::sync::Arc;

/// Slack Web API client bound to the bot token
#[derive(Clone)]
pub struct SlackTransport {
    /// Shared Slack client for API calls
    client: Arc<SlackHyperClient>,
    /// Bot token for opening sessions
    bot_token: SlackApiToken,
}

impl SlackTransport {
    pub fn new(client: Arc<SlackHyperClient>, bot_token: SlackApiToken) -> Self {
        Self { client, bot_token }
    }

    fn content(payload: &MessagePayload) -> Result<SlackMessageContent, TransportError> {
        let content = SlackMessageContent::new().with_text(payload.text.clone());
        if payload.blocks.is_empty() {
            return Ok(content);
        }
        Ok(content.with_blocks(to_slack_blocks(&payload.blocks)?))
    }
}

/// Convert Block Kit JSON into slack-morphism's typed blocks
pub fn to_slack_blocks(blocks: &[serde_json::Value]) -> Result<Vec<SlackBlock>, TransportError> {
    serde_json::from_value(serde_json::Value::Array(blocks.to_vec()))
        .map_err(|e| TransportError::Platform(format!("invalid Block Kit payload: {}", e)))
}

fn map_client_error(err: SlackClientError) -> TransportError {
    match err {
        SlackClientError::RateLimitError(e) => TransportError::RateLimited {
            retry_after: e.retry_after,
        },
        SlackClientError::ApiError(e) => TransportError::Platform(e.code),
        other => TransportError::Connection(other.to_string()),
    }
}

#[async_trait]
impl ChatTransport for SlackTransport {
    async fn post(
        &self,
        destination: &Destination,
        payload: &MessagePayload,
    ) -> Result<String, TransportError> {
        let session = self.client.open_session(&self.bot_token);
        let req = SlackApiChatPostMessageRequest::new(
            destination.channel.as_str().into(),
            Self::content(payload)?,
        )
        .with_thread_ts(destination.thread_id.as_str().into());

        let resp = session
            .chat_post_message(&req)
            .await
            .map_err(map_client_error)?;
        Ok(resp.ts.to_string())
    }

    async fn update(
        &self,
        message_id: &str,
        destination: &Destination,
        payload: &MessagePayload,
    ) -> Result<(), TransportError> {
        let session = self.client.open_session(&self.bot_token);
        let req = SlackApiChatUpdateRequest::new(
            destination.channel.as_str().into(),
            Self::content(payload)?,
            message_id.into(),
        );

        session
            .chat_update(&req)
            .await
            .map_err(map_client_error)?;
        Ok(())
    }

    async fn react(
        &self,
        emoji: &str,
        message_id: &str,
        channel: &str,
    ) -> Result<(), TransportError> {
        let session = self.client.open_session(&self.bot_token);
        let req = SlackApiReactionsAddRequest::new(channel.into(), emoji.into(), message_id.into());

        session
            .reactions_add(&req)
            .await
            .map_err(map_client_error)?;
        Ok(())
    }

    async fn set_typing_status(
        &self,
        text: &str,
        destination: &Destination,
    ) -> Result<(), TransportError> {
        let session = self.client.open_session(&self.bot_token);
        let req = SlackApiAssistantThreadsSetStatusRequest::new(
            destination.channel.as_str().into(),
            text.to_string(),
            destination.thread_id.as_str().into(),
        );

        session
            .assistant_threads_set_status(&req)
            .await
            .map_err(map_client_error)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
