// ABOUTME: Slack platform for relay: Socket Mode listener plus the Web API transport
// ABOUTME: Each routed message spawns an independent agent turn answered in its thread

pub mod transport;

pub use transport::SlackTransport;

use crate::handler::{self, InboundKind, InboundMessage, Route};
use anyhow::{Context, Result};
use relay_core::{respond_in_thread, AgentHandle, ChatTransport, Config};
use slack_morphism::prelude::*;
use std::sync::Arc;

// =============================================================================
// Shared state passed to Socket Mode callbacks via SlackClientEventsUserState
// =============================================================================

/// State shared with Socket Mode callback functions via user state storage.
/// Callbacks are fn pointers (not closures), so they cannot capture variables.
/// Instead, this state is registered via `with_user_state()` and retrieved
/// inside callbacks from the `SlackClientEventsUserState` RwLock.
#[derive(Clone)]
struct SlackBridgeState {
    config: Arc<Config>,
    agent: AgentHandle,
    transport: Arc<dyn ChatTransport>,
    /// Bot's user ID (to skip self-messages)
    bot_user_id: String,
}

// =============================================================================
// Socket Mode callback functions (must be fn pointers, not closures)
// =============================================================================

/// Handle push events (messages, app mentions) from Socket Mode
async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let bridge = {
        let guard = states.read().await;
        guard
            .get_user_state::<SlackBridgeState>()
            .cloned()
            .ok_or("SlackBridgeState not found in user state")?
    };

    let inbound = match event.event {
        SlackEventCallbackBody::Message(msg_event) => message_to_inbound(&msg_event),
        SlackEventCallbackBody::AppMention(mention_event) => {
            Some(mention_to_inbound(&mention_event))
        }
        _ => None,
    };
    if let Some(inbound) = inbound {
        dispatch(bridge, inbound);
    }
    Ok(())
}

/// Route an inbound message and, if it should be answered, start its turn.
///
/// The Socket Mode ack must not wait on the agent, so the turn runs on its own task.
fn dispatch(bridge: SlackBridgeState, inbound: InboundMessage) {
    let request = match handler::route(&inbound, &bridge.bot_user_id, &bridge.config.slack) {
        Route::Respond(request) => request,
        Route::Ignore(reason) => {
            tracing::debug!(
                platform = "slack",
                channel = %inbound.channel,
                ts = %inbound.ts,
                reason,
                "Ignoring inbound event"
            );
            return;
        }
    };

    tracing::info!(
        platform = "slack",
        channel = %request.destination.channel,
        thread_ts = %request.destination.thread_id,
        user = %request.user_id,
        "Starting turn"
    );

    tokio::spawn(async move {
        respond_in_thread(&bridge.config, &bridge.agent, bridge.transport, request).await;
    });
}

fn message_to_inbound(msg_event: &SlackMessageEvent) -> Option<InboundMessage> {
    // Messages without a channel (e.g. some hidden system events) are not routable
    let channel = msg_event.origin.channel.as_ref()?.to_string();
    Some(InboundMessage {
        kind: InboundKind::Message,
        channel,
        channel_type: msg_event
            .origin
            .channel_type
            .as_ref()
            .map(|t| t.0.clone()),
        user: msg_event.sender.user.as_ref().map(|u| u.to_string()),
        bot_id: msg_event.sender.bot_id.as_ref().map(|b| b.to_string()),
        subtype: msg_event.subtype.as_ref().map(|s| format!("{:?}", s)),
        text: msg_event
            .content
            .as_ref()
            .and_then(|c| c.text.as_ref())
            .map(|t| t.to_string()),
        ts: msg_event.origin.ts.to_string(),
        thread_ts: msg_event.origin.thread_ts.as_ref().map(|ts| ts.to_string()),
    })
}

fn mention_to_inbound(mention_event: &SlackAppMentionEvent) -> InboundMessage {
    InboundMessage {
        kind: InboundKind::Mention,
        channel: mention_event.channel.to_string(),
        channel_type: None,
        user: Some(mention_event.user.to_string()),
        bot_id: None,
        subtype: None,
        text: mention_event.content.text.as_ref().map(|t| t.to_string()),
        ts: mention_event.origin.ts.to_string(),
        thread_ts: mention_event
            .origin
            .thread_ts
            .as_ref()
            .map(|ts| ts.to_string()),
    }
}

/// Socket Mode error handler
fn socket_mode_error_handler(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> HttpStatusCode {
    tracing::error!(platform = "slack", error = %err, "Socket Mode error");
    HttpStatusCode::OK
}

// =============================================================================
// SlackRelay - connects, authenticates, and serves Socket Mode
// =============================================================================

/// Slack connection for the relay bot
pub struct SlackRelay {
    /// Shared Slack client for API calls
    client: Arc<SlackHyperClient>,
    /// App-level token (xapp-...) for Socket Mode connections
    app_token: SlackApiToken,
    /// Bot's Slack user ID (resolved via auth.test at startup)
    bot_user_id: String,
    transport: Arc<SlackTransport>,
}

impl SlackRelay {
    /// Connect to Slack and resolve the bot's user ID via `auth.test`.
    pub async fn connect(config: &Config) -> Result<Self> {
        config.require_slack_tokens()?;

        let client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new().context("Failed to create Slack HTTP connector")?,
        ));

        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack.bot_token.clone()));
        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack.app_token.clone()));

        let session = client.open_session(&bot_token);
        let auth_response = session
            .auth_test()
            .await
            .context("Failed to call Slack auth.test, check bot_token")?;

        let bot_user_id = auth_response.user_id.to_string();

        tracing::info!(
            bot_user = %bot_user_id,
            team = %auth_response.team,
            "Slack bot authenticated"
        );

        let transport = Arc::new(SlackTransport::new(Arc::clone(&client), bot_token));

        Ok(Self {
            client,
            app_token,
            bot_user_id,
            transport,
        })
    }

    pub fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    /// Listen for events until the Socket Mode connection shuts down.
    pub async fn serve(self, config: Arc<Config>, agent: AgentHandle) -> Result<()> {
        let bridge_state = SlackBridgeState {
            config,
            agent,
            transport: self.transport,
            bot_user_id: self.bot_user_id,
        };

        let socket_mode_callbacks =
            SlackSocketModeListenerCallbacks::new().with_push_events(handle_push_event);

        let listener_environment = Arc::new(
            SlackClientEventsListenerEnvironment::new(Arc::clone(&self.client))
                .with_error_handler(socket_mode_error_handler)
                .with_user_state(bridge_state),
        );

        let socket_mode_listener = SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment,
            socket_mode_callbacks,
        );

        socket_mode_listener
            .listen_for(&self.app_token)
            .await
            .context("Failed to start Socket Mode listener")?;
        tracing::info!(platform = "slack", "Socket Mode connected");

        // serve() blocks until the listener is shut down
        socket_mode_listener.serve().await;
        tracing::info!(platform = "slack", "Socket Mode listener stopped");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slack_relay_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SlackRelay>();
        assert_send_sync::<SlackBridgeState>();
    }
}
