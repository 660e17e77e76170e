// ABOUTME: Inbound Slack event routing: decides which messages start an agent turn
// ABOUTME: Pure over a platform-neutral InboundMessage so it is testable without Socket Mode

use relay_core::config::SlackConfig;
use relay_core::{Destination, TurnRequest};

/// Which Slack event delivered the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    /// `message` event (any channel type)
    Message,
    /// `app_mention` event
    Mention,
}

/// The fields of an inbound Slack event that routing looks at
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub kind: InboundKind,
    pub channel: String,
    /// `im`, `channel`, `group`, `mpim` when Slack sends it
    pub channel_type: Option<String>,
    pub user: Option<String>,
    pub bot_id: Option<String>,
    /// Set for edits, deletions, bot messages and other non-user messages
    pub subtype: Option<String>,
    pub text: Option<String>,
    pub ts: String,
    pub thread_ts: Option<String>,
}

impl InboundMessage {
    /// Direct message channel; Slack omits channel_type on some payloads
    pub fn is_direct(&self) -> bool {
        match self.channel_type.as_deref() {
            Some(t) => t == "im",
            None => self.channel.starts_with('D'),
        }
    }

    /// The thread a reply belongs in: the existing thread or a new one rooted here
    pub fn thread_id(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

/// Routing decision for one inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Respond(TurnRequest),
    Ignore(&'static str),
}

/// Decide whether an inbound event starts a turn.
///
/// Direct messages arrive as `message` events; channel conversations only
/// respond to `app_mention` so the bot does not answer every channel message
/// (and does not answer a mention twice).
pub fn route(msg: &InboundMessage, bot_user_id: &str, slack: &SlackConfig) -> Route {
    if msg.bot_id.is_some() {
        return Route::Ignore("bot message");
    }
    if msg.subtype.is_some() {
        return Route::Ignore("message subtype");
    }
    let Some(user) = msg.user.as_deref() else {
        return Route::Ignore("no sender");
    };
    if user == bot_user_id {
        return Route::Ignore("own message");
    }

    match msg.kind {
        InboundKind::Message if !msg.is_direct() => return Route::Ignore("not a direct message"),
        InboundKind::Mention if msg.is_direct() => return Route::Ignore("mention in direct message"),
        _ => {}
    }

    if !slack.is_user_allowed(user) {
        return Route::Ignore("user not allowed");
    }
    if !msg.is_direct() && !slack.is_channel_allowed(&msg.channel) {
        return Route::Ignore("channel not allowed");
    }

    let text = msg.text.as_deref().unwrap_or_default();
    if text.trim().is_empty() {
        return Route::Ignore("empty text");
    }

    Route::Respond(TurnRequest {
        destination: Destination::new(msg.channel.clone(), msg.thread_id()),
        message_id: msg.ts.clone(),
        user_id: user.to_string(),
        text: text.to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
