// ABOUTME: Inbound routing tests: which Slack events start a turn and where it replies
// ABOUTME: Also runs a routed DM end-to-end against the mock backend and recording transport

use relay::handler::{route, InboundKind, InboundMessage, Route};
use relay_agent::backends::mock::MockBackend;
use relay_core::config::SlackConfig;
use relay_core::testing::RecordingTransport;
use relay_core::{respond_in_thread, Config};
use std::sync::Arc;

const BOT: &str = "UBOT";

fn message(channel: &str, channel_type: &str, text: &str) -> InboundMessage {
    InboundMessage {
        kind: InboundKind::Message,
        channel: channel.to_string(),
        channel_type: Some(channel_type.to_string()),
        user: Some("U1".to_string()),
        bot_id: None,
        subtype: None,
        text: Some(text.to_string()),
        ts: "1700000000.000500".to_string(),
        thread_ts: None,
    }
}

fn mention(channel: &str, text: &str) -> InboundMessage {
    InboundMessage {
        kind: InboundKind::Mention,
        channel_type: None,
        ..message(channel, "channel", text)
    }
}

fn respond(route: Route) -> relay_core::TurnRequest {
    match route {
        Route::Respond(request) => request,
        Route::Ignore(reason) => panic!("expected a turn, ignored: {}", reason),
    }
}

#[test]
fn test_direct_message_starts_turn_rooted_at_message() {
    let request = respond(route(&message("D1", "im", "hello"), BOT, &SlackConfig::default()));

    assert_eq!(request.destination.channel, "D1");
    assert_eq!(request.destination.thread_id, "1700000000.000500");
    assert_eq!(request.message_id, "1700000000.000500");
    assert_eq!(request.user_id, "U1");
    assert_eq!(request.text, "hello");
}

#[test]
fn test_reply_in_existing_thread_stays_in_thread() {
    let mut msg = message("D1", "im", "follow-up");
    msg.thread_ts = Some("1700000000.000100".to_string());

    let request = respond(route(&msg, BOT, &SlackConfig::default()));
    assert_eq!(request.destination.thread_id, "1700000000.000100");
    // Reactions still target the new message itself
    assert_eq!(request.message_id, "1700000000.000500");
}

#[test]
fn test_channel_message_without_mention_ignored() {
    assert_eq!(
        route(&message("C1", "channel", "chatter"), BOT, &SlackConfig::default()),
        Route::Ignore("not a direct message")
    );
}

#[test]
fn test_mention_in_channel_starts_turn() {
    let request = respond(route(
        &mention("C1", "<@UBOT> summarize"),
        BOT,
        &SlackConfig::default(),
    ));
    assert_eq!(request.destination.channel, "C1");
    assert_eq!(request.text, "<@UBOT> summarize");
}

#[test]
fn test_bot_and_own_messages_ignored() {
    let mut from_bot = message("D1", "im", "beep");
    from_bot.bot_id = Some("B1".to_string());
    assert_eq!(
        route(&from_bot, BOT, &SlackConfig::default()),
        Route::Ignore("bot message")
    );

    let mut own = message("D1", "im", "my answer");
    own.user = Some(BOT.to_string());
    assert_eq!(
        route(&own, BOT, &SlackConfig::default()),
        Route::Ignore("own message")
    );
}

#[test]
fn test_allowlists_applied() {
    let slack = SlackConfig {
        allowed_users: vec!["U2".to_string()],
        ..SlackConfig::default()
    };
    assert_eq!(
        route(&message("D1", "im", "hi"), BOT, &slack),
        Route::Ignore("user not allowed")
    );

    let slack = SlackConfig {
        allowed_channels: vec!["C2".to_string()],
        ..SlackConfig::default()
    };
    assert_eq!(
        route(&mention("C1", "hi"), BOT, &slack),
        Route::Ignore("channel not allowed")
    );
    assert!(matches!(route(&mention("C2", "hi"), BOT, &slack), Route::Respond(_)));
    // The channel allowlist does not apply to direct messages
    assert!(matches!(
        route(&message("D9", "im", "hi"), BOT, &slack),
        Route::Respond(_)
    ));
}

#[test]
fn test_blank_text_ignored() {
    assert_eq!(
        route(&message("D1", "im", "  \n"), BOT, &SlackConfig::default()),
        Route::Ignore("empty text")
    );
}

#[tokio::test]
async fn test_routed_direct_message_answered_in_thread() {
    let request = respond(route(&message("D1", "im", "ping"), BOT, &SlackConfig::default()));
    let transport = Arc::new(RecordingTransport::new());
    let agent = MockBackend::new()
        .on_prompt("ping")
        .respond_text("pong")
        .into_handle();

    respond_in_thread(&Config::default(), &agent, transport.clone(), request).await;

    let posted = transport.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].text, "pong");
}
