// ABOUTME: Chat platform adapters for relay
// ABOUTME: Slack is the only platform; it supplies both inbound events and the ChatTransport

pub mod slack;

pub use slack::{SlackRelay, SlackTransport};
