// ABOUTME: Renders semantic agent output (status, thought, action, error, plain) into Block Kit payloads.
// ABOUTME: Prefixes are applied before chunking; block lists are split to respect the per-message limit.

use crate::chunk::{ChunkBounds, SLACK_MAX_BLOCKS};
use crate::error::DeliveryError;
use serde::Serialize;
use serde_json::{json, Value};

/// Image shown next to error messages
pub const ERROR_PNG: &str = "https://dim8ibqgp8o75.cloudfront.net/error.png";

pub const THOUGHT_EMOJI: &str = ":thought_balloon:";
pub const ACTION_EMOJI: &str = ":hammer_and_wrench:";

const ERROR_PREFIX: &str = "*Error while processing response:*";

/// Semantic annotation of a piece of agent output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Progress note rendered with the given emoji, e.g. `:envelope:`
    Status(&'static str),
    Thought,
    Action,
    Error,
    Plain,
}

impl EventKind {
    /// Plain-text fallback shown in notifications for this kind, if fixed
    fn fallback_label(&self) -> Option<&'static str> {
        match self {
            Self::Thought => Some("Thought..."),
            Self::Action => Some("Action..."),
            Self::Error => Some("Error while processing response"),
            Self::Status(_) | Self::Plain => None,
        }
    }
}

/// One postable message: plain-text fallback plus structured blocks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagePayload {
    pub text: String,
    pub blocks: Vec<Value>,
}

impl MessagePayload {
    pub fn new(text: impl Into<String>, blocks: Vec<Value>) -> Self {
        Self {
            text: text.into(),
            blocks,
        }
    }

    /// A payload with no blocks, delivered as plain text
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }
}

/// Turns agent output into payloads under the platform's size limits
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    block_bounds: ChunkBounds,
    text_bounds: ChunkBounds,
    max_blocks: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            block_bounds: ChunkBounds::BLOCK,
            text_bounds: ChunkBounds::TEXT,
            max_blocks: SLACK_MAX_BLOCKS,
        }
    }
}

impl Renderer {
    pub fn new(
        block_bounds: ChunkBounds,
        text_bounds: ChunkBounds,
        max_blocks: usize,
    ) -> Result<Self, DeliveryError> {
        block_bounds.validate()?;
        text_bounds.validate()?;
        if max_blocks == 0 {
            return Err(DeliveryError::InvalidConfiguration(
                "max_blocks must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            block_bounds,
            text_bounds,
            max_blocks,
        })
    }

    pub fn max_blocks(&self) -> usize {
        self.max_blocks
    }

    pub fn text_bounds(&self) -> ChunkBounds {
        self.text_bounds
    }

    /// Section blocks of mrkdwn text, one per block-sized chunk
    pub fn markdown_blocks(&self, text: &str) -> Vec<Value> {
        self.block_bounds.chunks(text).map(section_block).collect()
    }

    /// Italic text behind an emoji, e.g. `:pencil: _Analyzing..._`
    pub fn emoji_blocks(&self, emoji: &str, text: &str) -> Vec<Value> {
        self.markdown_blocks(&format!("{} _{}_", emoji, text))
    }

    pub fn thought_blocks(&self, thought: &str) -> Vec<Value> {
        self.emoji_blocks(THOUGHT_EMOJI, thought)
    }

    pub fn action_blocks(&self, action: &str) -> Vec<Value> {
        self.emoji_blocks(ACTION_EMOJI, action)
    }

    /// Context blocks carrying the error image and message
    pub fn error_blocks(&self, error: &str) -> Vec<Value> {
        let text = format!("{} {}", ERROR_PREFIX, error);
        self.block_bounds
            .chunks(&text)
            .enumerate()
            .map(|(i, chunk)| {
                let mut elements = Vec::with_capacity(2);
                if i == 0 {
                    elements.push(json!({
                        "type": "image",
                        "image_url": ERROR_PNG,
                        "alt_text": "Error",
                    }));
                }
                elements.push(json!({ "type": "mrkdwn", "text": chunk }));
                json!({ "type": "context", "elements": elements })
            })
            .collect()
    }

    /// All blocks for `content` of the given kind, unsplit
    pub fn blocks(&self, kind: EventKind, content: &str) -> Vec<Value> {
        match kind {
            EventKind::Status(emoji) => self.emoji_blocks(emoji, content),
            EventKind::Thought => self.thought_blocks(content),
            EventKind::Action => self.action_blocks(content),
            EventKind::Error => self.error_blocks(content),
            EventKind::Plain => self.markdown_blocks(content),
        }
    }

    /// Render `content` into independently postable payloads, in order
    pub fn render(&self, kind: EventKind, content: &str) -> Vec<MessagePayload> {
        let batches = self.split_batches(self.blocks(kind, content));
        let fixed = kind.fallback_label();
        batches
            .into_iter()
            .map(|blocks| {
                let text = match fixed {
                    Some(label) => label.to_string(),
                    None => self.fallback_text(&blocks_text(&blocks)),
                };
                MessagePayload::new(text, blocks)
            })
            .collect()
    }

    /// Split a block list into batches of at most `max_blocks`, order preserved
    pub fn split_batches(&self, blocks: Vec<Value>) -> Vec<Vec<Value>> {
        if blocks.is_empty() {
            return Vec::new();
        }
        let mut batches = Vec::with_capacity(blocks.len().div_ceil(self.max_blocks));
        let mut current = Vec::with_capacity(self.max_blocks.min(blocks.len()));
        for block in blocks {
            if current.len() == self.max_blocks {
                batches.push(std::mem::take(&mut current));
            }
            current.push(block);
        }
        batches.push(current);
        batches
    }

    /// First text-sized chunk of `text`, for a message's plain-text field
    pub fn fallback_text(&self, text: &str) -> String {
        self.text_bounds
            .chunks(text)
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

fn section_block(text: &str) -> Value {
    // Slack rejects empty section text
    let text = if text.is_empty() { " " } else { text };
    json!({
        "type": "section",
        "text": {
            "type": "mrkdwn",
            "text": text,
        }
    })
}

/// Concatenated text of section blocks
fn blocks_text(blocks: &[Value]) -> String {
    blocks
        .iter()
        .filter_map(|b| b["text"]["text"].as_str())
        .collect()
}
