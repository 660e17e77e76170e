// ABOUTME: Maps agent progress events to what the user sees: status blocks or stream fragments.
// ABOUTME: Results, errors, and Done are not rendered here; the responder owns them.

use crate::blocks::{MessagePayload, Renderer};
use crate::turn::Fragment;
use relay_agent::AgentEvent;
use serde_json::Value;

pub const STARTING_EMOJI: &str = ":envelope:";
pub const FINISHING_EMOJI: &str = ":pencil:";

/// Visible output for one agent event
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Block payloads for single-delivery turns, in posting order
    Blocks(Vec<MessagePayload>),
    /// A streamed token for batched turns
    Fragment(Fragment),
}

/// Render an agent event, or `None` if it has no visible output
pub fn payload_for(renderer: &Renderer, event: &AgentEvent) -> Option<EventPayload> {
    match event {
        AgentEvent::TurnStart => Some(blocks_payload(
            renderer,
            "Starting...",
            renderer.emoji_blocks(STARTING_EMOJI, "Reading the data..."),
        )),
        AgentEvent::SubtaskStart { thought, actions } => {
            let actions = actions.as_ref()?;
            let mut blocks = renderer.thought_blocks(thought.as_deref().unwrap_or("Thought..."));
            for action in actions {
                blocks.extend(renderer.action_blocks(action));
            }
            Some(blocks_payload(renderer, "Thought...", blocks))
        }
        AgentEvent::SubtaskFinish => Some(blocks_payload(
            renderer,
            "Finishing...",
            renderer.emoji_blocks(FINISHING_EMOJI, "Analyzing the data..."),
        )),
        AgentEvent::TokenChunk { text, kind } => {
            Some(EventPayload::Fragment(Fragment::new(text.clone(), *kind)))
        }
        AgentEvent::Result { .. } | AgentEvent::Error { .. } | AgentEvent::Done => None,
    }
}

fn blocks_payload(renderer: &Renderer, text: &str, blocks: Vec<Value>) -> EventPayload {
    EventPayload::Blocks(
        renderer
            .split_batches(blocks)
            .into_iter()
            .map(|batch| MessagePayload::new(text, batch))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_agent::{ErrorCode, TokenKind};

    fn single(payload: Option<EventPayload>) -> MessagePayload {
        match payload {
            Some(EventPayload::Blocks(mut payloads)) => {
                assert_eq!(payloads.len(), 1);
                payloads.remove(0)
            }
            other => panic!("expected blocks, got {:?}", other),
        }
    }

    fn text_of(block: &Value) -> &str {
        block["text"]["text"].as_str().unwrap()
    }

    #[test]
    fn test_turn_start_status() {
        let p = single(payload_for(&Renderer::default(), &AgentEvent::TurnStart));
        assert_eq!(p.text, "Starting...");
        assert_eq!(text_of(&p.blocks[0]), ":envelope: _Reading the data..._");
    }

    #[test]
    fn test_subtask_finish_status() {
        let p = single(payload_for(&Renderer::default(), &AgentEvent::SubtaskFinish));
        assert_eq!(p.text, "Finishing...");
        assert_eq!(text_of(&p.blocks[0]), ":pencil: _Analyzing the data..._");
    }

    #[test]
    fn test_subtask_start_thought_then_actions() {
        let event = AgentEvent::SubtaskStart {
            thought: Some("Need the weather".to_string()),
            actions: Some(vec!["weather(city=Oslo)".to_string(), "clock()".to_string()]),
        };
        let p = single(payload_for(&Renderer::default(), &event));
        assert_eq!(p.text, "Thought...");
        assert_eq!(p.blocks.len(), 3);
        assert_eq!(text_of(&p.blocks[0]), ":thought_balloon: _Need the weather_");
        assert_eq!(
            text_of(&p.blocks[1]),
            ":hammer_and_wrench: _weather(city=Oslo)_"
        );
        assert_eq!(text_of(&p.blocks[2]), ":hammer_and_wrench: _clock()_");
    }

    #[test]
    fn test_subtask_start_default_thought() {
        let event = AgentEvent::SubtaskStart {
            thought: None,
            actions: Some(vec![]),
        };
        let p = single(payload_for(&Renderer::default(), &event));
        assert_eq!(text_of(&p.blocks[0]), ":thought_balloon: _Thought..._");
    }

    #[test]
    fn test_subtask_start_without_actions_is_silent() {
        let event = AgentEvent::SubtaskStart {
            thought: Some("hmm".to_string()),
            actions: None,
        };
        assert!(payload_for(&Renderer::default(), &event).is_none());
    }

    #[test]
    fn test_many_actions_split_into_batches() {
        let event = AgentEvent::SubtaskStart {
            thought: None,
            actions: Some((0..60).map(|i| format!("tool_{}()", i)).collect()),
        };
        match payload_for(&Renderer::default(), &event) {
            Some(EventPayload::Blocks(payloads)) => {
                assert_eq!(payloads.len(), 2);
                assert_eq!(payloads[0].blocks.len(), 50);
                assert_eq!(payloads[1].blocks.len(), 11);
                assert!(payloads.iter().all(|p| p.text == "Thought..."));
            }
            other => panic!("expected blocks, got {:?}", other),
        }
    }

    #[test]
    fn test_token_chunk_keeps_kind() {
        let event = AgentEvent::TokenChunk {
            text: "{\"q\"".to_string(),
            kind: TokenKind::Action,
        };
        assert_eq!(
            payload_for(&Renderer::default(), &event),
            Some(EventPayload::Fragment(Fragment::new("{\"q\"", TokenKind::Action)))
        );
    }

    #[test]
    fn test_terminal_events_not_rendered() {
        let r = Renderer::default();
        assert!(payload_for(&r, &AgentEvent::Done).is_none());
        assert!(payload_for(
            &r,
            &AgentEvent::Result {
                text: "answer".to_string()
            }
        )
        .is_none());
        assert!(payload_for(
            &r,
            &AgentEvent::Error {
                code: ErrorCode::Timeout,
                message: "slow".to_string()
            }
        )
        .is_none());
    }
}
