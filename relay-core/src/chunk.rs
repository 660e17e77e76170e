// ABOUTME: Splits long text into platform-sized chunks with human-friendly break points.
// ABOUTME: Prefers periods/newlines, then spaces, then a hard cut; chunks concatenate back to the input.

use crate::error::DeliveryError;
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;

/// Maximum characters in a single section block's text
pub const SLACK_MAX_BLOCK_CHARS: usize = 3000;

/// Maximum characters in a message's top-level text
pub const SLACK_MAX_TEXT_CHARS: usize = 40_000;

/// Maximum blocks per message
pub const SLACK_MAX_BLOCKS: usize = 50;

/// Search window for break points, in characters.
///
/// A chunk is cut at the right-most break character found in `[min, max)`,
/// so `min` controls how short a non-final chunk may get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBounds {
    pub min: usize,
    pub max: usize,
}

impl ChunkBounds {
    /// Bounds for the text of one section block
    pub const BLOCK: Self = Self {
        min: SLACK_MAX_BLOCK_CHARS - 200,
        max: SLACK_MAX_BLOCK_CHARS,
    };

    /// Bounds for a message's plain-text field, keeping a 1000 char margin
    pub const TEXT: Self = Self {
        min: SLACK_MAX_TEXT_CHARS - 2000,
        max: SLACK_MAX_TEXT_CHARS - 1000,
    };

    pub fn new(min: usize, max: usize) -> Result<Self, DeliveryError> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), DeliveryError> {
        if self.min >= self.max {
            return Err(DeliveryError::InvalidConfiguration(format!(
                "chunk bounds require min < max, got min={} max={}",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// Chunk `text` with these bounds
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            rest: Some(text),
            min: self.min,
            max: self.max,
        }
    }
}

/// Split `text` into chunks no longer than `max_size`.
///
/// Fails with [`DeliveryError::InvalidConfiguration`] unless `min_size < max_size`.
pub fn chunk(text: &str, min_size: usize, max_size: usize) -> Result<Chunks<'_>, DeliveryError> {
    Ok(ChunkBounds::new(min_size, max_size)?.chunks(text))
}

/// Lazy iterator over the chunks of a string. Clone it to restart.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    rest: Option<&'a str>,
    min: usize,
    max: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        if rendered_len(rest) <= self.max {
            self.rest = None;
            return Some(rest);
        }

        let cut = break_point(rest, self.min, self.max);
        if cut >= rest.len() {
            // A single newline over a budget of one
            self.rest = None;
            return Some(rest);
        }

        let (head, tail) = rest.split_at(cut);
        self.rest = Some(tail);
        Some(head)
    }
}

impl FusedIterator for Chunks<'_> {}

/// Length as counted against the budget: newlines cost one extra unit
pub fn rendered_len(text: &str) -> usize {
    text.chars().count() + text.matches('\n').count()
}

/// Byte offset at which to cut. The break character starts the next chunk.
///
/// The search window `[min, max)` is measured in rendered length, so a chunk
/// ending at any offset in it stays within `max`.
fn break_point(text: &str, min: usize, max: usize) -> usize {
    let mut start = None;
    let mut end = text.len();
    let mut used = 0;
    for (i, c) in text.char_indices() {
        // `used` is the rendered length of text[..i]
        if start.is_none() && i > 0 && used >= min {
            start = Some(i);
        }
        let cost = if c == '\n' { 2 } else { 1 };
        if used + cost > max {
            end = i;
            break;
        }
        used += cost;
    }

    // A cut at 0 would never make progress
    if end == 0 {
        return text.chars().next().map_or(0, char::len_utf8);
    }
    let Some(start) = start.filter(|&s| s < end) else {
        return end;
    };
    let window = &text[start..end];

    let sentence = window.rfind('.').max(window.rfind('\n'));
    match sentence.or_else(|| window.rfind(' ')) {
        Some(i) => start + i,
        None => end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(text: &str, min: usize, max: usize) -> Vec<&str> {
        chunk(text, min, max).unwrap().collect()
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(collect("hello", 2, 10), vec!["hello"]);
    }

    #[test]
    fn test_empty_text_is_one_empty_chunk() {
        assert_eq!(collect("", 0, 10), vec![""]);
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(matches!(
            chunk("abc", 10, 10),
            Err(DeliveryError::InvalidConfiguration(_))
        ));
        assert!(chunk("abc", 11, 10).is_err());
        assert!(ChunkBounds::new(0, 1).is_ok());
    }

    #[test]
    fn test_period_break_keeps_period_with_next_chunk() {
        let text = "aaaaaaa. bbbbbbbbbb";
        let chunks = collect(text, 3, 10);
        assert_eq!(chunks[0], "aaaaaaa");
        assert!(chunks[1].starts_with(". "));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_later_newline_beats_earlier_period() {
        // period at 10, newline at 20, window [5, 25)
        let mut text = String::new();
        text.push_str(&"a".repeat(10));
        text.push('.');
        text.push_str(&"b".repeat(9));
        text.push('\n');
        text.push_str(&"c".repeat(20));
        let chunks = collect(&text, 5, 25);
        assert_eq!(chunks[0].chars().count(), 20);
        assert!(chunks[1].starts_with('\n'));
    }

    #[test]
    fn test_later_period_beats_earlier_newline() {
        let text = format!("{}\n{}.{}", "a".repeat(8), "b".repeat(8), "c".repeat(20));
        let chunks = collect(&text, 5, 25);
        assert_eq!(chunks[0], format!("{}\n{}", "a".repeat(8), "b".repeat(8)));
    }

    #[test]
    fn test_space_used_when_no_sentence_break() {
        let text = format!("{} {}", "a".repeat(12), "b".repeat(20));
        let chunks = collect(&text, 5, 20);
        assert_eq!(chunks[0], "a".repeat(12));
        assert!(chunks[1].starts_with(' '));
    }

    #[test]
    fn test_break_before_min_is_ignored() {
        // The only space sits before the window, so the cut is hard
        let text = format!("ab {}", "c".repeat(30));
        let chunks = collect(&text, 5, 20);
        assert_eq!(chunks[0].chars().count(), 20);
    }

    #[test]
    fn test_hard_cut_block_scenario() {
        let text = "x".repeat(3001);
        let chunks: Vec<&str> = ChunkBounds::BLOCK.chunks(&text).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 3000);
        assert_eq!(chunks[1].len(), 1);
    }

    #[test]
    fn test_newlines_count_against_budget() {
        // 9 chars + 2 newlines = 11 rendered, over a budget of 10
        let text = "abc\ndef\ng";
        let chunks = collect(text, 2, 10);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_newline_heavy_text_stays_within_rendered_budget() {
        let text = "a\n".repeat(10);
        let chunks = collect(&text, 0, 10);
        assert_eq!(chunks.concat(), text);
        for c in &chunks {
            assert!(rendered_len(c) <= 10, "chunk {:?} renders to {}", c, rendered_len(c));
        }
        // The window ends before the fourth newline; the third one starts the next chunk
        assert_eq!(chunks[0], "a\na\na");
    }

    #[test]
    fn test_lone_newline_over_tiny_budget_still_progresses() {
        let chunks = collect("\n\n", 0, 1);
        assert_eq!(chunks, vec!["\n", "\n"]);
    }

    #[test]
    fn test_multibyte_text_cuts_on_char_boundaries() {
        let text = "é".repeat(25);
        let chunks = collect(&text, 5, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_min_zero_never_emits_empty_chunk() {
        let text = ".........................";
        let chunks = collect(text, 0, 10);
        assert!(chunks.iter().all(|c| !c.is_empty()));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_chunks_are_restartable() {
        let text = "one. two. three. four. five. six.";
        let iter = chunk(text, 3, 12).unwrap();
        let first: Vec<&str> = iter.clone().collect();
        let second: Vec<&str> = iter.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reassembly_and_size_bound_on_generated_text() {
        // Deterministic pseudo-random text over a small alphabet
        let alphabet = ['a', 'b', ' ', '.', 'c', 'ü', '\n', 'd', ' ', '\n'];
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        for round in 0..50 {
            let len = 50 + round * 37;
            let mut text = String::with_capacity(len);
            for _ in 0..len {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                text.push(alphabet[(seed % alphabet.len() as u64) as usize]);
            }
            for (min, max) in [(0, 7), (10, 40), (30, 31), (90, 100)] {
                let chunks = collect(&text, min, max);
                assert_eq!(chunks.concat(), text);
                for c in &chunks {
                    assert!(rendered_len(c) <= max, "chunk {:?} over {}", c, max);
                }
            }
        }
    }

    #[test]
    fn test_text_bounds_keep_margin() {
        assert_eq!(ChunkBounds::TEXT.max, 39_000);
        assert!(ChunkBounds::TEXT.validate().is_ok());
        assert_eq!(ChunkBounds::BLOCK, ChunkBounds { min: 2800, max: 3000 });
    }
}
