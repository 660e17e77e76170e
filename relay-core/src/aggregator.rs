// ABOUTME: Buffers streamed fragments and releases them as batches on a size or age policy.
// ABOUTME: A configurable predicate hides fragments (e.g. tool tokens) from the visible stream.

use crate::error::DeliveryError;
use crate::turn::Fragment;
use relay_agent::TokenKind;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default number of fragments buffered before a flush
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Returns true for fragments that should be shown
pub type FragmentFilter = Arc<dyn Fn(&Fragment) -> bool + Send + Sync>;

/// Filter that hides tool-invocation tokens
pub fn hide_tool_tokens() -> FragmentFilter {
    Arc::new(|fragment: &Fragment| fragment.kind != TokenKind::Action)
}

pub struct Batcher {
    threshold: usize,
    flush_interval: Option<Duration>,
    filter: Option<FragmentFilter>,
    buffer: Vec<Fragment>,
    oldest: Option<Instant>,
}

impl fmt::Debug for Batcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batcher")
            .field("threshold", &self.threshold)
            .field("flush_interval", &self.flush_interval)
            .field("filtered", &self.filter.is_some())
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl Batcher {
    pub fn new(threshold: usize) -> Result<Self, DeliveryError> {
        if threshold == 0 {
            return Err(DeliveryError::InvalidConfiguration(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            threshold,
            flush_interval: None,
            filter: None,
            buffer: Vec::with_capacity(threshold),
            oldest: None,
        })
    }

    /// Also flush once the oldest buffered fragment reaches this age
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    pub fn with_filter(mut self, filter: FragmentFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffer a fragment, returning a full batch when one is due
    pub fn push(&mut self, fragment: Fragment) -> Option<Vec<Fragment>> {
        if let Some(filter) = &self.filter {
            if !filter(&fragment) {
                return None;
            }
        }
        if self.buffer.is_empty() {
            self.oldest = Some(Instant::now());
        }
        self.buffer.push(fragment);

        if self.buffer.len() >= self.threshold || self.is_due() {
            self.drain()
        } else {
            None
        }
    }

    /// When the buffered fragments must be flushed by age, if ever
    pub fn deadline(&self) -> Option<Instant> {
        Some(self.oldest? + self.flush_interval?)
    }

    /// Whether the age policy calls for a flush now
    pub fn is_due(&self) -> bool {
        self.deadline()
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Take everything buffered. `None` when there is nothing to flush.
    pub fn drain(&mut self) -> Option<Vec<Fragment>> {
        self.oldest = None;
        if self.buffer.is_empty() {
            return None;
        }
        Some(std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.threshold),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(batch: &[Fragment]) -> Vec<&str> {
        batch.iter().map(|f| f.text.as_str()).collect()
    }

    #[test]
    fn test_zero_threshold_rejected() {
        assert!(matches!(
            Batcher::new(0),
            Err(DeliveryError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_flushes_at_threshold() {
        let mut batcher = Batcher::new(3).unwrap();
        assert!(batcher.push(Fragment::text("a")).is_none());
        assert!(batcher.push(Fragment::text("b")).is_none());
        let batch = batcher.push(Fragment::text("c")).unwrap();
        assert_eq!(texts(&batch), vec!["a", "b", "c"]);
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_drain_returns_partial_batch_once() {
        let mut batcher = Batcher::new(100).unwrap();
        batcher.push(Fragment::text("x"));
        batcher.push(Fragment::text("y"));
        assert_eq!(texts(&batcher.drain().unwrap()), vec!["x", "y"]);
        assert!(batcher.drain().is_none());
    }

    #[test]
    fn test_threshold_one_flushes_every_fragment() {
        let mut batcher = Batcher::new(1).unwrap();
        for t in ["Hel", "lo, ", "world"] {
            let batch = batcher.push(Fragment::text(t)).unwrap();
            assert_eq!(texts(&batch), vec![t]);
        }
    }

    #[test]
    fn test_filter_hides_tool_tokens() {
        let mut batcher = Batcher::new(2).unwrap().with_filter(hide_tool_tokens());
        assert!(batcher
            .push(Fragment::new("{\"query\":", TokenKind::Action))
            .is_none());
        assert_eq!(batcher.len(), 0);
        batcher.push(Fragment::text("visible"));
        assert_eq!(batcher.len(), 1);
    }

    #[test]
    fn test_custom_filter() {
        let mut batcher = Batcher::new(10)
            .unwrap()
            .with_filter(Arc::new(|f: &Fragment| !f.text.trim().is_empty()));
        batcher.push(Fragment::text("   "));
        batcher.push(Fragment::text("kept"));
        assert_eq!(texts(&batcher.drain().unwrap()), vec!["kept"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_age_policy() {
        let mut batcher = Batcher::new(100)
            .unwrap()
            .with_flush_interval(Duration::from_millis(500));
        assert!(batcher.deadline().is_none());

        assert!(batcher.push(Fragment::text("a")).is_none());
        assert!(!batcher.is_due());

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(batcher.is_due());
        let batch = batcher.push(Fragment::text("b")).unwrap();
        assert_eq!(texts(&batch), vec!["a", "b"]);
        assert!(batcher.deadline().is_none());
    }

    #[test]
    fn test_no_interval_never_due() {
        let mut batcher = Batcher::new(5).unwrap();
        batcher.push(Fragment::text("a"));
        assert!(batcher.deadline().is_none());
        assert!(!batcher.is_due());
    }
}
