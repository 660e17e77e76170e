// ABOUTME: Recording chat transport for tests: captures every call and can be scripted to fail.
// ABOUTME: Optional deterministic jitter widens race windows in concurrency tests.

use crate::blocks::MessagePayload;
use crate::error::TransportError;
use crate::transport::{ChatTransport, Destination};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One call observed by [`RecordingTransport`], in attempt order
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Post {
        destination: Destination,
        payload: MessagePayload,
        /// Id handed back, or `None` if the post was scripted to fail
        message_id: Option<String>,
    },
    Update {
        message_id: String,
        destination: Destination,
        payload: MessagePayload,
        ok: bool,
    },
    React {
        emoji: String,
        message_id: String,
        channel: String,
    },
    TypingStatus {
        text: String,
        destination: Destination,
    },
}

#[derive(Debug, Default)]
struct Script {
    failing_posts: usize,
    failing_updates: usize,
    all_posts_fail: bool,
    all_updates_fail: bool,
    side_calls_fail: bool,
}

/// In-memory [`ChatTransport`] that records instead of sending
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    calls: Arc<Mutex<Vec<TransportCall>>>,
    script: Arc<Mutex<Script>>,
    next_id: Arc<AtomicUsize>,
    jitter_ms: u64,
    jitter_state: Arc<AtomicU64>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep a pseudo-random 0..max_ms before completing each post/update
    pub fn with_jitter(mut self, max_ms: u64) -> Self {
        self.jitter_ms = max_ms;
        self.jitter_state.store(0x9E37_79B9_7F4A_7C15, Ordering::SeqCst);
        self
    }

    pub fn fail_next_posts(&self, n: usize) {
        self.script().failing_posts += n;
    }

    pub fn fail_next_updates(&self, n: usize) {
        self.script().failing_updates += n;
    }

    pub fn fail_all_posts(&self) {
        self.script().all_posts_fail = true;
    }

    pub fn fail_all_updates(&self) {
        self.script().all_updates_fail = true;
    }

    /// Make reactions and typing status calls fail
    pub fn fail_side_calls(&self) {
        self.script().side_calls_fail = true;
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Payloads of successful posts, in order
    pub fn posted(&self) -> Vec<MessagePayload> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Post {
                    payload,
                    message_id: Some(_),
                    ..
                } => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// Payloads of successful updates, in order
    pub fn updated(&self) -> Vec<MessagePayload> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Update {
                    payload, ok: true, ..
                } => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// Texts of typing status calls, in order
    pub fn statuses(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::TypingStatus { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: TransportCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    async fn jitter(&self) {
        if self.jitter_ms == 0 {
            return;
        }
        // xorshift step shared by all clones
        let mut x = self.jitter_state.load(Ordering::SeqCst);
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.jitter_state.store(x, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(x % self.jitter_ms)).await;
    }

    fn take_failure(count: &mut usize, always: bool) -> bool {
        if always {
            return true;
        }
        if *count > 0 {
            *count -= 1;
            return true;
        }
        false
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn post(
        &self,
        destination: &Destination,
        payload: &MessagePayload,
    ) -> Result<String, TransportError> {
        self.jitter().await;
        let fail = {
            let mut script = self.script();
            let always = script.all_posts_fail;
            Self::take_failure(&mut script.failing_posts, always)
        };
        let message_id = (!fail).then(|| {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            format!("1700000000.{:06}", n)
        });
        self.record(TransportCall::Post {
            destination: destination.clone(),
            payload: payload.clone(),
            message_id: message_id.clone(),
        });
        message_id.ok_or_else(|| TransportError::Platform("scripted post failure".to_string()))
    }

    async fn update(
        &self,
        message_id: &str,
        destination: &Destination,
        payload: &MessagePayload,
    ) -> Result<(), TransportError> {
        self.jitter().await;
        let fail = {
            let mut script = self.script();
            let always = script.all_updates_fail;
            Self::take_failure(&mut script.failing_updates, always)
        };
        self.record(TransportCall::Update {
            message_id: message_id.to_string(),
            destination: destination.clone(),
            payload: payload.clone(),
            ok: !fail,
        });
        if fail {
            Err(TransportError::Platform("scripted update failure".to_string()))
        } else {
            Ok(())
        }
    }

    async fn react(
        &self,
        emoji: &str,
        message_id: &str,
        channel: &str,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::React {
            emoji: emoji.to_string(),
            message_id: message_id.to_string(),
            channel: channel.to_string(),
        });
        if self.script().side_calls_fail {
            return Err(TransportError::Connection("scripted reaction failure".to_string()));
        }
        Ok(())
    }

    async fn set_typing_status(
        &self,
        text: &str,
        destination: &Destination,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::TypingStatus {
            text: text.to_string(),
            destination: destination.clone(),
        });
        if self.script().side_calls_fail {
            return Err(TransportError::Connection("scripted status failure".to_string()));
        }
        Ok(())
    }
}
