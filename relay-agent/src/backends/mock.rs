// ABOUTME: Mock backend for testing - replays pre-configured event scripts.
// ABOUTME: Allows deterministic tests without spawning a real orchestration engine.
//!
//! # Example
//!
//! ```no_run
//! use relay_agent::backends::mock::MockBackend;
//! use relay_agent::{AgentEvent, PromptRequest};
//!
//! # async fn example() {
//! let mock = MockBackend::new()
//!     .on_prompt("hello").respond_text("Hi there!")
//!     .on_prompt("stream").respond_with(vec![
//!         AgentEvent::TurnStart,
//!         AgentEvent::token("Hel"),
//!         AgentEvent::token("lo"),
//!         AgentEvent::Result { text: "Hello".to_string() },
//!     ]);
//!
//! let handle = mock.into_handle();
//! let mut receiver = handle.prompt(PromptRequest::new("hello", "U1")).await.unwrap();
//!
//! if let Some(AgentEvent::Result { text }) = receiver.recv().await {
//!     assert_eq!(text, "Hi there!");
//! }
//! # }
//! ```

use crate::event::{AgentEvent, ErrorCode};
use crate::handle::{AgentHandle, PromptCommand};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Mock backend for testing
pub struct MockBackend {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    event_delay: Option<Duration>,
}

struct Expectation {
    pattern: String,
    events: Vec<AgentEvent>,
}

impl MockBackend {
    /// Create a new mock backend with no expectations
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(VecDeque::new())),
            event_delay: None,
        }
    }

    /// Sleep between emitted events, to exercise time-based flushing
    pub fn with_event_delay(mut self, delay: Duration) -> Self {
        self.event_delay = Some(delay);
        self
    }

    /// Set up an expectation for a prompt matching the given pattern
    pub fn on_prompt(self, pattern: &str) -> ExpectationBuilder {
        ExpectationBuilder {
            backend: self,
            pattern: pattern.to_string(),
        }
    }

    /// Convert this backend into an AgentHandle
    pub fn into_handle(self) -> AgentHandle {
        let (tx, mut rx) = mpsc::channel::<PromptCommand>(32);
        let expectations = self.expectations;
        let event_delay = self.event_delay;

        tokio::spawn(async move {
            while let Some(PromptCommand {
                request,
                event_tx,
                reply,
            }) = rx.recv().await
            {
                let _ = reply.send(Ok(()));

                // FIFO preference: take the front if it matches, otherwise the
                // first matching expectation anywhere in the queue.
                let events = {
                    let mut exp = expectations.lock().unwrap_or_else(|e| e.into_inner());
                    match exp.front() {
                        Some(front) if request.text.contains(&front.pattern) => {
                            exp.pop_front().map(|e| e.events)
                        }
                        Some(_) => exp
                            .iter()
                            .position(|e| request.text.contains(&e.pattern))
                            .and_then(|i| exp.remove(i))
                            .map(|e| e.events),
                        None => None,
                    }
                };

                let events = events.unwrap_or_else(|| {
                    vec![AgentEvent::Result {
                        text: format!("Mock: no expectation for '{}'", request.text),
                    }]
                });

                for event in events {
                    if let Some(delay) = event_delay {
                        tokio::time::sleep(delay).await;
                    }
                    if event_tx.send(event).await.is_err() {
                        break;
                    }
                }
                let _ = event_tx.send(AgentEvent::Done).await;
            }
        });

        AgentHandle::new(tx, "mock")
    }

    /// Factory function for the registry
    pub fn factory() -> crate::registry::BackendFactory {
        Box::new(|_config| Ok(MockBackend::new().into_handle()))
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for setting up mock expectations with a fluent API
pub struct ExpectationBuilder {
    backend: MockBackend,
    pattern: String,
}

impl ExpectationBuilder {
    /// Respond with a list of events. A terminal `Done` is always appended.
    pub fn respond_with(self, events: Vec<AgentEvent>) -> MockBackend {
        self.backend
            .expectations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Expectation {
                pattern: self.pattern,
                events,
            });
        self.backend
    }

    /// Respond with a simple text result
    pub fn respond_text(self, text: &str) -> MockBackend {
        self.respond_with(vec![AgentEvent::Result {
            text: text.to_string(),
        }])
    }

    /// Respond with an error
    pub fn respond_error(self, code: ErrorCode, message: &str) -> MockBackend {
        self.respond_with(vec![AgentEvent::Error {
            code,
            message: message.to_string(),
        }])
    }
}
