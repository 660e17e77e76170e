// ABOUTME: AgentHandle provides a Send+Sync front for whatever runs the agent.
// ABOUTME: Uses channels to hand prompts to a backend worker task and stream events back.

use crate::AgentEvent;
use anyhow::Result;
use tokio::sync::{mpsc, oneshot};

/// What the agent is asked to do for one conversation turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    /// The user's message text
    pub text: String,
    /// Conversation key the engine may use for memory (the chat thread id)
    pub thread_alias: Option<String>,
    /// Platform user id of the sender
    pub user_id: String,
}

impl PromptRequest {
    pub fn new(text: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            thread_alias: None,
            user_id: user_id.into(),
        }
    }

    pub fn with_thread_alias(mut self, alias: impl Into<String>) -> Self {
        self.thread_alias = Some(alias.into());
        self
    }
}

/// Prompt handed from an AgentHandle to the backend worker
#[derive(Debug)]
pub struct PromptCommand {
    pub request: PromptRequest,
    pub event_tx: mpsc::Sender<AgentEvent>,
    pub reply: oneshot::Sender<Result<()>>,
}

/// Send + Sync handle that relay interacts with.
///
/// Internally communicates with a worker task that runs the actual
/// backend, so backends never need to be shared across turns directly.
#[derive(Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<PromptCommand>,
    name: &'static str,
}

impl AgentHandle {
    /// Create a new AgentHandle with the given command channel and backend name
    pub fn new(tx: mpsc::Sender<PromptCommand>, name: &'static str) -> Self {
        Self { tx, name }
    }

    /// Get the backend name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Send a prompt and receive events via EventReceiver
    pub async fn prompt(&self, request: PromptRequest) -> Result<EventReceiver> {
        let (event_tx, event_rx) = mpsc::channel(2048);
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(PromptCommand {
                request,
                event_tx,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("Backend worker closed"))?;

        // Wait for the backend to acknowledge the prompt started
        reply_rx
            .await
            .map_err(|_| anyhow::anyhow!("Backend worker dropped reply channel"))??;

        Ok(EventReceiver::new(event_rx))
    }
}

/// Receiver for streaming events from a prompt.
///
/// This is `Send` so it can be passed across async task boundaries.
pub struct EventReceiver {
    rx: mpsc::Receiver<AgentEvent>,
}

impl EventReceiver {
    /// Create a new EventReceiver wrapping the given channel
    pub fn new(rx: mpsc::Receiver<AgentEvent>) -> Self {
        Self { rx }
    }

    /// Receive the next event, or None if the stream is closed
    pub async fn recv(&mut self) -> Option<AgentEvent> {
        self.rx.recv().await
    }
}
