// ABOUTME: Delivery driver chosen per turn: single (status blocks appended) or batched (streamed text).
// ABOUTME: Routes rendered agent events into the turn's state machine or the typing status.

use crate::aggregator::Batcher;
use crate::blocks::{MessagePayload, Renderer};
use crate::config::Config;
use crate::error::DeliveryError;
use crate::handlers::{payload_for, EventPayload};
use crate::metrics;
use crate::transport::{set_typing_status_best_effort, ChatTransport};
use crate::turn::{ConversationTurn, Fragment};
use relay_agent::AgentEvent;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Delivers status blocks, each appended to the turn's message
pub struct SingleDelivery {
    turn: Arc<ConversationTurn>,
    transport: Arc<dyn ChatTransport>,
    typing_status: bool,
}

impl SingleDelivery {
    pub fn new(
        turn: Arc<ConversationTurn>,
        transport: Arc<dyn ChatTransport>,
        typing_status: bool,
    ) -> Self {
        Self {
            turn,
            transport,
            typing_status,
        }
    }

    /// Deliver one payload. Text-only payloads, and every payload in typing
    /// status mode, go to the assistant status line instead of the thread.
    pub async fn publish(&self, payload: &MessagePayload) -> Result<(), DeliveryError> {
        if self.typing_status || payload.blocks.is_empty() {
            set_typing_status_best_effort(
                self.transport.as_ref(),
                &payload.text,
                self.turn.destination(),
            )
            .await;
            return Ok(());
        }
        self.turn.deliver(self.transport.as_ref(), payload).await?;
        Ok(())
    }
}

/// Delivers streamed tokens as one growing message
pub struct BatchedDelivery {
    turn: Arc<ConversationTurn>,
    transport: Arc<dyn ChatTransport>,
    // Held across delivery so batches reach the turn in the order they were cut
    batcher: Mutex<Batcher>,
}

impl BatchedDelivery {
    pub fn new(
        turn: Arc<ConversationTurn>,
        transport: Arc<dyn ChatTransport>,
        batcher: Batcher,
    ) -> Self {
        Self {
            turn,
            transport,
            batcher: Mutex::new(batcher),
        }
    }

    pub async fn push(&self, fragment: Fragment) -> Result<(), DeliveryError> {
        let mut batcher = self.batcher.lock().await;
        if let Some(batch) = batcher.push(fragment) {
            self.deliver(&batch).await?;
        }
        Ok(())
    }

    /// Deliver whatever is buffered, regardless of size or age
    pub async fn flush(&self) -> Result<(), DeliveryError> {
        let mut batcher = self.batcher.lock().await;
        if let Some(batch) = batcher.drain() {
            self.deliver(&batch).await?;
        }
        Ok(())
    }

    /// Deliver the buffer only if the age policy says so
    pub async fn flush_if_due(&self) -> Result<(), DeliveryError> {
        let mut batcher = self.batcher.lock().await;
        if batcher.is_due() {
            if let Some(batch) = batcher.drain() {
                self.deliver(&batch).await?;
            }
        }
        Ok(())
    }

    pub async fn deadline(&self) -> Option<Instant> {
        self.batcher.lock().await.deadline()
    }

    async fn deliver(&self, batch: &[Fragment]) -> Result<(), DeliveryError> {
        metrics::record_batch_flushed();
        self.turn
            .deliver_batch(self.transport.as_ref(), batch)
            .await?;
        Ok(())
    }
}

/// How a turn's agent events reach the chat
pub enum Driver {
    Single(SingleDelivery),
    Batched(BatchedDelivery),
}

impl Driver {
    /// Pick the driver for a new turn from configuration
    pub fn for_turn(
        config: &Config,
        turn: Arc<ConversationTurn>,
        transport: Arc<dyn ChatTransport>,
    ) -> Result<Self, DeliveryError> {
        let driver = if config.features.stream_output {
            Driver::Batched(BatchedDelivery::new(
                turn,
                transport,
                config.delivery.batcher()?,
            ))
        } else {
            Driver::Single(SingleDelivery::new(
                turn,
                transport,
                config.features.assistant_typing_status,
            ))
        };
        metrics::record_turn(driver.mode());
        Ok(driver)
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Single(_) => "single",
            Self::Batched(_) => "batched",
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Batched(_))
    }

    pub fn turn(&self) -> &Arc<ConversationTurn> {
        match self {
            Self::Single(d) => &d.turn,
            Self::Batched(d) => &d.turn,
        }
    }

    fn renderer(&self) -> &Renderer {
        self.turn().renderer()
    }

    /// Render and deliver one agent event.
    ///
    /// Single turns show progress blocks and ignore tokens; batched turns
    /// stream tokens and ignore progress blocks.
    pub async fn on_event(&self, event: &AgentEvent) -> Result<(), DeliveryError> {
        let Some(payload) = payload_for(self.renderer(), event) else {
            return Ok(());
        };
        match (self, payload) {
            (Self::Single(single), EventPayload::Blocks(payloads)) => {
                for payload in &payloads {
                    single.publish(payload).await?;
                }
                Ok(())
            }
            (Self::Batched(batched), EventPayload::Fragment(fragment)) => {
                batched.push(fragment).await
            }
            _ => Ok(()),
        }
    }

    /// Final flush once the agent is done; a no-op for single turns
    pub async fn finish(&self) -> Result<(), DeliveryError> {
        match self {
            Self::Single(_) => Ok(()),
            Self::Batched(batched) => batched.flush().await,
        }
    }

    /// Time-based flush hook for the event loop
    pub async fn flush_if_due(&self) -> Result<(), DeliveryError> {
        match self {
            Self::Single(_) => Ok(()),
            Self::Batched(batched) => batched.flush_if_due().await,
        }
    }

    /// Next instant a time-based flush is due, if any
    pub async fn flush_deadline(&self) -> Option<Instant> {
        match self {
            Self::Single(_) => None,
            Self::Batched(batched) => batched.deadline().await,
        }
    }
}
