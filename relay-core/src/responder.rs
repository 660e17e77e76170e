// ABOUTME: Runs one conversation turn: acknowledge, prompt the agent, stream events, post the answer.
// ABOUTME: Failures end in a best-effort error message in the thread; nothing is re-raised.

use crate::blocks::{EventKind, Renderer};
use crate::config::Config;
use crate::driver::Driver;
use crate::transport::{
    react_best_effort, set_typing_status_best_effort, ChatTransport, Destination,
};
use crate::turn::ConversationTurn;
use anyhow::{Context, Result};
use relay_agent::{AgentEvent, AgentHandle, PromptRequest};
use std::sync::Arc;

/// Typing status shown as soon as a message is picked up
pub const RECEIVED_STATUS: &str = "received the message...";

/// An inbound chat message that should be answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    /// Where the answer goes; the thread doubles as the agent's memory key
    pub destination: Destination,
    /// Id of the inbound message, for the acknowledgement reaction
    pub message_id: String,
    pub user_id: String,
    pub text: String,
}

/// Answer one inbound message in its thread.
///
/// Agent and delivery failures are reported to the user as an error message;
/// if that post fails too the failure is only logged.
pub async fn respond_in_thread(
    config: &Config,
    agent: &AgentHandle,
    transport: Arc<dyn ChatTransport>,
    request: TurnRequest,
) {
    let destination = &request.destination;
    set_typing_status_best_effort(transport.as_ref(), RECEIVED_STATUS, destination).await;

    if let Some(emoji) = &config.slack.ack_reaction {
        react_best_effort(
            transport.as_ref(),
            emoji,
            &request.message_id,
            &destination.channel,
        )
        .await;
    }

    let renderer = match config.delivery.renderer() {
        Ok(renderer) => renderer,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid delivery settings, using default rendering");
            Renderer::default()
        }
    };

    if let Err(e) = run_turn(config, agent, &transport, &renderer, &request).await {
        tracing::error!(
            error = %e,
            channel = %destination.channel,
            thread_ts = %destination.thread_id,
            "Error while processing response"
        );
        post_error(transport.as_ref(), &renderer, destination, &format!("{:#}", e)).await;
    }

    // An empty status clears the typing indicator
    set_typing_status_best_effort(transport.as_ref(), "", destination).await;
}

async fn run_turn(
    config: &Config,
    agent: &AgentHandle,
    transport: &Arc<dyn ChatTransport>,
    renderer: &Renderer,
    request: &TurnRequest,
) -> Result<()> {
    let destination = &request.destination;
    let turn = Arc::new(ConversationTurn::new(destination.clone(), *renderer));
    let driver = Driver::for_turn(config, turn, Arc::clone(transport))?;

    tracing::info!(
        channel = %destination.channel,
        thread_ts = %destination.thread_id,
        user = %request.user_id,
        backend = agent.name(),
        mode = driver.mode(),
        "Starting turn"
    );

    let prompt = PromptRequest::new(request.text.clone(), request.user_id.clone())
        .with_thread_alias(destination.thread_id.clone());
    let mut events = agent
        .prompt(prompt)
        .await
        .context("Failed to start agent")?;

    let mut answer: Option<String> = None;
    let mut agent_error: Option<String> = None;

    loop {
        let event = match driver.flush_deadline().await {
            Some(deadline) => tokio::select! {
                event = events.recv() => event,
                _ = tokio::time::sleep_until(deadline) => {
                    driver.flush_if_due().await?;
                    continue;
                }
            },
            None => events.recv().await,
        };

        let Some(event) = event else {
            tracing::warn!("Agent event stream closed without Done");
            break;
        };

        match event {
            AgentEvent::Done => break,
            AgentEvent::Result { text } => answer = Some(text),
            AgentEvent::Error { code, message } => {
                tracing::warn!(?code, %message, "Agent reported an error");
                agent_error = Some(message);
            }
            other => driver.on_event(&other).await?,
        }
    }

    driver.finish().await?;

    if let Some(message) = agent_error {
        anyhow::bail!(message);
    }

    if driver.is_streaming() && driver.turn().message_id().await.is_some() {
        // Streamed turns already show the answer
        return Ok(());
    }

    let answer = answer.unwrap_or_default();
    if answer.trim().is_empty() {
        tracing::warn!(thread_ts = %destination.thread_id, "Agent returned an empty answer");
        return Ok(());
    }

    for payload in renderer.render(EventKind::Plain, &answer) {
        transport
            .post(destination, &payload)
            .await
            .context("Failed to post answer")?;
    }
    Ok(())
}

async fn post_error(
    transport: &dyn ChatTransport,
    renderer: &Renderer,
    destination: &Destination,
    error: &str,
) {
    for payload in renderer.render(EventKind::Error, error) {
        if let Err(e) = transport.post(destination, &payload).await {
            tracing::warn!(
                error = %e,
                channel = %destination.channel,
                thread_ts = %destination.thread_id,
                "Failed to post error message"
            );
            return;
        }
    }
}
