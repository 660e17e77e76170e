// ABOUTME: Command backend - spawns an external orchestration program per prompt.
// ABOUTME: Reads newline-delimited JSON AgentEvents from its stdout and forwards them.

use crate::event::{AgentEvent, ErrorCode};
use crate::handle::{AgentHandle, PromptCommand, PromptRequest};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as ProcessCommand;
use tokio::sync::mpsc;

/// Configuration for the command backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Program to run for each prompt
    pub binary: String,
    /// Arguments placed before the prompt text
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the program
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Wall-clock limit for one prompt
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    300
}

pub struct CommandBackend {
    config: CommandConfig,
}

impl CommandBackend {
    pub fn new(config: CommandConfig) -> Result<Self> {
        if config.binary.trim().is_empty() {
            anyhow::bail!("command backend requires a binary");
        }
        Ok(Self { config })
    }

    pub fn into_handle(self) -> AgentHandle {
        let (tx, mut rx) = mpsc::channel::<PromptCommand>(32);
        let config = self.config;

        tokio::spawn(async move {
            while let Some(PromptCommand {
                request,
                event_tx,
                reply,
            }) = rx.recv().await
            {
                let _ = reply.send(Ok(()));
                // Each turn runs independently of the others
                let config = config.clone();
                tokio::spawn(async move {
                    if let Err(e) = run_prompt(&config, &request, &event_tx).await {
                        tracing::error!(error = %e, "Command backend prompt failed");
                        let _ = event_tx
                            .send(AgentEvent::Error {
                                code: ErrorCode::BackendError,
                                message: e.to_string(),
                            })
                            .await;
                    }
                    let _ = event_tx.send(AgentEvent::Done).await;
                });
            }
        });

        AgentHandle::new(tx, "command")
    }

    /// Factory function for the registry
    pub fn factory() -> crate::registry::BackendFactory {
        Box::new(|config| {
            let cfg: CommandConfig = serde_json::from_value(config.clone())
                .context("Invalid command backend config")?;
            Ok(CommandBackend::new(cfg)?.into_handle())
        })
    }
}

async fn run_prompt(
    config: &CommandConfig,
    request: &PromptRequest,
    event_tx: &mpsc::Sender<AgentEvent>,
) -> Result<()> {
    let run_id = uuid::Uuid::new_v4();
    let mut command = ProcessCommand::new(&config.binary);
    command
        .args(&config.args)
        .arg(&request.text)
        .env("RELAY_USER_ID", &request.user_id)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);
    if let Some(alias) = &request.thread_alias {
        command.env("RELAY_THREAD_ALIAS", alias);
    }
    if let Some(dir) = &config.working_dir {
        command.current_dir(dir);
    }

    tracing::debug!(%run_id, binary = %config.binary, "Spawning orchestration command");

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn {}", config.binary))?;

    let stdout = child.stdout.take().context("Failed to capture stdout")?;
    let stderr = child.stderr.take().context("Failed to capture stderr")?;

    let stderr_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if !line.is_empty() {
                tracing::warn!(%run_id, stderr = %line, "Orchestration command stderr");
            }
        }
    });

    let forward = async {
        let mut lines = BufReader::new(stdout).lines();
        let mut saw_error = false;
        while let Ok(Some(line)) = lines.next_line().await {
            let Some(event) = parse_event_line(&line) else {
                continue;
            };
            // Done is emitted by the worker once the process is reaped
            if event.is_terminal() {
                continue;
            }
            saw_error |= matches!(event, AgentEvent::Error { .. });
            if event_tx.send(event).await.is_err() {
                tracing::debug!(%run_id, "Event receiver closed, stopping stream");
                break;
            }
        }
        saw_error
    };

    let timeout = Duration::from_secs(config.timeout_secs);
    let saw_error = match tokio::time::timeout(timeout, forward).await {
        Ok(saw_error) => saw_error,
        Err(_) => {
            tracing::warn!(%run_id, timeout_secs = config.timeout_secs, "Orchestration command timed out");
            let _ = child.kill().await;
            let _ = event_tx
                .send(AgentEvent::Error {
                    code: ErrorCode::Timeout,
                    message: format!("agent timed out after {}s", config.timeout_secs),
                })
                .await;
            true
        }
    };

    let status = child.wait().await?;
    if !status.success() && !saw_error {
        let _ = event_tx
            .send(AgentEvent::Error {
                code: ErrorCode::BackendError,
                message: format!("command exited with status: {:?}", status.code()),
            })
            .await;
    }

    if let Err(e) = stderr_handle.await {
        tracing::warn!(error = %e, "stderr reader task failed to complete");
    }

    Ok(())
}

/// Parse one stdout line into an event. Blank and non-JSON lines are skipped.
pub fn parse_event_line(line: &str) -> Option<AgentEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<AgentEvent>(line) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, line = %line, "Skipping unparseable event line");
            None
        }
    }
}
