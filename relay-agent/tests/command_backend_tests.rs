#![cfg(unix)]

use relay_agent::backends::command::{CommandBackend, CommandConfig};
use relay_agent::{AgentEvent, ErrorCode, PromptRequest};

fn shell(script: &str, timeout_secs: u64) -> CommandConfig {
    // The prompt text lands in $0 of the script
    CommandConfig {
        binary: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        working_dir: None,
        timeout_secs,
    }
}

async fn run(config: CommandConfig, request: PromptRequest) -> Vec<AgentEvent> {
    let handle = CommandBackend::new(config).unwrap().into_handle();
    let mut rx = handle.prompt(request).await.unwrap();
    let mut events = vec![];
    while let Some(event) = rx.recv().await {
        let done = event.is_terminal();
        events.push(event);
        if done {
            break;
        }
    }
    events
}

#[tokio::test]
async fn test_command_backend_forwards_jsonl_events() {
    let script = r#"
echo '{"type":"turn_start"}'
echo 'not json'
echo '{"type":"token_chunk","text":"Hel"}'
echo "{\"type\":\"result\",\"text\":\"$0 from $RELAY_USER_ID in $RELAY_THREAD_ALIAS\"}"
"#;
    let events = run(
        shell(script, 10),
        PromptRequest::new("hello", "U42").with_thread_alias("171.5"),
    )
    .await;

    assert_eq!(
        events,
        vec![
            AgentEvent::TurnStart,
            AgentEvent::token("Hel"),
            AgentEvent::Result {
                text: "hello from U42 in 171.5".to_string()
            },
            AgentEvent::Done,
        ]
    );
}

#[tokio::test]
async fn test_command_backend_reports_nonzero_exit() {
    let events = run(shell("exit 3", 10), PromptRequest::new("x", "U1")).await;
    assert!(matches!(
        &events[0],
        AgentEvent::Error { code: ErrorCode::BackendError, message } if message.contains("3")
    ));
    assert_eq!(events.last(), Some(&AgentEvent::Done));
}

#[tokio::test]
async fn test_command_backend_emits_single_done() {
    let script = r#"echo '{"type":"done"}'; echo '{"type":"result","text":"late"}'"#;
    let events = run(shell(script, 10), PromptRequest::new("x", "U1")).await;
    let dones = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(dones, 1);
    assert_eq!(events.last(), Some(&AgentEvent::Done));
}

#[tokio::test]
async fn test_command_backend_timeout() {
    let events = run(shell("sleep 5", 1), PromptRequest::new("x", "U1")).await;
    assert!(matches!(
        &events[0],
        AgentEvent::Error {
            code: ErrorCode::Timeout,
            ..
        }
    ));
    assert_eq!(events.last(), Some(&AgentEvent::Done));
}

#[tokio::test]
async fn test_command_backend_spawn_failure_becomes_error_event() {
    let config = CommandConfig {
        binary: "/nonexistent/relay-agent-binary".to_string(),
        args: vec![],
        working_dir: None,
        timeout_secs: 5,
    };
    let events = run(config, PromptRequest::new("x", "U1")).await;
    assert!(matches!(&events[0], AgentEvent::Error { .. }));
    assert_eq!(events.last(), Some(&AgentEvent::Done));
}
