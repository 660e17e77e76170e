use relay_agent::handle::{AgentHandle, EventReceiver, PromptRequest};
use relay_agent::AgentEvent;
use tokio::sync::mpsc;

fn assert_send<T: Send>() {}
fn assert_sync<T: Sync>() {}

#[test]
fn test_agent_handle_is_send_sync() {
    assert_send::<AgentHandle>();
    assert_sync::<AgentHandle>();
}

#[test]
fn test_event_receiver_is_send() {
    assert_send::<EventReceiver>();
}

#[test]
fn test_prompt_request_builder() {
    let request = PromptRequest::new("hi", "U1").with_thread_alias("1700000000.000100");
    assert_eq!(request.text, "hi");
    assert_eq!(request.user_id, "U1");
    assert_eq!(request.thread_alias.as_deref(), Some("1700000000.000100"));
}

#[tokio::test]
async fn test_event_receiver_receives_events_in_order() {
    let (tx, rx) = mpsc::channel(32);
    let mut receiver = EventReceiver::new(rx);

    tx.send(AgentEvent::token("hello")).await.unwrap();
    tx.send(AgentEvent::token("world")).await.unwrap();
    drop(tx);

    let event1 = receiver.recv().await.unwrap();
    assert!(matches!(event1, AgentEvent::TokenChunk { text, .. } if text == "hello"));

    let event2 = receiver.recv().await.unwrap();
    assert!(matches!(event2, AgentEvent::TokenChunk { text, .. } if text == "world"));

    assert!(receiver.recv().await.is_none());
}

#[tokio::test]
async fn test_prompt_fails_when_worker_is_gone() {
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let handle = AgentHandle::new(tx, "dead");
    let err = handle.prompt(PromptRequest::new("hi", "U1")).await;
    assert!(err.is_err());
}
