use relay_agent::{AgentRegistry, PromptRequest};
use serde_json::json;

#[test]
fn test_default_registry_lists_builtin_backends() {
    let registry = AgentRegistry::default();
    assert_eq!(registry.available(), vec!["command", "mock"]);
}

#[test]
fn test_unknown_backend_is_an_error() {
    let registry = AgentRegistry::new();
    let err = registry.create("nope", &json!({})).err().unwrap();
    assert!(err.to_string().contains("Unknown backend: nope"));
}

#[tokio::test]
async fn test_create_mock_backend_from_registry() {
    let registry = AgentRegistry::default();
    let handle = registry.create("mock", &json!({})).unwrap();
    assert_eq!(handle.name(), "mock");
    let mut rx = handle.prompt(PromptRequest::new("hi", "U1")).await.unwrap();
    assert!(rx.recv().await.is_some());
}

#[tokio::test]
async fn test_command_backend_requires_binary() {
    let registry = AgentRegistry::default();
    assert!(registry.create("command", &json!({})).is_err());
}
