// ABOUTME: Backend implementations (external command, mock).
// ABOUTME: Each backend hands out an AgentHandle backed by its own worker task.

pub mod command;
pub mod mock;
