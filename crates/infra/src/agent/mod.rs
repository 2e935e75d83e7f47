//! Agent bridge backed by an external process.

pub mod process;

pub use process::{AgentInput, DEFAULT_AGENT_TIMEOUT, ProcessAgentBridge, ProcessAgentConfig};
