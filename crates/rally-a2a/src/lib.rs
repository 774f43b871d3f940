//! rally-a2a — Agent-to-Agent task protocol
//!
//! The wire layer of rally: JSON-RPC envelopes with strict method-discriminated
//! decoding, task/message/agent-card types, an in-memory task registry, an axum
//! server for agents receiving tasks, and a reqwest client for agents sending
//! them.

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;

pub use client::A2aClient;
pub use error::A2aError;
pub use protocol::{
    AgentCapabilities, AgentCard, AgentSkill, Artifact, JsonRpcError, JsonRpcResponse, Message,
    Part, Role, Task, TaskSendParams, TaskState, TaskStatus,
};
pub use registry::TaskRegistry;
pub use server::{A2aServer, TaskHandler};
