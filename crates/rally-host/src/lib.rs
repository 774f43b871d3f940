//! rally-host — the host side of rally
//!
//! Discovers friend agents, delegates availability questions to them over the
//! A2A protocol, and drives a reasoning provider's tool loop to find a shared
//! time slot and book the pickleball court.

pub mod delegate;
pub mod directory;
pub mod host;
pub mod provider;
pub mod schedule;

pub use delegate::{uuid_ids, DelegationClient, IdGenerator, SessionState};
pub use directory::{RemoteAgentConnection, RemoteAgentDirectory, UnknownAgentError};
pub use host::{tool_definitions, HostAgent, HostUpdate};
pub use provider::{
    ChatBlock, ChatMessage, ChatResponse, ChatRole, ReasoningProvider, StopReason, ToolDefinition,
};
pub use schedule::{BookingOutcome, CourtSchedule, ScheduleQuery};
