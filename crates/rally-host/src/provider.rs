//! Provider-agnostic reasoning seam
//!
//! The host treats the reasoning model as a black box: conversation in,
//! either tool calls or a final answer out. Implementations live outside
//! this crate; tests script one.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool the host declares to the reasoning provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Message role in the reasoning conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// A single block within a conversation turn
#[derive(Debug, Clone)]
pub enum ChatBlock {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
    },
}

/// One turn in the reasoning conversation
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub blocks: Vec<ChatBlock>,
}

impl ChatMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            blocks: vec![ChatBlock::Text { text: text.into() }],
        }
    }
}

/// Why the provider stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Final answer: the text blocks are the terminal reply
    EndTurn,
    /// The provider wants the declared tools invoked before continuing
    ToolUse,
}

/// The provider's reply for one reasoning step
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub blocks: Vec<ChatBlock>,
    pub stop_reason: StopReason,
}

impl ChatResponse {
    /// All text blocks concatenated in order.
    pub fn joined_text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                ChatBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The tool calls requested this step, in order.
    pub fn tool_calls(&self) -> Vec<(String, String, Value)> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                ChatBlock::ToolCall { id, name, input } => {
                    Some((id.clone(), name.clone(), input.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

/// The reasoning collaborator behind the host orchestrator.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Run one reasoning step over the conversation so far.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<ChatResponse>;
}
