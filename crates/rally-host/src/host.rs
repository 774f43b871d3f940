//! Host orchestrator — wires the reasoning provider to delegation and booking
//!
//! The host performs no scheduling logic itself. It builds the instruction
//! (today's date plus the agent directory), relays the provider's tool calls
//! to the directory/delegation/schedule collaborators, and streams progress
//! until the provider produces its terminal answer.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::delegate::{DelegationClient, IdGenerator, SessionState};
use crate::directory::RemoteAgentDirectory;
use crate::provider::{
    ChatBlock, ChatMessage, ChatRole, ReasoningProvider, StopReason, ToolDefinition,
};
use crate::schedule::CourtSchedule;

/// Rounds of tool use before the host gives up on a provider that never
/// produces a terminal answer.
const MAX_TOOL_ROUNDS: usize = 8;

/// One element of the host's lazy response sequence: intermediate elements
/// report progress, the final element carries the terminal text.
#[derive(Debug, Clone)]
pub struct HostUpdate {
    pub is_final: bool,
    pub content: String,
}

impl HostUpdate {
    fn progress(content: impl Into<String>) -> Self {
        Self {
            is_final: false,
            content: content.into(),
        }
    }

    fn terminal(content: impl Into<String>) -> Self {
        Self {
            is_final: true,
            content: content.into(),
        }
    }
}

/// The control loop for one host process. Directory and schedule are injected
/// once at construction; per-session correlation state lives in a shared map
/// so repeated turns of one session stay one logical conversation. Cloning is
/// cheap: clones share the same directory, schedule, and session map.
#[derive(Clone)]
pub struct HostAgent {
    directory: Arc<RemoteAgentDirectory>,
    schedule: Arc<Mutex<CourtSchedule>>,
    provider: Arc<dyn ReasoningProvider>,
    delegation: DelegationClient,
    sessions: Arc<RwLock<HashMap<String, SessionState>>>,
}

impl HostAgent {
    pub fn new(
        directory: RemoteAgentDirectory,
        schedule: CourtSchedule,
        provider: Arc<dyn ReasoningProvider>,
        id_gen: IdGenerator,
    ) -> Self {
        Self {
            directory: Arc::new(directory),
            schedule: Arc::new(Mutex::new(schedule)),
            provider,
            delegation: DelegationClient::new(id_gen),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The schedule handle, shared with anything else inspecting bookings.
    pub fn schedule(&self) -> Arc<Mutex<CourtSchedule>> {
        Arc::clone(&self.schedule)
    }

    /// Run one user turn. The receiver yields progress updates and then
    /// exactly one terminal update. Sessions are isolated by `session_id` and
    /// may run concurrently; a single session is not meant to be reentered
    /// while a turn is in flight.
    pub fn stream(&self, query: String, session_id: String) -> mpsc::Receiver<HostUpdate> {
        let (tx, rx) = mpsc::channel(16);
        let host = self.clone();
        tokio::spawn(async move {
            let _ = tx.send(HostUpdate::progress("Working on it...")).await;
            let update = match host.run_turn(&query, &session_id, &tx).await {
                Ok(answer) => HostUpdate::terminal(answer),
                Err(e) => {
                    warn!("host turn failed for session {session_id}: {e:#}");
                    HostUpdate::terminal(format!(
                        "Sorry, I hit an internal error and couldn't finish: {e:#}"
                    ))
                }
            };
            let _ = tx.send(update).await;
        });
        rx
    }

    async fn run_turn(
        &self,
        query: &str,
        session_id: &str,
        tx: &mpsc::Sender<HostUpdate>,
    ) -> Result<String> {
        let system = self.instruction();
        let tools = tool_definitions();
        let mut messages = vec![ChatMessage::user_text(query)];

        for round in 0..MAX_TOOL_ROUNDS {
            let response = self
                .provider
                .chat(&messages, &tools, &system)
                .await
                .context("reasoning provider failed")?;

            if response.stop_reason != StopReason::ToolUse {
                return Ok(response.joined_text());
            }

            let calls = response.tool_calls();
            debug!("session {session_id} round {round}: {} tool call(s)", calls.len());
            messages.push(ChatMessage {
                role: ChatRole::Assistant,
                blocks: response.blocks,
            });

            for (_, name, _) in &calls {
                let _ = tx.send(HostUpdate::progress(format!("Calling {name}..."))).await;
            }

            // Independent network round trips: run every requested call
            // concurrently and join before the provider continues.
            let results = futures_util::future::join_all(calls.iter().map(
                |(call_id, name, input)| async move {
                    let content = match self.handle_tool_call(session_id, name, input).await {
                        Ok(content) => content,
                        Err(e) => {
                            warn!("tool '{name}' failed: {e:#}");
                            format!("Tool '{name}' failed: {e:#}")
                        }
                    };
                    ChatBlock::ToolResult {
                        tool_call_id: call_id.clone(),
                        content,
                    }
                },
            ))
            .await;

            messages.push(ChatMessage {
                role: ChatRole::User,
                blocks: results,
            });
        }

        Err(anyhow!(
            "provider did not produce a final answer within {MAX_TOOL_ROUNDS} tool rounds"
        ))
    }

    /// Dispatch one tool call. Tool failures come back as `Err` and are
    /// relayed to the provider as tool errors, never allowed to crash the
    /// host.
    async fn handle_tool_call(&self, session_id: &str, name: &str, input: &Value) -> Result<String> {
        match name {
            "send_message" => {
                let agent_name = required_str(input, "agent_name")?;
                let task_text = required_str(input, "task_text")?;
                let connection = self.directory.resolve(agent_name)?;
                let session = self.session_state(session_id).await;
                info!("session {session_id}: asking '{agent_name}'");
                let parts = self
                    .delegation
                    .delegate_with(connection, task_text, &session)
                    .await;
                if parts.is_empty() {
                    Ok(format!("No response from {agent_name}."))
                } else {
                    Ok(parts
                        .iter()
                        .map(|part| part.as_text())
                        .collect::<Vec<_>>()
                        .join("\n"))
                }
            }
            "list_court_availabilities" => {
                let date = required_str(input, "date")?;
                let schedule = self.schedule.lock().await;
                serde_json::to_string(&schedule.list(date))
                    .context("failed to serialize schedule query")
            }
            "book_pickleball_court" => {
                let date = required_str(input, "date")?;
                let start = required_str(input, "start_time")?;
                let end = required_str(input, "end_time")?;
                let holder = required_str(input, "reservation_name")?;
                let mut schedule = self.schedule.lock().await;
                serde_json::to_string(&schedule.book(date, start, end, holder))
                    .context("failed to serialize booking outcome")
            }
            other => Err(anyhow!("unknown tool '{other}'")),
        }
    }

    /// Correlation state for one session, created on first use.
    async fn session_state(&self, session_id: &str) -> SessionState {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| self.delegation.new_session())
            .clone()
    }

    /// The system instruction: built fresh each turn so it carries today's
    /// date and the current directory summary.
    fn instruction(&self) -> String {
        let today = Utc::now().format("%Y-%m-%d");
        let agents = self.directory.describe_all();
        format!(
            "**Role:** You are the Host Agent, an expert scheduler for pickleball games. \
             Coordinate with friend agents to find a suitable time to play, then book a court.\n\
             \n\
             **Core Directives:**\n\
             * Use the `send_message` tool to ask each friend for their availability; pass \
             the friend agent's official name with every request.\n\
             * Analyze the responses to find common timeslots.\n\
             * Use the `list_court_availabilities` tool before proposing times, so the court \
             is also free.\n\
             * After the user confirms a time, use the `book_pickleball_court` tool to make \
             the reservation, and relay the booking confirmation including the booking ID.\n\
             * Rely strictly on tools; do not answer from assumptions. If a friend does not \
             respond, say so rather than inventing their availability.\n\
             * Each available agent represents a friend; respond concisely, bullet points \
             are good.\n\
             \n\
             **Today's Date (YYYY-MM-DD):** {today}\n\
             \n\
             <Available Agents>\n{agents}\n</Available Agents>"
        )
    }
}

fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("Missing '{key}' parameter"))
}

/// The three tools the host declares to the reasoning provider.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "send_message".to_string(),
            description: "Send a task to a named friend agent and return its reply."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "agent_name": {
                        "type": "string",
                        "description": "Official name of the friend agent, as listed in the directory"
                    },
                    "task_text": {
                        "type": "string",
                        "description": "The question or task for the friend agent"
                    }
                },
                "required": ["agent_name", "task_text"]
            }),
        },
        ToolDefinition {
            name: "list_court_availabilities".to_string(),
            description: "List available and booked hourly court slots for a date.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "date": {"type": "string", "description": "Date in YYYY-MM-DD format"}
                },
                "required": ["date"]
            }),
        },
        ToolDefinition {
            name: "book_pickleball_court".to_string(),
            description: "Book the pickleball court for a span of hourly slots.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "date": {"type": "string", "description": "Date in YYYY-MM-DD format"},
                    "start_time": {"type": "string", "description": "Start time in HH:MM format"},
                    "end_time": {"type": "string", "description": "End time in HH:MM format"},
                    "reservation_name": {"type": "string", "description": "Name to book under"}
                },
                "required": ["date", "start_time", "end_time", "reservation_name"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::delegate::uuid_ids;
    use crate::provider::ChatResponse;

    /// Plays back a fixed script of responses and records every conversation
    /// it was shown.
    struct ScriptedProvider {
        script: Mutex<VecDeque<ChatResponse>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<ChatResponse>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReasoningProvider for ScriptedProvider {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            _system: &str,
        ) -> Result<ChatResponse> {
            self.seen.lock().await.push(messages.to_vec());
            self.script
                .lock()
                .await
                .pop_front()
                .ok_or_else(|| anyhow!("script exhausted"))
        }
    }

    fn final_text(text: &str) -> ChatResponse {
        ChatResponse {
            blocks: vec![ChatBlock::Text {
                text: text.to_string(),
            }],
            stop_reason: StopReason::EndTurn,
        }
    }

    fn tool_call(name: &str, input: Value) -> ChatResponse {
        ChatResponse {
            blocks: vec![ChatBlock::ToolCall {
                id: format!("call-{name}"),
                name: name.to_string(),
                input,
            }],
            stop_reason: StopReason::ToolUse,
        }
    }

    async fn empty_host(provider: Arc<dyn ReasoningProvider>) -> HostAgent {
        let directory = RemoteAgentDirectory::discover(&[]).await;
        let schedule = CourtSchedule::for_week(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        HostAgent::new(directory, schedule, provider, uuid_ids())
    }

    async fn drain(mut rx: mpsc::Receiver<HostUpdate>) -> (Vec<HostUpdate>, HostUpdate) {
        let mut progress = Vec::new();
        while let Some(update) = rx.recv().await {
            if update.is_final {
                return (progress, update);
            }
            progress.push(update);
        }
        panic!("stream closed without a terminal update");
    }

    #[tokio::test]
    async fn test_direct_answer_streams_final_text() {
        let provider = Arc::new(ScriptedProvider::new(vec![final_text("Nothing to book.")]));
        let host = empty_host(provider).await;
        let (progress, last) = drain(host.stream("hi".into(), "s1".into())).await;
        assert!(!progress.is_empty());
        assert_eq!(last.content, "Nothing to book.");
    }

    #[tokio::test]
    async fn test_tool_loop_checks_and_books_the_court() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call(
                "list_court_availabilities",
                serde_json::json!({"date": "2025-01-01"}),
            ),
            tool_call(
                "book_pickleball_court",
                serde_json::json!({
                    "date": "2025-01-01",
                    "start_time": "10:00",
                    "end_time": "11:00",
                    "reservation_name": "Pickleball with Bob"
                }),
            ),
            final_text("Booked 10:00-11:00 on 2025-01-01."),
        ]));
        let host = empty_host(Arc::clone(&provider) as Arc<dyn ReasoningProvider>).await;

        let (progress, last) = drain(host.stream("book us a court".into(), "s1".into())).await;
        assert_eq!(last.content, "Booked 10:00-11:00 on 2025-01-01.");
        assert!(progress
            .iter()
            .any(|u| u.content.contains("list_court_availabilities")));

        // the booking really landed in the injected schedule
        let schedule = host.schedule();
        let schedule = schedule.lock().await;
        let booked = schedule.list("2025-01-01").booked_slots.unwrap();
        assert_eq!(
            booked.get("10:00").map(String::as_str),
            Some("Pickleball with Bob")
        );

        // the availability tool result made it back to the provider
        let seen = provider.seen.lock().await;
        let booking_round = &seen[1];
        let has_schedule_result = booking_round.iter().any(|m| {
            m.blocks.iter().any(|b| {
                matches!(b, ChatBlock::ToolResult { content, .. } if content.contains("available_slots"))
            })
        });
        assert!(has_schedule_result);
    }

    #[tokio::test]
    async fn test_unknown_agent_surfaces_as_tool_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call(
                "send_message",
                serde_json::json!({"agent_name": "carol_agent", "task_text": "free tomorrow?"}),
            ),
            final_text("I couldn't reach Carol."),
        ]));
        let host = empty_host(Arc::clone(&provider) as Arc<dyn ReasoningProvider>).await;

        let (_, last) = drain(host.stream("ask carol".into(), "s1".into())).await;
        // the miss reached the provider as a tool error, not a crash
        assert_eq!(last.content, "I couldn't reach Carol.");
        let seen = provider.seen.lock().await;
        let follow_up = &seen[1];
        let saw_error = follow_up.iter().any(|m| {
            m.blocks.iter().any(|b| {
                matches!(b, ChatBlock::ToolResult { content, .. } if content.contains("unknown agent 'carol_agent'"))
            })
        });
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_provider_failure_yields_error_terminal() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let host = empty_host(provider).await;
        let (_, last) = drain(host.stream("hello".into(), "s1".into())).await;
        assert!(last.is_final);
        assert!(last.content.contains("internal error"));
    }

    #[tokio::test]
    async fn test_sessions_keep_isolated_correlation_state() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let host = empty_host(provider).await;
        let a = host.session_state("session-a").await;
        let b = host.session_state("session-b").await;
        let a_again = host.session_state("session-a").await;
        assert_ne!(a.context_id, b.context_id);
        assert_eq!(a, a_again);
    }

    #[test]
    fn test_tool_definitions_cover_the_declared_set() {
        let names: Vec<_> = tool_definitions().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "send_message",
                "list_court_availabilities",
                "book_pickleball_court"
            ]
        );
    }
}
