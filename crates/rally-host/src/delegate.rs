//! Delegation client — one request/await/extract cycle per peer
//!
//! Delegation failures are absorbed, not raised: an error envelope, a
//! transport failure, or a result that is not Task-shaped all come back as
//! "no content" so one unresponsive peer cannot abort the host's wider round.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use rally_a2a::protocol::{Message, Part, Role, Task, TaskSendParams};

use crate::directory::RemoteAgentConnection;

/// Injected identifier source, so tests can run with deterministic ids.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// The default generator: random v4 uuids.
pub fn uuid_ids() -> IdGenerator {
    Arc::new(|| Uuid::new_v4().to_string())
}

/// Correlation state threading one logical conversation through repeated
/// delegations: the same context id is reused every round. Task ids are NOT
/// part of the session — a peer completes its task at the end of every send
/// and rejects resubmission to a terminal task, so each round needs a fresh
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub context_id: String,
}

/// Sends tasks to named peers and extracts artifact content from the
/// terminal response. Never mutates the receiving agent's registry.
#[derive(Clone)]
pub struct DelegationClient {
    id_gen: IdGenerator,
}

impl DelegationClient {
    pub fn new(id_gen: IdGenerator) -> Self {
        Self { id_gen }
    }

    /// Fresh correlation state from the injected generator.
    pub fn new_session(&self) -> SessionState {
        SessionState {
            context_id: (self.id_gen)(),
        }
    }

    /// Delegate, deriving ids from `state` when present and generating (and
    /// storing) fresh ones otherwise.
    pub async fn delegate(
        &self,
        connection: &RemoteAgentConnection,
        task_text: &str,
        state: &mut Option<SessionState>,
    ) -> Vec<Part> {
        let session = state.get_or_insert_with(|| self.new_session()).clone();
        self.delegate_with(connection, task_text, &session).await
    }

    /// One complete delegation cycle against an established session. Each
    /// cycle is a new task on the peer; the session's context id ties the
    /// rounds together.
    pub async fn delegate_with(
        &self,
        connection: &RemoteAgentConnection,
        task_text: &str,
        session: &SessionState,
    ) -> Vec<Part> {
        let task_id = (self.id_gen)();
        let message = Message {
            role: Role::User,
            parts: vec![Part::text(task_text)],
            message_id: Some((self.id_gen)()),
            task_id: Some(task_id.clone()),
            context_id: Some(session.context_id.clone()),
        };
        let params = TaskSendParams {
            id: task_id.clone(),
            session_id: Some(session.context_id.clone()),
            message,
            history_length: None,
            metadata: None,
        };

        debug!(
            "delegating task {task_id} to '{}'",
            connection.card.name
        );
        connection.mark_pending(&task_id).await;
        let outcome = connection
            .client
            .send_task(&connection.base_url, params)
            .await;
        connection.clear_pending(&task_id).await;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                warn!("delegation to '{}' failed: {e:#}", connection.card.name);
                return Vec::new();
            }
        };
        if let Some(error) = response.error {
            warn!(
                "'{}' returned error envelope: {} ({})",
                connection.card.name, error.message, error.code
            );
            return Vec::new();
        }
        let Some(result) = response.result else {
            warn!("'{}' returned neither result nor error", connection.card.name);
            return Vec::new();
        };
        let task: Task = match serde_json::from_value(result) {
            Ok(task) => task,
            Err(e) => {
                warn!(
                    "'{}' result was not Task-shaped: {e}",
                    connection.card.name
                );
                return Vec::new();
            }
        };

        // Artifact order first, then part order within each artifact.
        task.artifacts
            .unwrap_or_default()
            .into_iter()
            .flat_map(|artifact| artifact.parts)
            .collect()
    }

    /// Concurrent fan-out: every delegation the round dispatched is awaited
    /// before the round concludes. Returns (agent name, parts) per job in
    /// job order.
    pub async fn delegate_all(
        &self,
        jobs: Vec<(RemoteAgentConnection, String)>,
        session: &SessionState,
    ) -> Vec<(String, Vec<Part>)> {
        let futures = jobs.into_iter().map(|(connection, task_text)| {
            let session = session.clone();
            async move {
                let name = connection.card.name.clone();
                let parts = self.delegate_with(&connection, &task_text, &session).await;
                (name, parts)
            }
        });
        futures_util::future::join_all(futures).await
    }
}
