//! Remote agent directory — discovers peers and keeps one connection per name
//!
//! Built once through the async `discover` factory so a directory is never
//! observable in a half-initialized state. Discovery tolerates partial failure:
//! one unreachable peer must not block the others.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use rally_a2a::{A2aClient, AgentCard};

/// Raised when a named peer is not in the directory.
#[derive(Debug, Error)]
#[error("unknown agent '{name}'. Known agents: {known}")]
pub struct UnknownAgentError {
    pub name: String,
    pub known: String,
}

/// One discovered peer: its card, where to reach it, and the task ids
/// currently pending on it.
#[derive(Debug, Clone)]
pub struct RemoteAgentConnection {
    pub card: AgentCard,
    pub base_url: String,
    pub client: A2aClient,
    pending_tasks: Arc<Mutex<HashSet<String>>>,
}

impl RemoteAgentConnection {
    fn new(card: AgentCard, base_url: String, client: A2aClient) -> Self {
        Self {
            card,
            base_url,
            client,
            pending_tasks: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub async fn mark_pending(&self, task_id: &str) {
        self.pending_tasks.lock().await.insert(task_id.to_string());
    }

    pub async fn clear_pending(&self, task_id: &str) {
        self.pending_tasks.lock().await.remove(task_id);
    }

    pub async fn pending_count(&self) -> usize {
        self.pending_tasks.lock().await.len()
    }
}

/// The host's registry of discovered peer connections, keyed by the name each
/// peer declares on its card.
pub struct RemoteAgentDirectory {
    connections: Vec<RemoteAgentConnection>,
    failed: Vec<(String, String)>,
}

impl RemoteAgentDirectory {
    /// Fetch every peer's card concurrently and register the reachable ones.
    /// Failures are recorded per URL and skipped; partial success is the
    /// normal case.
    pub async fn discover(urls: &[String]) -> Self {
        let client = A2aClient::new();
        let fetches = urls.iter().map(|url| {
            let client = client.clone();
            let url = url.clone();
            async move {
                let result = client.fetch_agent_card(&url).await;
                (url, result)
            }
        });

        let mut directory = Self {
            connections: Vec::new(),
            failed: Vec::new(),
        };
        for (url, result) in futures_util::future::join_all(fetches).await {
            match result {
                Ok(card) => {
                    info!("discovered agent '{}' at {url}", card.name);
                    directory.register(RemoteAgentConnection::new(card, url, client.clone()));
                }
                Err(e) => {
                    warn!("failed to discover agent at {url}: {e:#}");
                    directory.failed.push((url, format!("{e:#}")));
                }
            }
        }
        directory
    }

    /// Last-wins on duplicate declared names; the collision is logged with
    /// both URLs so it is visible instead of silent.
    fn register(&mut self, connection: RemoteAgentConnection) {
        if let Some(existing) = self
            .connections
            .iter_mut()
            .find(|c| c.card.name == connection.card.name)
        {
            warn!(
                "agent name '{}' declared by both {} and {}; keeping the latter",
                connection.card.name, existing.base_url, connection.base_url
            );
            *existing = connection;
        } else {
            self.connections.push(connection);
        }
    }

    /// Look up a peer by its declared name.
    pub fn resolve(&self, name: &str) -> Result<&RemoteAgentConnection, UnknownAgentError> {
        self.connections
            .iter()
            .find(|c| c.card.name == name)
            .ok_or_else(|| UnknownAgentError {
                name: name.to_string(),
                known: if self.connections.is_empty() {
                    "(none)".to_string()
                } else {
                    self.connections
                        .iter()
                        .map(|c| c.card.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                },
            })
    }

    /// (name, description) pairs in discovery order.
    pub fn list_agents(&self) -> Vec<(String, String)> {
        self.connections
            .iter()
            .map(|c| (c.card.name.clone(), c.card.description.clone()))
            .collect()
    }

    /// Human/LLM-readable directory summary, one JSON line per agent. An
    /// empty directory yields an explicit sentinel, never an empty string.
    pub fn describe_all(&self) -> String {
        if self.connections.is_empty() {
            return "No agents available".to_string();
        }
        self.connections
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.card.name,
                    "description": c.card.description,
                })
                .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// URLs that failed discovery, with the recorded error.
    pub fn failures(&self) -> &[(String, String)] {
        &self.failed
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
