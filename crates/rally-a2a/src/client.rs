//! A2A client — resolves agent cards and sends tasks to peer agents

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::protocol::{AgentCard, JsonRpcResponse, TaskQueryParams, TaskSendParams};

/// Well-known path for agent capability discovery
pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";

/// Default timeout for task round trips
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Card discovery gets a tighter bound so one dead peer stalls nothing for long
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the A2A protocol.
#[derive(Debug, Clone)]
pub struct A2aClient {
    http: Client,
    discovery: Client,
}

impl Default for A2aClient {
    fn default() -> Self {
        Self::new()
    }
}

impl A2aClient {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            discovery: Client::builder()
                .timeout(DISCOVERY_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    /// Fetch a peer's capability card from the well-known path.
    pub async fn fetch_agent_card(&self, base_url: &str) -> Result<AgentCard> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), AGENT_CARD_PATH);
        debug!("fetching agent card from {url}");

        let resp = self
            .discovery
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to connect to agent at {url}"))?;

        if !resp.status().is_success() {
            return Err(anyhow!("agent card request failed: HTTP {}", resp.status()));
        }

        let card: AgentCard = resp.json().await.context("failed to parse agent card")?;
        info!("fetched agent card: {} ({} skills)", card.name, card.skills.len());
        Ok(card)
    }

    /// Send a task to a peer and await its single terminal response.
    pub async fn send_task(&self, base_url: &str, params: TaskSendParams) -> Result<JsonRpcResponse> {
        self.rpc(base_url, "tasks/send", serde_json::to_value(&params)?)
            .await
    }

    /// Query a task on a peer.
    pub async fn get_task(&self, base_url: &str, params: TaskQueryParams) -> Result<JsonRpcResponse> {
        self.rpc(base_url, "tasks/get", serde_json::to_value(&params)?)
            .await
    }

    async fn rpc(&self, base_url: &str, method: &str, params: Value) -> Result<JsonRpcResponse> {
        let url = format!("{}/", base_url.trim_end_matches('/'));
        let envelope = serde_json::json!({
            "jsonrpc": "2.0",
            "id": Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });
        debug!("sending {method} to {url}");

        let resp = self
            .http
            .post(&url)
            .json(&envelope)
            .send()
            .await
            .with_context(|| format!("failed to send {method} to {url}"))?;

        // Error envelopes arrive with 4xx status; the body is still the
        // envelope, so parse it rather than bailing on status alone.
        resp.json()
            .await
            .with_context(|| format!("failed to parse {method} response"))
    }
}
