//! A2A server — serves the agent card and dispatches JSON-RPC task requests
//!
//! Two routes: `POST /` takes the JSON-RPC envelope, `GET /.well-known/agent.json`
//! serves the card. Any failure during request handling maps to the internal-error
//! envelope with a null id and HTTP 400; the serving process never crashes on a
//! bad request.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::A2aError;
use crate::protocol::{
    self, A2aRequest, AgentCard, Artifact, JsonRpcResponse, Message, Part, Role, TaskSendParams,
    TaskState, METHOD_NOT_FOUND,
};
use crate::registry::TaskRegistry;

/// The seam behind which an agent's actual intelligence lives. The server owns
/// the protocol and the registry; the handler only turns request text into
/// reply text.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, text: &str, session_id: &str) -> Result<String>;
}

/// Shared state for the A2A routes
#[derive(Clone)]
struct AppState {
    card: Arc<AgentCard>,
    handler: Arc<dyn TaskHandler>,
    registry: TaskRegistry,
}

/// An agent process serving the A2A protocol.
pub struct A2aServer {
    state: AppState,
}

impl A2aServer {
    pub fn new(card: AgentCard, handler: Arc<dyn TaskHandler>) -> Self {
        Self {
            state: AppState {
                card: Arc::new(card),
                handler,
                registry: TaskRegistry::new(),
            },
        }
    }

    /// Build the axum router for this agent.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", post(handle_rpc))
            .route("/.well-known/agent.json", get(agent_card))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Serve until the listener closes.
    pub async fn serve(self, listener: tokio::net::TcpListener) -> Result<()> {
        let addr = listener.local_addr().context("listener has no local addr")?;
        info!("A2A agent '{}' listening on {}", self.state.card.name, addr);
        axum::serve(listener, self.router())
            .await
            .context("A2A server failed")
    }
}

/// GET /.well-known/agent.json
async fn agent_card(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.card.as_ref().clone())
}

/// POST / — decode, dispatch, encode. Decode and uncaught failures become the
/// internal-error envelope with a null id, since the true request id could not
/// be trusted.
async fn handle_rpc(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!("unparseable request body: {e}");
            let resp = JsonRpcResponse::internal_error(Value::Null, e.to_string());
            return (StatusCode::BAD_REQUEST, Json(protocol::encode(resp)));
        }
    };

    match dispatch(&state, raw).await {
        Ok(resp) => (StatusCode::OK, Json(protocol::encode(resp))),
        Err(e) => {
            warn!("request handling failed: {e}");
            let resp = JsonRpcResponse::internal_error(Value::Null, e.to_string());
            (StatusCode::BAD_REQUEST, Json(protocol::encode(resp)))
        }
    }
}

async fn dispatch(state: &AppState, raw: Value) -> Result<JsonRpcResponse, A2aError> {
    let request = protocol::decode(raw)?;
    let envelope_id = request.envelope_id();
    debug!(id = %envelope_id, "dispatching A2A request");

    match request {
        A2aRequest::SendTask { params, .. } => on_send_task(state, envelope_id, params).await,
        A2aRequest::GetTask { params, .. } => {
            match state.registry.get(&params.id, params.history_length).await {
                Ok(task) => {
                    let result = serde_json::to_value(task)
                        .map_err(|e| A2aError::Internal(e.to_string()))?;
                    Ok(JsonRpcResponse::success(envelope_id, result))
                }
                Err(e @ A2aError::NotFound(_)) => {
                    Ok(JsonRpcResponse::error(envelope_id, e.code(), e.to_string()))
                }
                Err(e) => Err(e),
            }
        }
        // Deliberate stub: cancellation is not supported, every request is
        // answered with an error envelope.
        A2aRequest::CancelTask { params, .. } => {
            warn!("cancel requested for task {} — not supported", params.id);
            Ok(JsonRpcResponse::error(
                envelope_id,
                METHOD_NOT_FOUND,
                "tasks/cancel is not supported",
            ))
        }
    }
}

/// Full send-task lifecycle: create-or-get, record the user turn, run the
/// handler, record the agent turn as history and artifact, settle the status.
async fn on_send_task(
    state: &AppState,
    envelope_id: Value,
    params: TaskSendParams,
) -> Result<JsonRpcResponse, A2aError> {
    let task_id = params.id.clone();
    let task = state.registry.create_or_get(&task_id).await;
    if task.status.state.is_terminal() {
        return Ok(JsonRpcResponse::error(
            envelope_id,
            protocol::INVALID_PARAMS,
            format!("task {task_id} already reached state {}", task.status.state),
        ));
    }

    let mut incoming = params.message;
    incoming.task_id = Some(task_id.clone());
    let text = incoming.joined_text();
    let context_id = incoming.context_id.clone();
    state.registry.append_message(&task_id, incoming).await?;
    state.registry.set_status(&task_id, TaskState::Working).await?;

    let session_id = params.session_id.unwrap_or_else(|| task_id.clone());
    match state.handler.handle(&text, &session_id).await {
        Ok(reply) => {
            let agent_message = Message {
                role: Role::Agent,
                parts: vec![Part::text(reply.clone())],
                message_id: Some(Uuid::new_v4().to_string()),
                task_id: Some(task_id.clone()),
                context_id,
            };
            state.registry.append_message(&task_id, agent_message).await?;
            state
                .registry
                .add_artifact(
                    &task_id,
                    Artifact {
                        name: Some("response".to_string()),
                        parts: vec![Part::text(reply)],
                    },
                )
                .await?;
            state.registry.set_status(&task_id, TaskState::Completed).await?;
        }
        Err(e) => {
            warn!("task {task_id} handler failed: {e}");
            let failure = Message {
                role: Role::Agent,
                parts: vec![Part::text(format!("The agent failed to process this task: {e}"))],
                message_id: Some(Uuid::new_v4().to_string()),
                task_id: Some(task_id.clone()),
                context_id,
            };
            state.registry.append_message(&task_id, failure).await?;
            state.registry.set_status(&task_id, TaskState::Failed).await?;
        }
    }

    let task = state.registry.get(&task_id, params.history_length).await?;
    let result = serde_json::to_value(task).map_err(|e| A2aError::Internal(e.to_string()))?;
    Ok(JsonRpcResponse::success(envelope_id, result))
}
