//! A2A (Agent-to-Agent) protocol types
//!
//! Wire-level types for multi-agent task delegation: the agent card served at
//! /.well-known/agent.json, task and message shapes, and the JSON-RPC envelope
//! with strict method-discriminated request decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::error::A2aError;

/// Capability flags advertised on an agent card
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentCapabilities {
    #[serde(default)]
    pub push_notifications: bool,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub state_transition_history: bool,
}

/// A named skill on an agent card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<String>>,
    #[serde(rename = "inputModes", skip_serializing_if = "Option::is_none")]
    pub input_modes: Option<Vec<String>>,
    #[serde(rename = "outputModes", skip_serializing_if = "Option::is_none")]
    pub output_modes: Option<Vec<String>>,
}

/// Agent Card — advertises capabilities at /.well-known/agent.json.
/// Immutable after construction (or after fetch, on the client side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    pub capabilities: AgentCapabilities,
    pub skills: Vec<AgentSkill>,
}

/// Who authored a message turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One content part within a message or artifact.
/// Closed union discriminated by `type`; only text parts exist today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// The textual body of this part. Part order is significant: callers
    /// concatenate in order to reconstruct displayed text.
    pub fn as_text(&self) -> &str {
        match self {
            Part::Text { text } => text,
        }
    }
}

/// One turn in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(rename = "taskId", default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(rename = "contextId", default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl Message {
    /// All text parts concatenated in order, newline-separated.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Canceled,
    Failed,
    /// Fallback for unrecognized wire values; never a valid transition target.
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Failed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Working => write!(f, "working"),
            Self::InputRequired => write!(f, "input-required"),
            Self::Completed => write!(f, "completed"),
            Self::Canceled => write!(f, "canceled"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Task status — the state plus when it was entered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    pub timestamp: DateTime<Utc>,
}

impl TaskStatus {
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            timestamp: Utc::now(),
        }
    }
}

/// Structured output attached to a completed task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub parts: Vec<Part>,
}

/// The unit of delegated work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    pub history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<Artifact>>,
}

impl Task {
    /// A fresh task: submitted, empty history, no artifacts.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::new(TaskState::Submitted),
            history: Vec::new(),
            artifacts: None,
        }
    }
}

/// Parameters of a tasks/send request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSendParams {
    pub id: String,
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub message: Message,
    #[serde(rename = "historyLength", default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Parameters of a tasks/get request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskQueryParams {
    pub id: String,
    #[serde(rename = "historyLength", default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Parameters of a tasks/cancel request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskIdParams {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// An incoming A2A request, discriminated strictly by `method`.
///
/// Each variant pairs exactly one parameter shape with its method tag, so a
/// "tasks/send" envelope carrying get-shaped params fails to decode instead of
/// being dispatched with the wrong payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum A2aRequest {
    #[serde(rename = "tasks/send")]
    SendTask {
        jsonrpc: String,
        #[serde(default)]
        id: Option<Value>,
        params: TaskSendParams,
    },
    #[serde(rename = "tasks/get")]
    GetTask {
        jsonrpc: String,
        #[serde(default)]
        id: Option<Value>,
        params: TaskQueryParams,
    },
    #[serde(rename = "tasks/cancel")]
    CancelTask {
        jsonrpc: String,
        #[serde(default)]
        id: Option<Value>,
        params: TaskIdParams,
    },
}

impl A2aRequest {
    /// The envelope identifier, null when absent.
    pub fn envelope_id(&self) -> Value {
        match self {
            A2aRequest::SendTask { id, .. }
            | A2aRequest::GetTask { id, .. }
            | A2aRequest::CancelTask { id, .. } => id.clone().unwrap_or(Value::Null),
        }
    }
}

/// Decode a raw payload into exactly one known request variant.
pub fn decode(raw: Value) -> Result<A2aRequest, A2aError> {
    serde_json::from_value(raw.clone()).map_err(|e| A2aError::Decode {
        reason: e.to_string(),
        payload: raw,
    })
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC response envelope. The id must echo the request's id so callers
/// can correlate replies; a null id means the request id could not be parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// The fixed internal-error envelope: code -32603, "Internal Error",
    /// detail carried in `data`. Used with a null id when the true request id
    /// could not be determined.
    pub fn internal_error(id: Value, detail: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code: INTERNAL_ERROR,
                message: "Internal Error".to_string(),
                data: Some(Value::String(detail.into())),
            }),
        }
    }
}

/// Serialize a response for the wire, omitting absent optionals.
///
/// A response with both result and error set (or neither) is a programming
/// error upstream; the codec does not silently accept it — it flags the
/// anomaly and deterministically encodes the error.
pub fn encode(mut response: JsonRpcResponse) -> Value {
    if response.result.is_some() && response.error.is_some() {
        warn!(id = %response.id, "response carries both result and error; encoding the error");
        response.result = None;
    } else if response.result.is_none() && response.error.is_none() {
        warn!(id = %response.id, "response carries neither result nor error");
    }
    serde_json::to_value(&response).unwrap_or_else(|e| {
        error!("response serialization failed: {e}");
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": { "code": INTERNAL_ERROR, "message": "Internal Error" }
        })
    })
}

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// A2A-specific: no task registered under the requested id
pub const TASK_NOT_FOUND: i64 = -32001;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_card_serialization_omits_unset_optionals() {
        let card = AgentCard {
            name: "greeting_agent".to_string(),
            description: "Greets the user".to_string(),
            url: "http://127.0.0.1:9000".to_string(),
            version: "1.0.0".to_string(),
            capabilities: AgentCapabilities::default(),
            skills: vec![AgentSkill {
                id: "greet".to_string(),
                name: "Greet".to_string(),
                description: None,
                tags: Some(vec!["greeting".to_string()]),
                examples: None,
                input_modes: None,
                output_modes: None,
            }],
        };
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["name"], "greeting_agent");
        assert!(json["skills"][0].get("description").is_none());
        assert!(json["skills"][0].get("inputModes").is_none());
        assert_eq!(json["skills"][0]["tags"][0], "greeting");
    }

    #[test]
    fn test_task_state_wire_format() {
        assert_eq!(
            serde_json::to_value(TaskState::InputRequired).unwrap(),
            serde_json::json!("input-required")
        );
        assert_eq!(TaskState::InputRequired.to_string(), "input-required");
    }

    #[test]
    fn test_task_state_unknown_fallback() {
        let state: TaskState = serde_json::from_value(serde_json::json!("rebooting")).unwrap();
        assert_eq!(state, TaskState::Unknown);
    }

    #[test]
    fn test_decode_send_task() {
        let raw = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "req-1",
            "method": "tasks/send",
            "params": {
                "id": "task-1",
                "message": {
                    "role": "user",
                    "parts": [{"type": "text", "text": "hey how are you"}]
                }
            }
        });
        let req = decode(raw).unwrap();
        match req {
            A2aRequest::SendTask { params, .. } => {
                assert_eq!(params.id, "task-1");
                assert_eq!(params.message.parts[0].as_text(), "hey how are you");
            }
            other => panic!("decoded wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_method() {
        let raw = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tasks/stream",
            "params": {"id": "task-1"}
        });
        assert!(matches!(decode(raw), Err(A2aError::Decode { .. })));
    }

    #[test]
    fn test_decode_rejects_mismatched_params() {
        // tasks/send method with get-shaped params (no message)
        let raw = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tasks/send",
            "params": {"id": "task-1", "historyLength": 2}
        });
        let err = decode(raw).unwrap_err();
        match err {
            A2aError::Decode { payload, .. } => {
                assert_eq!(payload["method"], "tasks/send");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_part_type() {
        let raw = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tasks/send",
            "params": {
                "id": "task-1",
                "message": {
                    "role": "user",
                    "parts": [{"type": "image", "url": "http://example.com/x.png"}]
                }
            }
        });
        assert!(matches!(decode(raw), Err(A2aError::Decode { .. })));
    }

    #[test]
    fn test_envelope_id_null_when_absent() {
        let raw = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "tasks/get",
            "params": {"id": "task-1"}
        });
        let req = decode(raw).unwrap();
        assert_eq!(req.envelope_id(), Value::Null);
    }

    #[test]
    fn test_encode_success_omits_error() {
        let resp = JsonRpcResponse::success(serde_json::json!("req-1"), serde_json::json!({"ok": true}));
        let wire = encode(resp);
        assert_eq!(wire["id"], "req-1");
        assert!(wire.get("error").is_none());
        assert_eq!(wire["result"]["ok"], true);
    }

    #[test]
    fn test_encode_prefers_error_when_both_set() {
        let mut resp = JsonRpcResponse::error(serde_json::json!(7), INTERNAL_ERROR, "boom");
        resp.result = Some(serde_json::json!({"ok": true}));
        let wire = encode(resp);
        assert!(wire.get("result").is_none());
        assert_eq!(wire["error"]["code"], -32603);
    }

    #[test]
    fn test_internal_error_shape() {
        let wire = encode(JsonRpcResponse::internal_error(Value::Null, "bad payload"));
        assert_eq!(wire["id"], Value::Null);
        assert_eq!(wire["error"]["code"], -32603);
        assert_eq!(wire["error"]["message"], "Internal Error");
        assert_eq!(wire["error"]["data"], "bad payload");
    }
}
