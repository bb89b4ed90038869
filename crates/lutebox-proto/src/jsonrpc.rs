//! JSON-RPC 2.0 envelope types used by the MCP dispatcher.
//!
//! Requests and notifications distinguish themselves by the presence of
//! `id`; a notification MUST produce no response frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorData;

/// JSON-RPC version marker - always serializes/deserializes as "2.0".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "2.0" {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected JSON-RPC version '2.0', got '{s}'"
            )))
        }
    }
}

impl Default for JsonRpcVersion {
    fn default() -> Self {
        JsonRpcVersion
    }
}

/// A JSON-RPC request id: string, number, or (per the wire format) absent/null
/// on a notification. `null` ids are folded into `None` by the framer/listener
/// before this type is ever constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// An inbound message that may be a request or a notification; the only
/// difference on the wire is whether `id` is present. Used for decoding
/// arbitrary frames off stdio or an HTTP body before the dispatcher knows
/// which kind it has.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcMessage {
    pub jsonrpc: JsonRpcVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcMessage {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_request(&self) -> bool {
        self.id.is_some()
    }
}

/// A successful JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse<T = Value> {
    pub jsonrpc: JsonRpcVersion,
    pub id: RequestId,
    pub result: T,
}

impl<T> JsonRpcResponse<T> {
    pub fn success(id: impl Into<RequestId>, result: T) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: id.into(),
            result,
        }
    }
}

/// A JSON-RPC error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: JsonRpcVersion,
    pub id: RequestId,
    pub error: ErrorData,
}

impl JsonRpcErrorResponse {
    pub fn new(id: impl Into<RequestId>, error: ErrorData) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: id.into(),
            error,
        }
    }
}

/// Either side of a dispatch result: a response that must be written back, or
/// nothing (notifications produce no frame).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonRpcOutcome {
    Result(JsonRpcResponse<Value>),
    Error(JsonRpcErrorResponse),
}

impl JsonRpcOutcome {
    pub fn ok(id: impl Into<RequestId>, result: Value) -> Self {
        Self::Result(JsonRpcResponse::success(id, result))
    }

    pub fn err(id: impl Into<RequestId>, error: ErrorData) -> Self {
        Self::Error(JsonRpcErrorResponse::new(id, error))
    }
}
