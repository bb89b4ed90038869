//! Typed errors at module boundaries. Every variant maps to
//! exactly one JSON-RPC error code at the dispatcher edge
//! ([`crate::dispatch::to_error_response`]); nothing here crosses into the
//! wire format directly.

use lutebox_proto::ErrorData;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("framing error: {0}")]
    Framing(String),

    #[error("HTTP parse error: {0}")]
    HttpParse(String),

    #[error("JSON-RPC parse error: {0}")]
    JsonRpcParse(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl BridgeError {
    /// Translate to the JSON-RPC error the client sees.
    pub fn to_error_data(&self) -> ErrorData {
        match self {
            BridgeError::Framing(msg) => ErrorData::internal_error(msg),
            BridgeError::HttpParse(msg) => ErrorData::invalid_request(msg),
            BridgeError::JsonRpcParse(msg) => ErrorData::parse_error(msg),
            BridgeError::InvalidParams(msg) => ErrorData::invalid_params(msg),
            BridgeError::UnknownMethod(method) => ErrorData::method_not_found(method),
            BridgeError::UnknownTool(msg) => ErrorData::server_error(msg),
            BridgeError::Collaborator(msg) => ErrorData::server_error(msg),
            BridgeError::Transport(msg) => ErrorData::internal_error(msg),
        }
    }
}
