//! `ActivityEvent`: append-only per-request metadata surfaced only
//! to the GUI collaborator, never part of the wire protocol itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Http,
    Stdio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub transport: Transport,
    pub byte_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_info: Option<Value>,
    pub request_body: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
}

impl ActivityEvent {
    pub fn new(method: impl Into<String>, transport: Transport, byte_size: usize, request_body: Value) -> Self {
        Self {
            method: method.into(),
            tool_name: None,
            transport,
            byte_size,
            client_info: None,
            request_body,
            response_body: None,
        }
    }

    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self
    }

    pub fn with_client_info(mut self, info: Value) -> Self {
        self.client_info = Some(info);
        self
    }
}
