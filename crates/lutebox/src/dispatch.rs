//! `McpDispatcher`: the transport-agnostic JSON-RPC 2.0 method
//! table implementing the MCP surface. A plain `match` over `&str` rather
//! than a trait-object registry - this crate has exactly two tools and a
//! fixed method set, so the extra indirection a larger multi-backend
//! dispatcher would need buys nothing here.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::OnceLock;

use base64::Engine as _;
use serde_json::{json, Value};

use lutebox_proto::{
    ActivityEvent, ErrorData, JsonRpcMessage, JsonRpcOutcome, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, ReadResourceParams,
    ReadResourceResult, Transport,
};

use crate::collab::Collaborators;
use crate::scores::ScoreStore;
use crate::tools;

const TOOLS_JSON: &str = include_str!("../static/tools.json");
const PROMPTS_JSON: &str = include_str!("../static/prompts.json");

/// MCP protocol version this dispatcher implements.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

pub struct McpDispatcher {
    pub collab: Collaborators,
    pub scores: ScoreStore,
    temp_dir: PathBuf,
    host: String,
    port: AtomicU16,
    server_name: String,
    server_version: String,
    initialized: AtomicBool,
    tools_cache: OnceLock<Vec<lutebox_proto::ToolDefinition>>,
    prompts_cache: OnceLock<ListPromptsResult>,
}

impl McpDispatcher {
    pub fn new(
        collab: Collaborators,
        temp_dir: PathBuf,
        server_name: impl Into<String>,
        server_version: impl Into<String>,
        initial_port: u16,
    ) -> Self {
        Self {
            collab,
            scores: ScoreStore::new(),
            temp_dir,
            host: "127.0.0.1".to_string(),
            port: AtomicU16::new(initial_port),
            server_name: server_name.into(),
            server_version: server_version.into(),
            initialized: AtomicBool::new(false),
            tools_cache: OnceLock::new(),
            prompts_cache: OnceLock::new(),
        }
    }

    /// Called by `BackendSupervisor` once the listener's real port is known
    ///, so `engrave`'s image URLs are correct even when the
    /// configured port was 0 (kernel-assigned).
    pub fn set_port(&self, port: u16) {
        self.port.store(port, Ordering::SeqCst);
    }

    pub fn port(&self) -> u16 {
        self.port.load(Ordering::SeqCst)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn temp_dir(&self) -> &std::path::Path {
        &self.temp_dir
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port())
    }

    fn tool_catalog(&self) -> &[lutebox_proto::ToolDefinition] {
        self.tools_cache
            .get_or_init(|| {
                let parsed: ListToolsResult =
                    serde_json::from_str(TOOLS_JSON).expect("static/tools.json must parse");
                parsed.tools
            })
            .as_slice()
    }

    fn prompt_catalog(&self) -> &ListPromptsResult {
        self.prompts_cache.get_or_init(|| {
            serde_json::from_str(PROMPTS_JSON).expect("static/prompts.json must parse")
        })
    }

    /// Dispatch one decoded JSON-RPC message. Returns `None` iff `message`
    /// was a notification (absent `id`); notifications never produce a
    /// response frame regardless of whether handling them succeeded
    ///.
    pub async fn handle(
        &self,
        message: JsonRpcMessage,
        transport: Transport,
        raw_body: &[u8],
    ) -> Option<JsonRpcOutcome> {
        let id = message.id.clone();
        let method = message.method.clone();
        let params = message.params.clone();

        let mut event = ActivityEvent::new(
            method.clone(),
            transport,
            raw_body.len(),
            serde_json::to_value(&message).unwrap_or(Value::Null),
        );
        if method == "tools/call" {
            if let Some(tool_name) = params.as_ref().and_then(|p| p.get("name")).and_then(Value::as_str) {
                event = event.with_tool_name(tool_name);
            }
        }
        if method == "initialize" {
            if let Some(client_info) = params.as_ref().and_then(|p| p.get("clientInfo")) {
                event = event.with_client_info(client_info.clone());
            }
        }

        let result = self.dispatch_method(&method, params).await;

        self.collab.activity.add(event);
        if let Ok(value) = &result {
            self.collab
                .activity
                .patch_last_response(value.to_string());
        }

        id.map(|id| match result {
            Ok(value) => JsonRpcOutcome::ok(id, value),
            Err(error) => JsonRpcOutcome::err(id, error),
        })
    }

    async fn dispatch_method(&self, method: &str, params: Option<Value>) -> Result<Value, ErrorData> {
        match method {
            "ping" => Ok(json!({})),
            "initialize" => Ok(self.handle_initialize(params)),
            "notifications/initialized" => {
                self.initialized.store(true, Ordering::SeqCst);
                Ok(Value::Null)
            }
            "tools/list" => Ok(json!(ListToolsResult {
                tools: self.tool_catalog().to_vec(),
            })),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!(ListResourcesResult::empty())),
            "resources/templates/list" => Ok(json!(ListResourceTemplatesResult::empty())),
            "resources/read" => self.handle_resources_read(params).await,
            "prompts/list" => Ok(json!(self.prompt_catalog())),
            other => Err(ErrorData::method_not_found(other)),
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> Value {
        if let Some(params) = &params {
            if let Some(client_info) = params.get("clientInfo") {
                tracing::info!(client_info = %client_info, "MCP client connected");
            }
        }
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "prompts": { "listChanged": false },
                "resources": { "listChanged": false },
            },
            "serverInfo": {
                "name": self.server_name,
                "version": self.server_version,
            }
        })
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, ErrorData> {
        let params = params.ok_or_else(|| ErrorData::invalid_params("tools/call requires params"))?;
        let call: lutebox_proto::CallToolParams =
            serde_json::from_value(params).map_err(|e| ErrorData::invalid_params(e.to_string()))?;
        let arguments = call
            .arguments
            .map(Value::Object)
            .unwrap_or_else(|| Value::Object(Default::default()));

        let result = match call.name.as_str() {
            "play" => tools::play(self, arguments).await,
            "engrave" => tools::engrave(self, arguments).await,
            other => Err(crate::error::BridgeError::UnknownTool(format!(
                "unknown tool: {other}"
            ))),
        };

        result
            .map(|tool_result| serde_json::to_value(tool_result).unwrap_or(Value::Null))
            .map_err(|e| e.to_error_data())
    }

    async fn handle_resources_read(&self, params: Option<Value>) -> Result<Value, ErrorData> {
        let params = params.ok_or_else(|| ErrorData::invalid_params("resources/read requires params"))?;
        let params: ReadResourceParams =
            serde_json::from_value(params).map_err(|e| ErrorData::invalid_params(e.to_string()))?;

        let uri = params.uri.strip_prefix("file://").ok_or_else(|| {
            ErrorData::server_error(format!("only file:// URIs are supported, got {}", params.uri))
        })?;

        let path = std::path::Path::new(uri);
        let resolved = tokio::fs::canonicalize(path).await.ok();
        let temp_dir = tokio::fs::canonicalize(&self.temp_dir).await.ok();
        let within_temp_dir = matches!((resolved, temp_dir), (Some(r), Some(t)) if r.starts_with(t));
        if !within_temp_dir {
            return Err(ErrorData::server_error(format!(
                "resource path escapes the process temp directory: {}",
                params.uri
            )));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ErrorData::server_error(format!("failed to read {}: {e}", params.uri)))?;
        let blob = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(json!(ReadResourceResult::single_blob(
            params.uri.clone(),
            blob,
            "image/png"
        )))
    }
}

/// Build the JSON-RPC parse-error response for a body that didn't decode
/// into a `JsonRpcMessage` at all. Recovers `id` from the raw
/// bytes when possible so a malformed-but-parseable request still gets its
/// id echoed back.
pub fn parse_error_response(raw_body: &[u8]) -> Value {
    let id = serde_json::from_slice::<Value>(raw_body)
        .ok()
        .and_then(|v| v.get("id").cloned())
        .unwrap_or(Value::Null);
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": ErrorData::PARSE_ERROR,
            "message": "Parse error",
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lutebox_proto::RequestId;

    fn dispatcher() -> McpDispatcher {
        McpDispatcher::new(
            Collaborators::stub(),
            std::env::temp_dir(),
            "lutebox",
            "0.1.0",
            7737,
        )
    }

    fn request(id: i64, method: &str, params: Value) -> JsonRpcMessage {
        serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))
        .unwrap()
    }

    fn notification(method: &str, params: Value) -> JsonRpcMessage {
        serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn ping_returns_empty_object() {
        let d = dispatcher();
        let outcome = d.handle(request(1, "ping", json!({})), Transport::Http, b"{}").await;
        match outcome.unwrap() {
            JsonRpcOutcome::Result(r) => assert_eq!(r.result, json!({})),
            JsonRpcOutcome::Error(e) => panic!("unexpected error: {e:?}"),
        }
    }

    #[tokio::test]
    async fn initialize_reports_protocol_version_and_capabilities() {
        let d = dispatcher();
        let outcome = d
            .handle(
                request(
                    1,
                    "initialize",
                    json!({"protocolVersion": PROTOCOL_VERSION, "clientInfo": {"name": "t", "version": "1"}, "capabilities": {}}),
                ),
                Transport::Http,
                b"{}",
            )
            .await;
        match outcome.unwrap() {
            JsonRpcOutcome::Result(r) => {
                assert_eq!(r.result["protocolVersion"], PROTOCOL_VERSION);
                assert_eq!(r.result["serverInfo"]["name"], "lutebox");
                assert!(r.result["capabilities"]["tools"].is_object());
                assert!(r.result["capabilities"]["prompts"].is_object());
                assert!(r.result["capabilities"]["resources"].is_object());
            }
            JsonRpcOutcome::Error(e) => panic!("unexpected error: {e:?}"),
        }
    }

    #[tokio::test]
    async fn notification_initialized_produces_no_response() {
        let d = dispatcher();
        let outcome = d
            .handle(notification("notifications/initialized", json!(null)), Transport::Http, b"{}")
            .await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn tools_list_contains_exactly_play_and_engrave() {
        let d = dispatcher();
        let outcome = d.handle(request(1, "tools/list", json!({})), Transport::Http, b"{}").await;
        match outcome.unwrap() {
            JsonRpcOutcome::Result(r) => {
                let tools = r.result["tools"].as_array().unwrap();
                let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
                assert_eq!(names.len(), 2);
                assert!(names.contains(&"play"));
                assert!(names.contains(&"engrave"));
                for tool in tools {
                    assert!(!tool["description"].as_str().unwrap().is_empty());
                    assert!(tool["inputSchema"].is_object());
                }
            }
            JsonRpcOutcome::Error(e) => panic!("unexpected error: {e:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let d = dispatcher();
        let outcome = d.handle(request(1, "frobnicate", json!({})), Transport::Http, b"{}").await;
        match outcome.unwrap() {
            JsonRpcOutcome::Error(e) => assert_eq!(e.error.code, ErrorData::METHOD_NOT_FOUND),
            JsonRpcOutcome::Result(r) => panic!("unexpected success: {r:?}"),
        }
    }

    #[tokio::test]
    async fn play_then_engrave_round_trips_through_score_store() {
        let d = dispatcher();
        let play_outcome = d
            .handle(
                request(
                    1,
                    "tools/call",
                    json!({
                        "name": "play",
                        "arguments": {
                            "title": "T",
                            "tempo": 120,
                            "tracks": [{
                                "instrument": "grand_piano",
                                "events": [{"time": 0, "pitches": ["C4"], "dur": 1, "vel": 100}]
                            }]
                        }
                    }),
                ),
                Transport::Http,
                b"{}",
            )
            .await
            .unwrap();

        let score_id = match play_outcome {
            JsonRpcOutcome::Result(r) => {
                let content = r.result["content"].as_array().unwrap();
                assert_eq!(content[0]["text"], "Playing T at 120 BPM with 1 event.");
                let score_line = content[1]["text"].as_str().unwrap();
                score_line.strip_prefix("Score ID: ").unwrap().to_string()
            }
            JsonRpcOutcome::Error(e) => panic!("play failed: {e:?}"),
        };

        let engrave_outcome = d
            .handle(
                request(2, "tools/call", json!({"name": "engrave", "arguments": {"score_id": score_id}})),
                Transport::Http,
                b"{}",
            )
            .await
            .unwrap();

        match engrave_outcome {
            JsonRpcOutcome::Result(r) => {
                let content = r.result["content"].as_array().unwrap();
                assert_eq!(content.len(), 1);
                assert_eq!(content[0]["type"], "image");
                assert_eq!(content[0]["mimeType"], "image/png");
            }
            JsonRpcOutcome::Error(e) => panic!("engrave failed: {e:?}"),
        }
    }

    #[tokio::test]
    async fn resources_read_serves_a_file_under_the_temp_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let d = McpDispatcher::new(Collaborators::stub(), tmp.path().to_path_buf(), "lutebox", "0.1.0", 7737);
        let file_path = tmp.path().join("shot.png");
        tokio::fs::write(&file_path, b"not really a png").await.unwrap();

        let outcome = d
            .handle(
                request(1, "resources/read", json!({"uri": format!("file://{}", file_path.display())})),
                Transport::Http,
                b"{}",
            )
            .await
            .unwrap();

        match outcome {
            JsonRpcOutcome::Result(r) => {
                let contents = r.result["contents"].as_array().unwrap();
                assert_eq!(contents[0]["mimeType"], "image/png");
            }
            JsonRpcOutcome::Error(e) => panic!("resources/read failed: {e:?}"),
        }
    }

    #[tokio::test]
    async fn resources_read_rejects_a_path_outside_the_temp_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let d = McpDispatcher::new(Collaborators::stub(), tmp.path().to_path_buf(), "lutebox", "0.1.0", 7737);
        let outcome = d
            .handle(
                request(1, "resources/read", json!({"uri": "file:///etc/passwd"})),
                Transport::Http,
                b"{}",
            )
            .await
            .unwrap();

        match outcome {
            JsonRpcOutcome::Error(e) => assert_eq!(e.error.code, ErrorData::SERVER_ERROR),
            JsonRpcOutcome::Result(r) => panic!("unexpected success: {r:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_instrument_is_server_error() {
        let d = dispatcher();
        let outcome = d
            .handle(
                request(
                    1,
                    "tools/call",
                    json!({
                        "name": "play",
                        "arguments": {
                            "tempo": 120,
                            "tracks": [{"instrument": "kazoo", "events": [{"time": 0, "pitches": ["C4"], "dur": 1}]}]
                        }
                    }),
                ),
                Transport::Http,
                b"{}",
            )
            .await
            .unwrap();

        match outcome {
            JsonRpcOutcome::Error(e) => {
                assert_eq!(e.error.code, ErrorData::SERVER_ERROR);
                assert!(e.error.message.contains("kazoo"));
            }
            JsonRpcOutcome::Result(r) => panic!("unexpected success: {r:?}"),
        }
    }

    #[tokio::test]
    async fn request_id_round_trips_as_number() {
        let d = dispatcher();
        let outcome = d.handle(request(42, "ping", json!({})), Transport::Http, b"{}").await.unwrap();
        match outcome {
            JsonRpcOutcome::Result(r) => assert_eq!(r.id, RequestId::Number(42)),
            JsonRpcOutcome::Error(e) => panic!("unexpected error: {e:?}"),
        }
    }

    #[test]
    fn parse_error_response_recovers_id_when_present() {
        let response = parse_error_response(br#"{"jsonrpc":"2.0","id":7,"method"}"#);
        assert_eq!(response["id"], json!(7));
        assert_eq!(response["error"]["code"], ErrorData::PARSE_ERROR);
    }

    #[test]
    fn parse_error_response_uses_null_id_for_garbage() {
        let response = parse_error_response(b"not json at all");
        assert_eq!(response["id"], Value::Null);
    }
}
