//! Wire types for the lutebox MCP bridge: the JSON-RPC envelope, tool/prompt/
//! resource descriptors, content blocks, error codes, the discovery record
//! format, and the music sequence data model. No I/O lives here; everything
//! is a plain serde type, scoped to exactly what the bridge's dispatcher and
//! tool handlers need.

pub mod activity;
pub mod content;
pub mod discovery;
pub mod error;
pub mod jsonrpc;
pub mod music;
pub mod prompt;
pub mod resource;
pub mod tool;

pub use activity::{ActivityEvent, Transport};
pub use content::{Content, ToolResult};
pub use discovery::{DiscoveryRecord, DiscoveryStatus};
pub use error::ErrorData;
pub use jsonrpc::{JsonRpcMessage, JsonRpcOutcome, JsonRpcResponse, JsonRpcErrorResponse, RequestId};
pub use music::{Event, MusicSequence, Pitch, Track};
pub use prompt::{ListPromptsResult, PromptArgument, PromptDefinition};
pub use resource::{
    BlobResourceContents, ListResourceTemplatesResult, ListResourcesResult, ReadResourceParams,
    ReadResourceResult, ResourceDescriptor,
};
pub use tool::{CallToolParams, CallToolResult, ListToolsResult, ToolDefinition};
