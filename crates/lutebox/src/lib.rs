//! lutebox: MCP transport, request-routing, and single-instance coordination
//! bridge for a local music-playback service.
//!
//! A `StdioProxy` ([`proxy`]) speaks MCP over stdin/stdout to whichever
//! client launched it, and forwards every request over loopback HTTP to the
//! one shared `BackendSupervisor` ([`backend`]) running on the machine,
//! discovering or launching it as needed ([`registry`]). The backend's
//! `HttpListener` ([`http`]) and the proxy both route decoded JSON-RPC
//! through the same `McpDispatcher` ([`dispatch`]), which implements the MCP
//! method table and calls into [`tools`] for `play`/`engrave`. External
//! systems (audio engine, engraver, rasterizer, GUI activity log) are never
//! referenced directly - only through the [`collab`] traits.

pub mod activity;
pub mod backend;
pub mod collab;
pub mod dispatch;
pub mod error;
pub mod framing;
pub mod http;
pub mod proxy;
pub mod registry;
pub mod scores;
pub mod tools;

pub use backend::BackendSupervisor;
pub use collab::Collaborators;
pub use dispatch::McpDispatcher;
pub use error::BridgeError;
pub use http::HttpListener;
