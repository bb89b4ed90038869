//! `HttpListener`: the loopback HTTP/1.1 front door. Deliberately
//! hand-rolled on top of `httparse` and a raw `TcpListener` rather than
//! `axum`/`hyper` - the incremental three-state parser (`ReadingHeaders` /
//! `ReadingBody` / a request handed back once complete) needs to be directly
//! feedable with byte fragments in tests, which a framework-owned request
//! body stream doesn't easily allow.

use std::io;
use std::net::SocketAddr;
use std::path::{Component, Path};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use lutebox_proto::{JsonRpcMessage, Transport};

use crate::dispatch::{self, McpDispatcher};
use crate::error::BridgeError;

const MAX_HEADER_BYTES: usize = 16 * 1024;
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// A fully decoded HTTP/1.1 request: just enough of the protocol for this
/// bridge's three routes. Header names are kept as given;
/// lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ParsedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

enum ParserState {
    ReadingHeaders,
    ReadingBody {
        method: String,
        path: String,
        headers: Vec<(String, String)>,
        content_length: usize,
    },
}

/// Feeds header and body bytes in from whatever chunks the socket produces
/// them in, handing back a `ParsedRequest` only once the full request has
/// arrived.
pub struct RequestParser {
    buffer: Vec<u8>,
    state: ParserState,
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            state: ParserState::ReadingHeaders,
        }
    }

    /// Returns `Ok(Some(request))` once a full request has been assembled,
    /// `Ok(None)` if more bytes are needed, or an error for malformed input
    /// or a request that exceeds this listener's size limits.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<ParsedRequest>, BridgeError> {
        self.buffer.extend_from_slice(chunk);

        loop {
            match &self.state {
                ParserState::ReadingHeaders => {
                    if self.buffer.len() > MAX_HEADER_BYTES {
                        return Err(BridgeError::HttpParse("request headers too large".to_string()));
                    }
                    let mut raw_headers = [httparse::EMPTY_HEADER; 64];
                    let mut req = httparse::Request::new(&mut raw_headers);
                    match req.parse(&self.buffer) {
                        Ok(httparse::Status::Complete(offset)) => {
                            let method = req.method.unwrap_or("").to_string();
                            let path = req.path.unwrap_or("").to_string();
                            let headers: Vec<(String, String)> = req
                                .headers
                                .iter()
                                .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
                                .collect();
                            let content_length = headers
                                .iter()
                                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                                .unwrap_or(0);
                            if content_length > MAX_BODY_BYTES {
                                return Err(BridgeError::HttpParse("request body too large".to_string()));
                            }
                            self.buffer.drain(..offset);
                            self.state = ParserState::ReadingBody {
                                method,
                                path,
                                headers,
                                content_length,
                            };
                        }
                        Ok(httparse::Status::Partial) => return Ok(None),
                        Err(e) => return Err(BridgeError::HttpParse(e.to_string())),
                    }
                }
                ParserState::ReadingBody { content_length, .. } => {
                    if self.buffer.len() < *content_length {
                        return Ok(None);
                    }
                    let ParserState::ReadingBody {
                        method,
                        path,
                        headers,
                        content_length,
                    } = std::mem::replace(&mut self.state, ParserState::ReadingHeaders)
                    else {
                        unreachable!("checked above")
                    };
                    let body = self.buffer.drain(..content_length).collect();
                    return Ok(Some(ParsedRequest {
                        method,
                        path,
                        headers,
                        body,
                    }));
                }
            }
        }
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Percent-decodes a path segment and rejects anything that isn't a single
/// plain filename component - no `..`, no embedded `/`, no absolute path
///.
pub fn safe_image_name(raw: &str) -> Option<String> {
    let decoded = percent_decode(raw)?;
    let path = Path::new(&decoded);
    let mut components = path.components();
    let first = components.next()?;
    if components.next().is_some() {
        return None;
    }
    match first {
        Component::Normal(s) => {
            let name = s.to_str()?;
            if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            }
        }
        _ => None,
    }
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = std::str::from_utf8(bytes.get(i + 1..i + 3)?).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

struct HttpResponse {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl HttpResponse {
    fn json(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.into().into_bytes(),
        }
    }

    fn png(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "image/png",
            body,
        }
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Internal Server Error",
    }
}

async fn write_response<W: tokio::io::AsyncWrite + Unpin>(stream: &mut W, response: HttpResponse) -> io::Result<()> {
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        status_text(response.status),
        response.content_type,
        response.body.len(),
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(&response.body).await?;
    stream.flush().await
}

/// Routes one fully parsed request to the spec's three endpoints:
/// `POST /` (JSON-RPC), `GET /health`, and `GET /images/<name>`. Everything
/// else is a 404.
async fn route(dispatcher: &McpDispatcher, request: &ParsedRequest) -> HttpResponse {
    match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/") => handle_rpc(dispatcher, &request.body).await,
        ("GET", "/health") => HttpResponse::json(
            200,
            serde_json::to_vec(&serde_json::json!({"status": "healthy", "port": dispatcher.port()})).unwrap_or_default(),
        ),
        ("GET", path) if path.starts_with("/images/") => handle_image(dispatcher, &path["/images/".len()..]).await,
        (_, _) => HttpResponse::text(404, "not found"),
    }
}

async fn handle_rpc(dispatcher: &McpDispatcher, body: &[u8]) -> HttpResponse {
    if std::str::from_utf8(body).is_err() {
        return HttpResponse::text(400, "request body is not valid UTF-8");
    }

    let message: JsonRpcMessage = match serde_json::from_slice(body) {
        Ok(message) => message,
        Err(_) => {
            let response = dispatch::parse_error_response(body);
            return HttpResponse::json(200, serde_json::to_vec(&response).unwrap_or_default());
        }
    };

    match dispatcher.handle(message, Transport::Http, body).await {
        Some(outcome) => HttpResponse::json(200, serde_json::to_vec(&outcome).unwrap_or_default()),
        None => HttpResponse {
            status: 200,
            content_type: "application/json",
            body: Vec::new(),
        },
    }
}

async fn handle_image(dispatcher: &McpDispatcher, raw_name: &str) -> HttpResponse {
    let Some(name) = safe_image_name(raw_name) else {
        return HttpResponse::text(400, "invalid image name");
    };
    let path = dispatcher.temp_dir().join(&name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => HttpResponse::png(bytes),
        Err(_) => HttpResponse::text(404, "not found"),
    }
}

/// The bound loopback HTTP server. Owns nothing but the listener and a
/// shared `McpDispatcher`; every connection is handled on its own task so a
/// slow client can't stall others.
pub struct HttpListener {
    listener: TcpListener,
    dispatcher: Arc<McpDispatcher>,
}

impl HttpListener {
    /// Binds `host:port` (use port 0 to let the kernel choose) and publishes
    /// the resolved port back onto the dispatcher, so `engrave`'s image URLs
    /// are correct even when the caller asked for an ephemeral port.
    pub async fn bind(dispatcher: Arc<McpDispatcher>, host: &str, port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        dispatcher.set_port(listener.local_addr()?.port());
        Ok(Self { listener, dispatcher })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the process is torn down or the socket
    /// errors out.
    pub async fn serve(self) -> io::Result<()> {
        loop {
            let (stream, _peer) = self.listener.accept().await?;
            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move {
                handle_connection(stream, dispatcher).await;
            });
        }
    }
}

async fn handle_connection(mut stream: TcpStream, dispatcher: Arc<McpDispatcher>) {
    let mut parser = RequestParser::new();
    let mut buf = [0u8; 8192];

    let request = loop {
        match stream.read(&mut buf).await {
            Ok(0) => return,
            Ok(n) => match parser.feed(&buf[..n]) {
                Ok(Some(request)) => break request,
                Ok(None) => continue,
                Err(e) => {
                    let _ = write_response(&mut stream, HttpResponse::text(400, e.to_string())).await;
                    return;
                }
            },
            Err(_) => return,
        }
    };

    let response = route(&dispatcher, &request).await;
    let _ = write_response(&mut stream, response).await;
}
