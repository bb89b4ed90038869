//! `StdioProxy`: the thin stdio-facing half of the bridge. It
//! never runs the HTTP listener itself - it discovers (or launches) the one
//! shared backend process and forwards frames to it over loopback HTTP,
//! mirroring whatever framing the stdio client used on the way back out. A
//! thin client talking to a lazily launched shared process, just
//! coordinating with a sibling of itself rather than an external peer.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use lutebox_config::{AppPaths, LuteboxConfig};
use lutebox_proto::{DiscoveryRecord, ErrorData};

use crate::error::BridgeError;
use crate::framing::{write_frame, FrameFormat, StdioFramer};
use crate::registry::{self, RegistryError};

/// Drives the proxy loop over `reader`/`writer` until clean EOF. Generic so
/// tests can substitute `tokio::io::duplex` halves for real stdin/stdout.
pub async fn run<R, W>(reader: R, mut writer: W, paths: &AppPaths, config: &LuteboxConfig) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let record = discover_or_launch(paths, config).await?;
    let base_url = format!("http://{}:{}", record.host, record.port);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.http_roundtrip_timeout_ms))
        .build()
        .context("failed to build HTTP client")?;

    let mut framer = StdioFramer::new(reader);
    while let Some(frame) = framer.read_frame().await.context("stdio framing error")? {
        let format = framer.detected_format().unwrap_or(FrameFormat::NewlineDelimited);
        let outcome = forward_once(&client, &base_url, &frame).await;
        match outcome {
            Ok(Some(response)) => write_frame(&mut writer, &response, format).await?,
            Ok(None) => {}
            Err(error_data) => {
                let response = error_response_for(&frame, &error_data);
                write_frame(&mut writer, &response, format).await?;
            }
        }
    }
    Ok(())
}

/// One proxied round trip. `Ok(None)` means the backend acknowledged a
/// notification (status 202, or any 2xx with an empty body reconciles the
/// two ways the spec describes that ack); a 2xx with a body is forwarded
/// back verbatim. A 4xx/5xx status is never forwarded verbatim - per §4.3 it
/// is synthesized into a JSON-RPC error matching the status class
/// (invalid-request for 4xx, internal-error for 5xx or anything else).
async fn forward_once(client: &reqwest::Client, base_url: &str, frame: &[u8]) -> Result<Option<Vec<u8>>, ErrorData> {
    let response = client
        .post(base_url)
        .header("Content-Type", "application/json")
        .body(frame.to_vec())
        .send()
        .await
        .map_err(|e| BridgeError::Transport(e.to_string()).to_error_data())?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| BridgeError::Transport(e.to_string()).to_error_data())?;

    if status.as_u16() == 202 || (status.is_success() && body.is_empty()) {
        return Ok(None);
    }
    if status.is_success() {
        return Ok(Some(body.to_vec()));
    }

    let message = String::from_utf8_lossy(&body).into_owned();
    if status.is_client_error() {
        Err(ErrorData::invalid_request(message))
    } else {
        Err(ErrorData::internal_error(message))
    }
}

fn error_response_for(frame: &[u8], error_data: &ErrorData) -> Vec<u8> {
    let id = serde_json::from_slice::<serde_json::Value>(frame)
        .ok()
        .and_then(|v| v.get("id").cloned())
        .unwrap_or(serde_json::Value::Null);
    serde_json::to_vec(&serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error_data.code,
            "message": error_data.message,
        }
    }))
    .unwrap_or_default()
}

/// Reads a live discovery record if one exists; otherwise races to become
/// the one proxy that launches the shared backend, and everyone else waits
/// on it. Restarts the whole decision tree from the top if the proxy that
/// was launching gives up before publishing anything (its `.launching` file
/// disappears while the registry is still empty) - §4.3's "wait loop ...
/// restarts its decision tree from the top".
pub async fn discover_or_launch(paths: &AppPaths, config: &LuteboxConfig) -> Result<DiscoveryRecord> {
    loop {
        if let Some(record) = registry::read_live(paths)? {
            return Ok(record);
        }

        match registry::acquire_launch_lock(paths) {
            Ok(_guard) => {
                let mut child = spawn_backend_sibling().context("failed to spawn backend process")?;
                return wait_for_discovery_after_launch(paths, config, &mut child).await;
            }
            Err(RegistryError::AlreadyLocked) => match wait_for_lock_release_or_discovery(paths, config).await? {
                LockWaitOutcome::Discovered(record) => return Ok(record),
                LockWaitOutcome::LockReleased => continue,
            },
            Err(e) => return Err(e.into()),
        }
    }
}

/// Spawns `lutebox serve` as a detached sibling process that will outlive
/// this proxy. Uses the running binary's own path so the CLI never has to
/// special-case how it was installed. The returned `Child` is polled (never
/// awaited to completion) so the discovery loop can detect an early exit.
fn spawn_backend_sibling() -> Result<tokio::process::Child> {
    let exe = std::env::current_exe().context("could not resolve current executable path")?;
    tokio::process::Command::new(exe)
        .arg("serve")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to spawn backend process")
}

/// Polls the discovery record until it appears and its pid is alive, or until
/// `discovery_timeout_ms` elapses. Exits promptly with failure if the
/// backend we just spawned terminates before publishing anything, rather
/// than waiting out the full timeout.
async fn wait_for_discovery_after_launch(
    paths: &AppPaths,
    config: &LuteboxConfig,
    child: &mut tokio::process::Child,
) -> Result<DiscoveryRecord> {
    let deadline = Instant::now() + Duration::from_millis(config.discovery_timeout_ms);
    loop {
        if let Some(record) = registry::read_live(paths)? {
            return Ok(record);
        }
        if let Ok(Some(status)) = child.try_wait() {
            return Err(anyhow!(
                "backend process exited ({status}) before publishing a discovery record"
            ));
        }
        if Instant::now() >= deadline {
            return Err(anyhow!(
                "timed out after {}ms waiting for the backend to publish its discovery record",
                config.discovery_timeout_ms
            ));
        }
        tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
    }
}

enum LockWaitOutcome {
    Discovered(DiscoveryRecord),
    LockReleased,
}

/// Polls while another proxy holds the launch lock. Returns as soon as a
/// live record appears, or as soon as the `.launching` file disappears while
/// the registry is still empty (the launching proxy gave up; the caller
/// should restart its decision tree), or errors out after
/// `discovery_timeout_ms`.
async fn wait_for_lock_release_or_discovery(paths: &AppPaths, config: &LuteboxConfig) -> Result<LockWaitOutcome> {
    let deadline = Instant::now() + Duration::from_millis(config.discovery_timeout_ms);
    loop {
        if let Some(record) = registry::read_live(paths)? {
            return Ok(LockWaitOutcome::Discovered(record));
        }
        if !registry::launch_lock_exists(paths) {
            return Ok(LockWaitOutcome::LockReleased);
        }
        if Instant::now() >= deadline {
            return Err(anyhow!(
                "timed out after {}ms waiting for another proxy to finish launching the backend",
                config.discovery_timeout_ms
            ));
        }
        tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_paths() -> (tempfile::TempDir, AppPaths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_parts(dir.path().join("server.json"), dir.path().join("t"));
        (dir, paths)
    }

    #[tokio::test]
    async fn discover_or_launch_returns_existing_live_record_without_spawning() {
        let (_dir, paths) = temp_paths();
        registry::publish(&paths, "127.0.0.1", 7737, std::process::id()).unwrap();

        let config = LuteboxConfig::default();
        let record = discover_or_launch(&paths, &config).await.unwrap();
        assert_eq!(record.port, 7737);
    }

    #[tokio::test]
    async fn wait_for_lock_release_times_out_when_nothing_ever_publishes_or_releases() {
        let (_dir, paths) = temp_paths();
        let _guard = registry::acquire_launch_lock(&paths).unwrap();
        let mut config = LuteboxConfig::default();
        config.discovery_timeout_ms = 50;
        config.poll_interval_ms = 10;
        let err = wait_for_lock_release_or_discovery(&paths, &config).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn wait_for_lock_release_picks_up_a_record_published_mid_wait() {
        let (_dir, paths) = temp_paths();
        let _guard = registry::acquire_launch_lock(&paths).unwrap();
        let mut config = LuteboxConfig::default();
        config.discovery_timeout_ms = 2000;
        config.poll_interval_ms = 10;

        let paths_clone = paths.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            registry::publish(&paths_clone, "127.0.0.1", 9999, std::process::id()).unwrap();
        });

        match wait_for_lock_release_or_discovery(&paths, &config).await.unwrap() {
            LockWaitOutcome::Discovered(record) => assert_eq!(record.port, 9999),
            LockWaitOutcome::LockReleased => panic!("expected a discovered record, not a lock release"),
        }
    }

    #[tokio::test]
    async fn wait_for_lock_release_restarts_decision_tree_once_lock_disappears() {
        let (_dir, paths) = temp_paths();
        let guard = registry::acquire_launch_lock(&paths).unwrap();
        let mut config = LuteboxConfig::default();
        config.discovery_timeout_ms = 2000;
        config.poll_interval_ms = 10;

        let paths_clone = paths.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            drop(guard);
        });

        match wait_for_lock_release_or_discovery(&paths_clone, &config).await.unwrap() {
            LockWaitOutcome::LockReleased => {}
            LockWaitOutcome::Discovered(_) => panic!("expected the lock release outcome, not a record"),
        }
    }

    #[tokio::test]
    async fn error_response_for_parse_failure_carries_null_id() {
        let response = error_response_for(b"not json", &BridgeError::Transport("boom".to_string()).to_error_data());
        let value: serde_json::Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["id"], serde_json::Value::Null);
        assert_eq!(value["error"]["message"], "boom");
    }

    /// Binds a one-shot HTTP server that replies with `status` and `body` to
    /// the first request it receives, then stops.
    async fn spawn_one_shot_http_server(status: u16, body: &'static str) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let reason = if status < 500 { "Bad Request" } else { "Internal Server Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn forward_once_synthesizes_invalid_request_for_4xx() {
        let addr = spawn_one_shot_http_server(400, "request body is not valid UTF-8").await;
        let client = reqwest::Client::new();
        let base_url = format!("http://{addr}/");
        let err = forward_once(&client, &base_url, b"{}").await.unwrap_err();
        assert_eq!(err.code, ErrorData::INVALID_REQUEST);
        assert!(err.message.contains("not valid UTF-8"));
    }

    #[tokio::test]
    async fn forward_once_synthesizes_internal_error_for_5xx() {
        let addr = spawn_one_shot_http_server(500, "boom").await;
        let client = reqwest::Client::new();
        let base_url = format!("http://{addr}/");
        let err = forward_once(&client, &base_url, b"{}").await.unwrap_err();
        assert_eq!(err.code, ErrorData::INTERNAL_ERROR);
        assert_eq!(err.message, "boom");
    }
}
