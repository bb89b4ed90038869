//! `BackendSupervisor`: owns the one `HttpListener` per machine,
//! publishes its `DiscoveryRecord` once bound, and cleans the record and
//! launch lock back up on shutdown. The lifecycle manager around the
//! `TcpListener` bind/serve sequence, plus the publish/remove bookkeeping
//! `proxy.rs`'s discovery protocol depends on.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use lutebox_config::{AppPaths, LuteboxConfig};

use crate::collab::Collaborators;
use crate::dispatch::McpDispatcher;
use crate::http::HttpListener;
use crate::registry;

/// Discovery records older than this are swept on startup even if their pid
/// happens to be alive (e.g. pid reuse after a crash)
const STALE_RECORD_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// PNG artifacts older than this are swept on startup per the PngArtifact
/// lifecycle.
const STALE_PNG_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

pub struct BackendSupervisor {
    paths: AppPaths,
    dispatcher: Arc<McpDispatcher>,
}

impl BackendSupervisor {
    /// Binds the HTTP listener, sweeps any stale discovery state left behind
    /// by a prior crashed process, and publishes a fresh discovery record.
    /// Returns the supervisor and its bound listener so the caller can drive
    /// `serve()` on its own task/lifetime.
    pub async fn start(paths: AppPaths, config: &LuteboxConfig) -> Result<(Self, HttpListener)> {
        sweep_stale_record(&paths)?;
        let temp_dir = resolve_temp_dir(&paths, config);
        sweep_stale_png_artifacts(&temp_dir).await;

        let dispatcher = Arc::new(McpDispatcher::new(
            Collaborators::stub(),
            temp_dir,
            config.server_name.clone(),
            config.server_version.clone(),
            config.port,
        ));

        let listener = HttpListener::bind(Arc::clone(&dispatcher), "127.0.0.1", config.port)
            .await
            .context("failed to bind HTTP listener")?;
        let port = listener.local_addr().context("listener has no local address")?.port();

        registry::publish(&paths, "127.0.0.1", port, std::process::id())
            .context("failed to publish discovery record")?;

        tracing::info!(port, "lutebox backend listening");

        Ok((Self { paths, dispatcher }, listener))
    }

    pub fn dispatcher(&self) -> &Arc<McpDispatcher> {
        &self.dispatcher
    }

    /// Removes the discovery record and launch lock so the next proxy
    /// doesn't mistake this process for still being alive.
    pub fn shutdown(&self) {
        if let Err(e) = registry::remove(&self.paths) {
            tracing::warn!(error = %e, "failed to remove discovery record on shutdown");
        }
    }
}

fn resolve_temp_dir(paths: &AppPaths, config: &LuteboxConfig) -> std::path::PathBuf {
    config
        .temp_dir_override
        .clone()
        .unwrap_or_else(|| paths.temp_dir().to_path_buf())
}

/// Deletes PNG artifacts older than 24 hours from the process temp
/// directory on startup. Best-effort: a missing directory or an
/// unreadable entry is skipped rather than failing the whole startup.
async fn sweep_stale_png_artifacts(temp_dir: &std::path::Path) {
    let mut entries = match tokio::fs::read_dir(temp_dir).await {
        Ok(entries) => entries,
        Err(_) => return,
    };
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(_) => break,
        };
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if age > STALE_PNG_MAX_AGE {
            let _ = tokio::fs::remove_file(entry.path()).await;
        }
    }
}

/// A discovery record left behind by a process that died without cleaning
/// up is usually caught by `read_live`'s pid check, but a reused pid could
/// slip through; age is the fallback signal.
fn sweep_stale_record(paths: &AppPaths) -> Result<()> {
    let Some(record) = registry::read(paths)? else {
        return Ok(());
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();
    let age = Duration::from_secs_f64((now - record.timestamp).max(0.0));
    if age > STALE_RECORD_MAX_AGE || !registry::is_alive(record.pid) {
        tracing::info!(age_secs = age.as_secs(), "sweeping stale discovery record");
        registry::remove(paths)?;
    }
    Ok(())
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
    async fn start_binds_an_ephemeral_port_and_publishes_it() {
        let (_dir, paths) = temp_paths();
        let mut config = LuteboxConfig::default();
        config.port = 0;

        let (supervisor, listener) = BackendSupervisor::start(paths.clone(), &config).await.unwrap();
        let bound_port = listener.local_addr().unwrap().port();
        assert_ne!(bound_port, 0);

        let record = registry::read(&paths).unwrap().unwrap();
        assert_eq!(record.port, bound_port);
        assert_eq!(supervisor.dispatcher().port(), bound_port);
    }

    #[tokio::test]
    async fn png_sweep_removes_old_files_and_keeps_fresh_ones() {
        let dir = tempfile::tempdir().unwrap();

        let old = dir.path().join("old.png");
        std::fs::write(&old, b"old").unwrap();
        let old_file = std::fs::OpenOptions::new().write(true).open(&old).unwrap();
        old_file
            .set_modified(SystemTime::now() - Duration::from_secs(48 * 60 * 60))
            .unwrap();

        let fresh = dir.path().join("fresh.png");
        std::fs::write(&fresh, b"fresh").unwrap();

        sweep_stale_png_artifacts(dir.path()).await;

        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn png_sweep_on_missing_directory_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        sweep_stale_png_artifacts(&missing).await;
    }

    #[tokio::test]
    async fn shutdown_removes_the_discovery_record() {
        let (_dir, paths) = temp_paths();
        let mut config = LuteboxConfig::default();
        config.port = 0;

        let (supervisor, _listener) = BackendSupervisor::start(paths.clone(), &config).await.unwrap();
        supervisor.shutdown();
        assert!(registry::read(&paths).unwrap().is_none());
    }

    #[test]
    fn sweep_removes_a_record_with_dead_pid_even_if_recent() {
        let (_dir, paths) = temp_paths();
        registry::publish(&paths, "127.0.0.1", 7737, i32::MAX as u32).unwrap();
        sweep_stale_record(&paths).unwrap();
        assert!(registry::read(&paths).unwrap().is_none());
    }

    #[test]
    fn sweep_keeps_a_fresh_record_with_a_live_pid() {
        let (_dir, paths) = temp_paths();
        registry::publish(&paths, "127.0.0.1", 7737, std::process::id()).unwrap();
        sweep_stale_record(&paths).unwrap();
        assert!(registry::read(&paths).unwrap().is_some());
    }
}
