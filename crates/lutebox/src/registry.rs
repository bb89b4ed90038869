//! `SingleInstanceRegistry`: publish/read/validate the
//! `DiscoveryRecord` that coordinates all StdioProxy/BackendSupervisor
//! instances, plus the sibling `.launching` exclusive-create lock.
//!
//! The atomic-rename publish follows the usual write-temp-then-rename shape
//! for crash-safe config/state file updates; liveness probing uses `nix`'s
//! documented `kill(pid, 0)` idiom since this crate's single supported
//! target OS is a desktop unix.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use lutebox_config::AppPaths;
use lutebox_proto::DiscoveryRecord;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to (de)serialize discovery record: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("discovery record verification failed after publish")]
    VerificationFailed,
    #[error("launch lock already held")]
    AlreadyLocked,
}

/// RAII handle for the `.launching` exclusive-create lock.
/// Deleting it is idempotent because `Drop` swallows a missing file.
pub struct LaunchLockGuard {
    path: std::path::PathBuf,
}

impl Drop for LaunchLockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Atomically publish a fresh `DiscoveryRecord`: write to a sibling temp
/// file, rename over the canonical path, then re-read and verify the
/// `instance` token round-trips.
pub fn publish(paths: &AppPaths, host: &str, port: u16, pid: u32) -> Result<String, RegistryError> {
    let canonical = paths.discovery_record_path();
    if let Some(parent) = canonical.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let instance = uuid::Uuid::new_v4().to_string();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();
    let record = DiscoveryRecord::new(host, port, pid, instance.clone(), timestamp);
    let body = serde_json::to_vec_pretty(&record)?;

    let dir = canonical.parent().unwrap_or_else(|| std::path::Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&body)?;
    tmp.flush()?;
    tmp.persist(canonical).map_err(|e| RegistryError::Io(e.error))?;

    match read(paths)? {
        Some(readback) if readback.instance == instance => Ok(instance),
        _ => Err(RegistryError::VerificationFailed),
    }
}

/// Parse the canonical discovery record file. A missing file is not an
/// error.
pub fn read(paths: &AppPaths) -> Result<Option<DiscoveryRecord>, RegistryError> {
    match std::fs::read(paths.discovery_record_path()) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// `read`, but a record whose pid is not alive is treated as stale: it is
/// deleted and `None` is returned, so callers never act on a dead backend's
/// coordinates.
pub fn read_live(paths: &AppPaths) -> Result<Option<DiscoveryRecord>, RegistryError> {
    match read(paths)? {
        Some(record) if is_alive(record.pid) => Ok(Some(record)),
        Some(_stale) => {
            remove(paths)?;
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Idempotent deletion of the canonical discovery record file.
pub fn remove(paths: &AppPaths) -> Result<(), RegistryError> {
    match std::fs::remove_file(paths.discovery_record_path()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Process-existence probe distinguishing "no such process" (false; caller
/// may delete a stale record) from "exists but not ours" (true; the record
/// remains authoritative)
pub fn is_alive(pid: u32) -> bool {
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(_) => true,
    }
}

/// Exclusive-create the `.launching` sibling file. Failure means another
/// proxy is already launching the backend.
pub fn acquire_launch_lock(paths: &AppPaths) -> Result<LaunchLockGuard, RegistryError> {
    let path = paths.launch_lock_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(_) => Ok(LaunchLockGuard { path }),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(RegistryError::AlreadyLocked),
        Err(e) => Err(e.into()),
    }
}

/// Whether the `.launching` lock is currently held by someone - used by the
/// wait loop to detect that the launching proxy has disappeared.
pub fn launch_lock_exists(paths: &AppPaths) -> bool {
    paths.launch_lock_path().exists()
}
