//! Per-user path resolution for the discovery record, launch lock, and the
//! process-owned temp directory.

use std::path::PathBuf;

/// Resolved filesystem locations the rest of the bridge needs. Constructed
/// once at startup and threaded through the registry/backend/http modules.
#[derive(Debug, Clone)]
pub struct AppPaths {
    discovery_record: PathBuf,
    temp_dir: PathBuf,
}

impl AppPaths {
    /// Resolve paths against the real per-user application-support directory
    /// and OS temp directory.
    pub fn resolve(temp_dir_override: Option<&std::path::Path>) -> Self {
        let app_support = directories::ProjectDirs::from("", "", "lutebox")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".lutebox"));

        let temp_dir = temp_dir_override
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("lutebox"));

        Self {
            discovery_record: app_support.join("server.json"),
            temp_dir,
        }
    }

    /// Construct directly from already-resolved locations, for tests.
    pub fn from_parts(discovery_record: PathBuf, temp_dir: PathBuf) -> Self {
        Self {
            discovery_record,
            temp_dir,
        }
    }

    /// Canonical discovery record path: `<app-support>/lutebox/server.json`.
    pub fn discovery_record_path(&self) -> &std::path::Path {
        &self.discovery_record
    }

    /// Sibling launch-lock file: `<discovery record>.launching`.
    pub fn launch_lock_path(&self) -> PathBuf {
        let mut name = self
            .discovery_record
            .file_name()
            .unwrap_or_default()
            .to_os_string();
        name.push(".launching");
        self.discovery_record.with_file_name(name)
    }

    /// Sibling temp file used for the atomic write-temp+rename publish.
    pub fn discovery_record_tmp_path(&self) -> PathBuf {
        let mut name = self
            .discovery_record
            .file_name()
            .unwrap_or_default()
            .to_os_string();
        name.push(".tmp");
        self.discovery_record.with_file_name(name)
    }

    /// Process-owned root for PNG artifacts and other scratch files.
    pub fn temp_dir(&self) -> &std::path::Path {
        &self.temp_dir
    }
}
