//! Layered TOML + environment configuration and per-user path resolution for
//! the lutebox bridge, scoped to a single bridge process rather than a whole
//! service mesh.
//!
//! Config file locations, later wins:
//! 1. compiled defaults
//! 2. `/etc/lutebox/config.toml` (system)
//! 3. `<user-config-dir>/lutebox/config.toml`
//! 4. `./lutebox.toml`, or a path passed on the CLI
//! 5. `LUTEBOX_*` environment variables

pub mod loader;
pub mod paths;

pub use loader::ConfigSources;
pub use paths::AppPaths;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// The chosen default loopback port.
pub const DEFAULT_PORT: u16 = 7737;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
pub const DEFAULT_DISCOVERY_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_HTTP_ROUNDTRIP_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SERVER_NAME: &str = "lutebox";
pub const DEFAULT_SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// The bridge's runtime configuration. Every field has a compiled default, so
/// the process starts with no config file present at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LuteboxConfig {
    /// Loopback port the HttpListener binds to. 0 requests kernel allocation.
    pub port: u16,
    /// StdioProxy discovery poll interval in milliseconds (D in ).
    pub poll_interval_ms: u64,
    /// StdioProxy discovery/launch-lock timeout in milliseconds (T in ).
    pub discovery_timeout_ms: u64,
    /// Soft timeout for each proxied HTTP round trip.
    pub http_roundtrip_timeout_ms: u64,
    /// Reported in `initialize`'s `serverInfo.name`.
    pub server_name: String,
    /// Reported in `initialize`'s `serverInfo.version`.
    pub server_version: String,
    /// Overrides the OS temp dir as the root for PNG artifacts and the
    /// process-owned temp subdirectory. Rarely needed outside tests.
    pub temp_dir_override: Option<PathBuf>,
}

impl Default for LuteboxConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            discovery_timeout_ms: DEFAULT_DISCOVERY_TIMEOUT_MS,
            http_roundtrip_timeout_ms: DEFAULT_HTTP_ROUNDTRIP_TIMEOUT_MS,
            server_name: DEFAULT_SERVER_NAME.to_string(),
            server_version: DEFAULT_SERVER_VERSION.to_string(),
            temp_dir_override: None,
        }
    }
}

impl LuteboxConfig {
    /// Load configuration from all sources, with no CLI override path.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, honoring an optional `--config` path.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files/env vars contributed.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = LuteboxConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let overlay = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, overlay);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_chosen_port() {
        let config = LuteboxConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.discovery_timeout_ms, 15_000);
    }

    #[test]
    fn load_with_no_files_returns_defaults() {
        let config = LuteboxConfig::load().unwrap();
        assert_eq!(config.server_name, "lutebox");
    }
}
