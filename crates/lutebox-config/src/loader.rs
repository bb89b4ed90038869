//! Config file discovery, TOML parsing, and environment variable overlay.

use crate::{ConfigError, LuteboxConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Where config values came from, for diagnostics (`--show-config`).
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub files: Vec<PathBuf>,
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations, in load order. Only returns
/// files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Same as [`discover_config_files`], but a CLI-supplied path takes
/// precedence over the local `./lutebox.toml` override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/lutebox/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("lutebox/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("lutebox.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

pub fn load_from_file(path: &Path) -> Result<LuteboxConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_toml(&contents, path)
}

fn parse_toml(contents: &str, path: &Path) -> Result<LuteboxConfig, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut config = LuteboxConfig::default();

    if let Some(v) = table.get("port").and_then(|v| v.as_integer()) {
        config.port = v as u16;
    }
    if let Some(v) = table.get("poll_interval_ms").and_then(|v| v.as_integer()) {
        config.poll_interval_ms = v as u64;
    }
    if let Some(v) = table.get("discovery_timeout_ms").and_then(|v| v.as_integer()) {
        config.discovery_timeout_ms = v as u64;
    }
    if let Some(v) = table
        .get("http_roundtrip_timeout_ms")
        .and_then(|v| v.as_integer())
    {
        config.http_roundtrip_timeout_ms = v as u64;
    }
    if let Some(v) = table.get("server_name").and_then(|v| v.as_str()) {
        config.server_name = v.to_string();
    }
    if let Some(v) = table.get("server_version").and_then(|v| v.as_str()) {
        config.server_version = v.to_string();
    }
    if let Some(v) = table.get("temp_dir_override").and_then(|v| v.as_str()) {
        config.temp_dir_override = Some(expand_path(v));
    }

    Ok(config)
}

/// Merge two configs field by field, with `overlay` winning wherever it
/// differs from the compiled default (so a file that sets only `port` does
/// not clobber values a previous, lower-priority file already set).
pub fn merge_configs(base: LuteboxConfig, overlay: LuteboxConfig) -> LuteboxConfig {
    let defaults = LuteboxConfig::default();
    LuteboxConfig {
        port: if overlay.port != defaults.port { overlay.port } else { base.port },
        poll_interval_ms: if overlay.poll_interval_ms != defaults.poll_interval_ms {
            overlay.poll_interval_ms
        } else {
            base.poll_interval_ms
        },
        discovery_timeout_ms: if overlay.discovery_timeout_ms != defaults.discovery_timeout_ms {
            overlay.discovery_timeout_ms
        } else {
            base.discovery_timeout_ms
        },
        http_roundtrip_timeout_ms: if overlay.http_roundtrip_timeout_ms
            != defaults.http_roundtrip_timeout_ms
        {
            overlay.http_roundtrip_timeout_ms
        } else {
            base.http_roundtrip_timeout_ms
        },
        server_name: if overlay.server_name != defaults.server_name {
            overlay.server_name
        } else {
            base.server_name
        },
        server_version: if overlay.server_version != defaults.server_version {
            overlay.server_version
        } else {
            base.server_version
        },
        temp_dir_override: overlay.temp_dir_override.or(base.temp_dir_override),
    }
}

/// Apply `LUTEBOX_*` environment variable overrides.
pub fn apply_env_overrides(config: &mut LuteboxConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("LUTEBOX_PORT") {
        if let Ok(port) = v.parse() {
            config.port = port;
            sources.env_overrides.push("LUTEBOX_PORT".to_string());
        }
    }
    if let Ok(v) = env::var("LUTEBOX_POLL_INTERVAL_MS") {
        if let Ok(ms) = v.parse() {
            config.poll_interval_ms = ms;
            sources.env_overrides.push("LUTEBOX_POLL_INTERVAL_MS".to_string());
        }
    }
    if let Ok(v) = env::var("LUTEBOX_DISCOVERY_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.discovery_timeout_ms = ms;
            sources
                .env_overrides
                .push("LUTEBOX_DISCOVERY_TIMEOUT_MS".to_string());
        }
    }
    if let Ok(v) = env::var("LUTEBOX_HTTP_ROUNDTRIP_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.http_roundtrip_timeout_ms = ms;
            sources
                .env_overrides
                .push("LUTEBOX_HTTP_ROUNDTRIP_TIMEOUT_MS".to_string());
        }
    }
    if let Ok(v) = env::var("LUTEBOX_SERVER_NAME") {
        config.server_name = v;
        sources.env_overrides.push("LUTEBOX_SERVER_NAME".to_string());
    }
    if let Ok(v) = env::var("LUTEBOX_TEMP_DIR") {
        config.temp_dir_override = Some(expand_path(&v));
        sources.env_overrides.push("LUTEBOX_TEMP_DIR".to_string());
    }
    // RUST_LOG is read directly by tracing-subscriber's EnvFilter at startup,
    // not mirrored into LuteboxConfig.
}

/// Expand a leading `~/` or `$VAR/...` in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
        return PathBuf::from(path);
    }
    if let Some(stripped) = path.strip_prefix('$') {
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                return PathBuf::from(var_value).join(&stripped[slash_pos + 1..]);
            }
            return PathBuf::from(path);
        }
        return env::var(stripped)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(path));
    }
    PathBuf::from(path)
}
