// crates/switchboard-config/src/store.rs
// ============================================================================
// Module: Configuration Store
// Description: Disk persistence for the gateway configuration documents.
// Purpose: Strict limited loads, defaulted fallbacks, crash-atomic saves.
// Dependencies: serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! The store reads the two configuration documents with hard size and UTF-8
//! limits and writes the server list back crash-atomically (write `*.tmp`,
//! then rename over the original). A missing or unparseable document yields a
//! defaulted in-memory copy plus a [`ConfigIssue::LoadFailed`] diagnostic so
//! the gateway keeps running and the admin tools can rebuild the file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tracing::error;
use tracing::warn;

use crate::config::ConfigIssue;
use crate::config::LaunchConfig;
use crate::config::ServerList;
use crate::config::validate;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default filename for the server list document.
pub const DEFAULT_SERVERS_FILE: &str = "servers.json";
/// Default filename for the launch descriptor document.
pub const DEFAULT_LAUNCH_FILE: &str = "mcp-config.json";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration store errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Filesystem errors while reading or writing a document.
    #[error("config io error: {0}")]
    Io(String),
    /// JSON parse errors.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Documents that violate hard limits.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Disk-backed store for the two gateway documents.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    /// Path of the server list document.
    servers_path: PathBuf,
    /// Path of the launch descriptor document.
    launch_path: PathBuf,
}

/// Result of loading both documents with defaulted fallbacks.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Server list, defaulted when its document failed to load.
    pub server_list: ServerList,
    /// Launch descriptors, defaulted when their document failed to load.
    pub launch: LaunchConfig,
    /// Every problem found while loading and validating.
    pub issues: Vec<ConfigIssue>,
}

impl ConfigStore {
    /// Creates a store over the given document paths.
    #[must_use]
    pub fn new(servers_path: impl Into<PathBuf>, launch_path: impl Into<PathBuf>) -> Self {
        Self {
            servers_path: servers_path.into(),
            launch_path: launch_path.into(),
        }
    }

    /// Returns the path of the server list document.
    #[must_use]
    pub fn servers_path(&self) -> &Path {
        &self.servers_path
    }

    /// Loads the server list document strictly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is missing, unreadable, over the
    /// size limit, not UTF-8, or not valid JSON.
    pub fn load_server_list(&self) -> Result<ServerList, ConfigError> {
        read_document(&self.servers_path)
    }

    /// Loads the launch descriptor document strictly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] under the same conditions as
    /// [`Self::load_server_list`].
    pub fn load_launch_config(&self) -> Result<LaunchConfig, ConfigError> {
        read_document(&self.launch_path)
    }

    /// Loads both documents, substituting defaults for failed loads.
    ///
    /// A missing file is a normal first run and produces no issue; any other
    /// failure is logged and reported as [`ConfigIssue::LoadFailed`]. The
    /// returned documents are always usable.
    #[must_use]
    pub fn load_or_default(&self, admin_prefix: &str) -> LoadedConfig {
        let mut issues = Vec::new();

        let server_list = match self.load_server_list() {
            Ok(list) => list,
            Err(err) => {
                if !is_missing(&err) {
                    error!(path = %self.servers_path.display(), %err, "server list load failed");
                    issues.push(ConfigIssue::LoadFailed {
                        file: DEFAULT_SERVERS_FILE,
                        reason: err.to_string(),
                    });
                }
                ServerList::default()
            }
        };

        let launch = match self.load_launch_config() {
            Ok(launch) => launch,
            Err(err) => {
                if !is_missing(&err) {
                    error!(path = %self.launch_path.display(), %err, "launch config load failed");
                    issues.push(ConfigIssue::LoadFailed {
                        file: DEFAULT_LAUNCH_FILE,
                        reason: err.to_string(),
                    });
                }
                LaunchConfig::default()
            }
        };

        let validation = validate(&server_list, &launch, admin_prefix);
        for issue in &validation {
            warn!(%issue, "configuration issue");
        }
        issues.extend(validation);

        LoadedConfig {
            server_list,
            launch,
            issues,
        }
    }

    /// Saves the server list document crash-atomically.
    ///
    /// Writes `<path>.tmp` and renames it over the original so a crash never
    /// leaves a torn document behind.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when serialization or filesystem operations
    /// fail.
    pub fn save_server_list(&self, server_list: &ServerList) -> Result<(), ConfigError> {
        let payload = serde_json::to_vec_pretty(server_list)
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        let tmp_path = tmp_path_for(&self.servers_path);
        fs::write(&tmp_path, &payload).map_err(|err| ConfigError::Io(err.to_string()))?;
        fs::rename(&tmp_path, &self.servers_path).map_err(|err| {
            let _ = fs::remove_file(&tmp_path);
            ConfigError::Io(err.to_string())
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads one JSON document with the strict limits applied.
fn read_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let bytes = fs::read(path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            ConfigError::Io(format!("{}: not found", path.display()))
        } else {
            ConfigError::Io(format!("{}: {err}", path.display()))
        }
    })?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid(format!("{} exceeds size limit", path.display())));
    }
    let content = std::str::from_utf8(&bytes)
        .map_err(|_| ConfigError::Invalid(format!("{} must be utf-8", path.display())))?;
    serde_json::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
}

/// Returns true for load failures caused by a missing file.
fn is_missing(err: &ConfigError) -> bool {
    matches!(err, ConfigError::Io(reason) if reason.ends_with(": not found"))
}

/// Derives the temporary path used by the atomic save.
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
