// crates/switchboard-config/src/config.rs
// ============================================================================
// Module: Configuration Documents
// Description: Server list and launch descriptor document types.
// Purpose: Define the persisted shapes and their load-time validation.
// Dependencies: serde, switchboard-core
// ============================================================================

//! ## Overview
//! Document types for `servers.json` and `mcp-config.json`. The shapes are
//! part of the gateway's external interface and serialize with the exact
//! field names given there (`toolCap`, `mcpServers`). Validation never
//! rejects a parseable document outright: problems are reported as
//! [`ConfigIssue`]s so the gateway can keep running while an operator (or the
//! admin tools) repair the configuration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use switchboard_core::derive_namespace;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum number of concurrently enabled downstream servers.
pub const DEFAULT_TOOL_CAP: usize = 60;

// ============================================================================
// SECTION: Server List
// ============================================================================

/// Administrative entry for one downstream server.
///
/// # Invariants
/// - `name` is non-empty, unique, and case-sensitive within a server list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Administrative server name.
    pub name: String,
    /// Server URL; the scheme selects the transport adapter.
    pub url: String,
    /// Whether the server is currently enabled.
    #[serde(default)]
    pub enabled: bool,
}

impl ServerRecord {
    /// Returns true when the record targets the HTTP POST transport.
    #[must_use]
    pub fn is_http(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    /// Returns the namespace derived from the administrative name.
    #[must_use]
    pub fn namespace(&self) -> String {
        derive_namespace(&self.name)
    }
}

/// Persisted server list document (`servers.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerList {
    /// Maximum count of enabled servers.
    #[serde(rename = "toolCap", default = "default_tool_cap")]
    pub tool_cap: usize,
    /// Configured downstream servers.
    #[serde(default)]
    pub servers: Vec<ServerRecord>,
}

/// Serde default for the tool cap.
const fn default_tool_cap() -> usize {
    DEFAULT_TOOL_CAP
}

impl Default for ServerList {
    fn default() -> Self {
        Self {
            tool_cap: DEFAULT_TOOL_CAP,
            servers: Vec::new(),
        }
    }
}

impl ServerList {
    /// Finds a record by its case-sensitive administrative name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ServerRecord> {
        self.servers.iter().find(|record| record.name == name)
    }

    /// Finds a mutable record by its case-sensitive administrative name.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut ServerRecord> {
        self.servers.iter_mut().find(|record| record.name == name)
    }

    /// Returns the count of enabled records.
    #[must_use]
    pub fn enabled_count(&self) -> usize {
        self.servers.iter().filter(|record| record.enabled).count()
    }
}

// ============================================================================
// SECTION: Launch Descriptors
// ============================================================================

/// Launch descriptor for a child-process downstream.
///
/// # Invariants
/// - Read-only at runtime; the gateway never mutates launch descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchDescriptor {
    /// Program to spawn, absolute or PATH-resolvable.
    pub command: String,
    /// Ordered command-line arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Optional working directory for the child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Environment overlaid on the parent environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Persisted launch descriptor document (`mcp-config.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Launch descriptors keyed by administrative server name.
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: BTreeMap<String, LaunchDescriptor>,
}

impl LaunchConfig {
    /// Looks up the launch descriptor for a server name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LaunchDescriptor> {
        self.mcp_servers.get(name)
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Configuration problem found at load time.
///
/// Issues are diagnostics, not rejections: the documents stay usable so the
/// admin tools can repair them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    /// A record has an empty administrative name.
    #[error("server record at index {index} has an empty name")]
    EmptyName {
        /// Position of the record in the server list.
        index: usize,
    },
    /// Two records share an administrative name.
    #[error("duplicate server name {name:?}")]
    DuplicateName {
        /// The duplicated administrative name.
        name: String,
    },
    /// Two distinct names derive the same namespace.
    #[error("servers {first:?} and {second:?} collide on namespace {namespace:?}; {second:?} is unreachable")]
    NamespaceCollision {
        /// First-listed server holding the namespace.
        first: String,
        /// Later-listed server shadowed by the collision.
        second: String,
        /// The colliding namespace.
        namespace: String,
    },
    /// A namespace collides with the reserved admin prefix.
    #[error("server {name:?} derives the reserved namespace {prefix:?}")]
    ReservedNamespace {
        /// The offending administrative name.
        name: String,
        /// The reserved admin prefix.
        prefix: String,
    },
    /// More servers are enabled than the tool cap allows.
    #[error("{enabled} servers enabled but toolCap is {cap}")]
    EnabledAboveCap {
        /// Count of enabled records.
        enabled: usize,
        /// Configured tool cap.
        cap: usize,
    },
    /// An enabled child-process server has no launch descriptor.
    #[error("server {name:?} is not HTTP and has no launch descriptor in mcp-config.json")]
    MissingLaunchDescriptor {
        /// The administrative name without a descriptor.
        name: String,
    },
    /// A launch descriptor has an empty command.
    #[error("launch descriptor {name:?} has an empty command")]
    EmptyCommand {
        /// The descriptor's administrative name.
        name: String,
    },
    /// A document failed to load and was replaced with defaults.
    #[error("{file} failed to load, using defaults: {reason}")]
    LoadFailed {
        /// File the failure applies to.
        file: &'static str,
        /// Human-readable failure reason.
        reason: String,
    },
}

/// Validates the two documents against each other.
///
/// Returns every issue found; an empty vector means the configuration is
/// clean. Collisions report the later-listed record as unreachable, matching
/// the router's first-match resolution.
#[must_use]
pub fn validate(
    server_list: &ServerList,
    launch: &LaunchConfig,
    admin_prefix: &str,
) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();
    let mut seen_names: BTreeMap<&str, usize> = BTreeMap::new();
    let mut seen_namespaces: BTreeMap<String, &str> = BTreeMap::new();

    for (index, record) in server_list.servers.iter().enumerate() {
        if record.name.is_empty() {
            issues.push(ConfigIssue::EmptyName {
                index,
            });
            continue;
        }
        if seen_names.insert(record.name.as_str(), index).is_some() {
            issues.push(ConfigIssue::DuplicateName {
                name: record.name.clone(),
            });
            continue;
        }
        let namespace = record.namespace();
        if namespace == admin_prefix {
            issues.push(ConfigIssue::ReservedNamespace {
                name: record.name.clone(),
                prefix: admin_prefix.to_string(),
            });
        }
        if let Some(first) = seen_namespaces.get(&namespace) {
            issues.push(ConfigIssue::NamespaceCollision {
                first: (*first).to_string(),
                second: record.name.clone(),
                namespace,
            });
        } else {
            seen_namespaces.insert(namespace, record.name.as_str());
        }
        if !record.is_http() {
            match launch.get(&record.name) {
                Some(descriptor) if descriptor.command.is_empty() => {
                    issues.push(ConfigIssue::EmptyCommand {
                        name: record.name.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    issues.push(ConfigIssue::MissingLaunchDescriptor {
                        name: record.name.clone(),
                    });
                }
            }
        }
    }

    let enabled = server_list.enabled_count();
    if enabled > server_list.tool_cap {
        issues.push(ConfigIssue::EnabledAboveCap {
            enabled,
            cap: server_list.tool_cap,
        });
    }

    issues
}
