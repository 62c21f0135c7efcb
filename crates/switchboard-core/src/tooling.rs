// crates/switchboard-core/src/tooling.rs
// ============================================================================
// Module: Tooling Identifiers
// Description: Built-in tool identifiers and descriptors for Switchboard.
// Purpose: Shared tool naming across gateway, config, and tests.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Canonical identifiers for the gateway's built-in administrative tools and
//! the descriptor types used for the aggregated catalog. Built-in names are
//! exposed under a reserved prefix so they can never collide with a
//! downstream namespace; the prefix is a configuration constant.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

/// Default reserved prefix for built-in tool names.
pub const DEFAULT_ADMIN_PREFIX: &str = "admin";

// ============================================================================
// SECTION: Built-in Tool Names
// ============================================================================

/// Canonical built-in tool names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminTool {
    /// List configured downstream servers and the tool cap.
    ServersList,
    /// Enable a downstream server, subject to the tool cap.
    ServersEnable,
    /// Disable a downstream server and drain its session.
    ServersDisable,
    /// Invalidate the tool catalog and rediscover every downstream.
    RefreshTools,
}

impl AdminTool {
    /// Returns the bare tool name without the reserved prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServersList => "servers_list",
            Self::ServersEnable => "servers_enable",
            Self::ServersDisable => "servers_disable",
            Self::RefreshTools => "refresh_tools",
        }
    }

    /// Returns all built-in tools in canonical order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::ServersList, Self::ServersEnable, Self::ServersDisable, Self::RefreshTools]
    }

    /// Parses a bare tool name into a built-in identifier.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "servers_list" => Some(Self::ServersList),
            "servers_enable" => Some(Self::ServersEnable),
            "servers_disable" => Some(Self::ServersDisable),
            "refresh_tools" => Some(Self::RefreshTools),
            _ => None,
        }
    }

    /// Parses an exposed `<prefix>_<tool>` name into a built-in identifier.
    #[must_use]
    pub fn parse_namespaced(prefix: &str, name: &str) -> Option<Self> {
        let rest = name.strip_prefix(prefix)?;
        let rest = rest.strip_prefix('_')?;
        Self::parse(rest)
    }

    /// Returns the exposed name under the given reserved prefix.
    #[must_use]
    pub fn namespaced(self, prefix: &str) -> String {
        format!("{prefix}_{}", self.as_str())
    }
}

impl std::fmt::Display for AdminTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Tool Descriptors
// ============================================================================

/// Tool descriptor as exchanged on the wire.
///
/// # Invariants
/// - `parameters` is a JSON Schema object; downstream values are untrusted
///   and passed through without validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Exposed tool name.
    pub name: String,
    /// Tool description for clients.
    #[serde(default)]
    pub description: String,
    /// JSON schema for tool parameters.
    #[serde(default = "empty_schema")]
    pub parameters: Value,
}

/// Default schema for descriptors that omit `parameters`.
fn empty_schema() -> Value {
    json!({})
}

/// Builds the descriptors for every built-in tool under the given prefix.
#[must_use]
pub fn admin_tool_definitions(prefix: &str) -> Vec<ToolDescriptor> {
    AdminTool::all().iter().map(|tool| admin_tool_definition(prefix, *tool)).collect()
}

/// Builds the descriptor for one built-in tool under the given prefix.
#[must_use]
pub fn admin_tool_definition(prefix: &str, tool: AdminTool) -> ToolDescriptor {
    let (description, parameters) = match tool {
        AdminTool::ServersList => (
            "List configured downstream MCP servers, their status, and the tool cap.",
            json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false,
            }),
        ),
        AdminTool::ServersEnable => (
            "Enable a configured downstream MCP server by name, subject to the tool cap.",
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Administrative name of the server to enable.",
                    },
                },
                "required": ["name"],
                "additionalProperties": false,
            }),
        ),
        AdminTool::ServersDisable => (
            "Disable a configured downstream MCP server by name and drain its session.",
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Administrative name of the server to disable.",
                    },
                },
                "required": ["name"],
                "additionalProperties": false,
            }),
        ),
        AdminTool::RefreshTools => (
            "Invalidate the aggregated tool catalog and rediscover every enabled server.",
            json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false,
            }),
        ),
    };
    ToolDescriptor {
        name: tool.namespaced(prefix),
        description: description.to_string(),
        parameters,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
