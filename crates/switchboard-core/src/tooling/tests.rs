// crates/switchboard-core/src/tooling/tests.rs
// ============================================================================
// Module: Tooling Identifier Tests
// Description: Unit tests for built-in tool names and descriptors.
// Purpose: Validate name round-trips and descriptor schemas.
// Dependencies: switchboard-core, serde_json
// ============================================================================

//! ## Overview
//! Covers built-in tool name parsing (bare and prefixed), canonical ordering,
//! and the declared parameter schemas for the admin tool set.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use serde_json::json;

use super::AdminTool;
use super::ToolDescriptor;
use super::admin_tool_definitions;

// ============================================================================
// SECTION: Name Round-Trips
// ============================================================================

#[test]
fn bare_names_round_trip() {
    for tool in AdminTool::all() {
        assert_eq!(AdminTool::parse(tool.as_str()), Some(*tool));
    }
    assert_eq!(AdminTool::parse("servers_reboot"), None);
}

#[test]
fn namespaced_names_round_trip() {
    for tool in AdminTool::all() {
        let exposed = tool.namespaced("admin");
        assert_eq!(AdminTool::parse_namespaced("admin", &exposed), Some(*tool));
    }
}

#[test]
fn namespaced_parse_rejects_foreign_prefix() {
    assert_eq!(AdminTool::parse_namespaced("admin", "mcp0_servers_list"), None);
    assert_eq!(AdminTool::parse_namespaced("admin", "adminservers_list"), None);
    assert_eq!(AdminTool::parse_namespaced("admin", "admin_"), None);
}

// ============================================================================
// SECTION: Descriptors
// ============================================================================

#[test]
fn definitions_cover_every_tool_in_order() {
    let definitions = admin_tool_definitions("admin");
    let names: Vec<&str> = definitions.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["admin_servers_list", "admin_servers_enable", "admin_servers_disable", "admin_refresh_tools"]
    );
}

#[test]
fn enable_schema_requires_name() {
    let definitions = admin_tool_definitions("admin");
    let enable = definitions
        .iter()
        .find(|tool| tool.name == "admin_servers_enable")
        .expect("enable definition");
    assert_eq!(enable.parameters["required"], json!(["name"]));
    assert_eq!(enable.parameters["properties"]["name"]["type"], json!("string"));
}

#[test]
fn descriptor_defaults_fill_missing_fields() {
    let descriptor: ToolDescriptor = serde_json::from_value(json!({"name": "ping"})).expect("parse");
    assert_eq!(descriptor.name, "ping");
    assert_eq!(descriptor.description, "");
    assert_eq!(descriptor.parameters, json!({}));
}
