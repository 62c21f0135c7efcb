// crates/switchboard-gateway/src/router/tests.rs
// ============================================================================
// Module: Tool Call Router Tests
// Description: Unit tests for tool name resolution and dispatch.
// Purpose: Validate built-in dispatch, unknown tools, and error mapping.
// Dependencies: switchboard-gateway, tempfile, serde_json
// ============================================================================

//! ## Overview
//! Routes calls against a gateway with no live downstreams: built-ins under
//! the reserved prefix dispatch to the admin tools, unresolvable names are
//! method-not-found, and unreachable downstreams surface as internal-error
//! relays carrying the server name.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use switchboard_config::ConfigStore;
use switchboard_config::LaunchConfig;
use switchboard_config::LoadedConfig;
use switchboard_config::ServerList;
use switchboard_config::ServerRecord;
use switchboard_core::rpc;
use tempfile::TempDir;

use crate::audit::NoopAuditSink;
use crate::gateway::Gateway;
use crate::settings::GatewaySettings;

/// Builds a gateway with the given records over a temp directory.
fn gateway_with(servers: Vec<ServerRecord>) -> (TempDir, Arc<Gateway>) {
    let dir = TempDir::new().expect("temp dir");
    let store =
        ConfigStore::new(dir.path().join("servers.json"), dir.path().join("mcp-config.json"));
    let loaded = LoadedConfig {
        server_list: ServerList {
            tool_cap: 60,
            servers,
        },
        launch: LaunchConfig::default(),
        issues: Vec::new(),
    };
    let settings = GatewaySettings {
        call_timeout: Duration::from_millis(300),
        init_timeout: Duration::from_millis(300),
        ..GatewaySettings::default()
    };
    let gateway = Gateway::new(settings, store, loaded, Arc::new(NoopAuditSink));
    (dir, gateway)
}

/// Builds a record pointing at a closed local port.
fn record(name: &str, enabled: bool) -> ServerRecord {
    ServerRecord {
        name: name.to_string(),
        url: "http://127.0.0.1:9/".to_string(),
        enabled,
    }
}

// ============================================================================
// SECTION: Parameter Validation
// ============================================================================

#[tokio::test]
async fn missing_tool_name_is_invalid_params() {
    let (_dir, gateway) = gateway_with(Vec::new());
    let routed = gateway.handle_tools_call(json!(1), json!({"parameters": {}})).await;
    let error = routed.response.error.expect("error");
    assert_eq!(error.code, rpc::INVALID_PARAMS);
    assert!(routed.tool.is_none());
}

// ============================================================================
// SECTION: Built-in Dispatch
// ============================================================================

#[tokio::test]
async fn admin_prefixed_names_dispatch_to_builtins() {
    let (_dir, gateway) = gateway_with(vec![record("a", false)]);
    let routed = gateway
        .handle_tools_call(json!(1), json!({"name": "admin_servers_list", "parameters": {}}))
        .await;
    let result = routed.response.result.expect("servers_list result");
    assert_eq!(result["enabledCount"], json!(0));
    assert_eq!(routed.tool.as_deref(), Some("admin_servers_list"));
}

#[tokio::test]
async fn admin_constraint_violations_map_to_invalid_params() {
    let (_dir, gateway) = gateway_with(Vec::new());
    let routed = gateway
        .handle_tools_call(
            json!(2),
            json!({"name": "admin_servers_enable", "parameters": {"name": "ghost"}}),
        )
        .await;
    let error = routed.response.error.expect("error");
    assert_eq!(error.code, rpc::INVALID_PARAMS);
    assert!(error.message.contains("unknown server"));
}

// ============================================================================
// SECTION: Downstream Resolution
// ============================================================================

#[tokio::test]
async fn unresolvable_names_are_method_not_found() {
    let (_dir, gateway) = gateway_with(vec![record("alpha", true)]);
    let routed =
        gateway.handle_tools_call(json!(3), json!({"name": "nope_x", "parameters": {}})).await;
    let error = routed.response.error.expect("error");
    assert_eq!(error.code, rpc::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn disabled_namespaces_do_not_resolve() {
    let (_dir, gateway) = gateway_with(vec![record("alpha", false)]);
    let routed =
        gateway.handle_tools_call(json!(4), json!({"name": "alpha_x", "parameters": {}})).await;
    let error = routed.response.error.expect("error");
    assert_eq!(error.code, rpc::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn unreachable_downstream_is_internal_error_with_name() {
    let (_dir, gateway) = gateway_with(vec![record("alpha", true)]);
    let routed =
        gateway.handle_tools_call(json!(5), json!({"name": "alpha_ping", "parameters": {}})).await;
    let error = routed.response.error.expect("error");
    assert_eq!(error.code, rpc::INTERNAL_ERROR);
    assert!(error.message.contains("alpha"), "message must embed the downstream name");
}

#[tokio::test]
async fn namespace_boundary_requires_underscore() {
    let (_dir, gateway) = gateway_with(vec![record("foo", true)]);
    let routed =
        gateway.handle_tools_call(json!(6), json!({"name": "foobar_x", "parameters": {}})).await;
    let error = routed.response.error.expect("error");
    assert_eq!(error.code, rpc::METHOD_NOT_FOUND);
}
