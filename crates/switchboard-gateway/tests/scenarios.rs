// crates/switchboard-gateway/tests/scenarios.rs
// ============================================================================
// Module: End-to-End Scenarios
// Description: Full client-to-downstream scenarios over the dispatcher.
// Purpose: Validate the gateway contract a client actually observes.
// Dependencies: switchboard-gateway, tiny_http, tokio, serde_json
// ============================================================================

//! ## Overview
//! Each test boots a complete gateway (config on disk, dispatcher on duplex
//! pipes) and speaks line-delimited JSON-RPC to it: cold start with an empty
//! configuration, enable-plus-namespaced-forward against a fake HTTP
//! downstream, tool-cap enforcement, catalog invalidation via
//! `admin_refresh_tools`, and unknown-tool resolution.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

mod common;

use serde_json::Value;
use serde_json::json;

use crate::common::Harness;
use crate::common::fast_settings;
use crate::common::spawn_http_mcp;

/// Extracts exposed tool names from a `tools/list` response.
fn tool_names(response: &Value) -> Vec<String> {
    response["result"]["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .filter_map(|tool| tool["name"].as_str().map(str::to_string))
        .collect()
}

// ============================================================================
// SECTION: Cold Start
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn cold_start_empty_config_exposes_admin_tools_only() {
    let servers = json!({"toolCap": 60, "servers": []});
    let mut harness = Harness::start(&servers, &json!({"mcpServers": {}}), fast_settings());

    let response = harness.request(1, "initialize", None).await;
    assert!(response["result"]["serverInfo"]["name"].is_string());
    assert_eq!(response["result"]["capabilities"]["tools"]["supported"], json!(true));

    let response = harness.request(2, "tools/list", None).await;
    assert_eq!(
        tool_names(&response),
        vec![
            "admin_servers_list",
            "admin_servers_enable",
            "admin_servers_disable",
            "admin_refresh_tools"
        ]
    );
    harness.finish().await.expect("clean shutdown");
}

// ============================================================================
// SECTION: Enable and Forward
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn enable_lists_and_forwards_namespaced_tool() {
    let fake = spawn_http_mcp(json!([{"name": "ping", "description": "", "parameters": {}}]));
    let servers = json!({
        "toolCap": 60,
        "servers": [{"name": "Foo Bar", "url": fake.url, "enabled": false}],
    });
    let mut harness = Harness::start(&servers, &json!({"mcpServers": {}}), fast_settings());

    harness.request(1, "initialize", None).await;
    let response =
        harness.call_tool(2, "admin_servers_enable", json!({"name": "Foo Bar"})).await;
    assert_eq!(response["result"]["success"], json!(true));

    let response = harness.request(3, "tools/list", None).await;
    let names = tool_names(&response);
    assert!(names.contains(&"foo_bar_ping".to_string()), "missing namespaced tool: {names:?}");
    let tools = response["result"]["tools"].as_array().expect("tools array");
    let ping = tools.iter().find(|tool| tool["name"] == json!("foo_bar_ping")).expect("ping");
    assert_eq!(ping["description"], json!("[Foo Bar] "));

    let response = harness.call_tool(4, "foo_bar_ping", json!({})).await;
    // The downstream reply is relayed verbatim.
    assert_eq!(
        response["result"]["echo"],
        json!({"name": "ping", "parameters": {}}),
        "unexpected relay: {response}"
    );
    let observed = fake.observed.lock().expect("observed lock");
    assert_eq!(observed.len(), 1);
    assert_eq!(observed[0]["name"], json!("ping"), "downstream must see the original name");
    assert_eq!(observed[0]["parameters"], json!({}));
    drop(observed);

    harness.finish().await.expect("clean shutdown");
}

// ============================================================================
// SECTION: Cap Enforcement
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn cap_blocks_enable_until_a_slot_frees_up() {
    let servers = json!({
        "toolCap": 1,
        "servers": [
            {"name": "A", "url": "http://127.0.0.1:9/", "enabled": false},
            {"name": "B", "url": "http://127.0.0.1:9/", "enabled": true},
        ],
    });
    let mut harness = Harness::start(&servers, &json!({"mcpServers": {}}), fast_settings());

    harness.request(1, "initialize", None).await;
    let response = harness.call_tool(2, "admin_servers_enable", json!({"name": "A"})).await;
    let error = &response["error"];
    assert_eq!(error["code"], json!(-32602));
    assert!(
        error["message"].as_str().expect("message").contains("tool limit"),
        "unexpected message: {error}"
    );

    let response = harness.call_tool(3, "admin_servers_disable", json!({"name": "B"})).await;
    assert_eq!(response["result"]["success"], json!(true));

    let response = harness.call_tool(4, "admin_servers_enable", json!({"name": "A"})).await;
    assert_eq!(response["result"]["success"], json!(true));

    harness.finish().await.expect("clean shutdown");
}

// ============================================================================
// SECTION: Refresh Invalidates the Cache
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn refresh_tools_invalidates_the_cached_catalog() {
    let fake = spawn_http_mcp(json!([{"name": "a", "description": "", "parameters": {}}]));
    let servers = json!({
        "toolCap": 60,
        "servers": [{"name": "swap", "url": fake.url, "enabled": true}],
    });
    let mut harness = Harness::start(&servers, &json!({"mcpServers": {}}), fast_settings());

    harness.request(1, "initialize", None).await;
    harness.wait_update_tools().await;

    let response = harness.request(2, "tools/list", None).await;
    assert!(tool_names(&response).contains(&"swap_a".to_string()));

    // Swap the downstream's behaviour; the cache must keep serving `a`.
    *fake.tools.lock().expect("tools lock") =
        json!([{"name": "b", "description": "", "parameters": {}}]);
    let response = harness.request(3, "tools/list", None).await;
    let names = tool_names(&response);
    assert!(names.contains(&"swap_a".to_string()), "cache must still serve a: {names:?}");
    assert!(!names.contains(&"swap_b".to_string()));

    harness.notifications.clear();
    let response = harness.call_tool(4, "admin_refresh_tools", json!({})).await;
    assert_eq!(response["result"]["success"], json!(true));
    assert_eq!(response["result"]["enabledServers"], json!(1));

    harness.wait_update_tools().await;

    let response = harness.request(5, "tools/list", None).await;
    let names = tool_names(&response);
    assert!(names.contains(&"swap_b".to_string()), "refresh must pick up b: {names:?}");
    assert!(!names.contains(&"swap_a".to_string()));
    assert_eq!(
        harness.collected_update_tools(),
        0,
        "exactly one update/tools may be emitted per completed refresh"
    );

    harness.finish().await.expect("clean shutdown");
}

// ============================================================================
// SECTION: Unknown Tools
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn unknown_tool_is_method_not_found() {
    let servers = json!({"toolCap": 60, "servers": []});
    let mut harness = Harness::start(&servers, &json!({"mcpServers": {}}), fast_settings());

    harness.request(1, "initialize", None).await;
    let response = harness.call_tool(2, "nope_x", json!({})).await;
    assert_eq!(response["error"]["code"], json!(-32601));

    harness.finish().await.expect("clean shutdown");
}

// ============================================================================
// SECTION: Idempotence
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn repeated_enable_and_disable_are_no_ops() {
    let servers = json!({
        "toolCap": 60,
        "servers": [{"name": "A", "url": "http://127.0.0.1:9/", "enabled": false}],
    });
    let mut harness = Harness::start(&servers, &json!({"mcpServers": {}}), fast_settings());

    harness.request(1, "initialize", None).await;
    harness.call_tool(2, "admin_servers_enable", json!({"name": "A"})).await;
    let response = harness.call_tool(3, "admin_servers_enable", json!({"name": "A"})).await;
    assert!(
        response["result"]["message"].as_str().expect("message").contains("already enabled")
    );

    harness.call_tool(4, "admin_servers_disable", json!({"name": "A"})).await;
    let response = harness.call_tool(5, "admin_servers_disable", json!({"name": "A"})).await;
    assert!(
        response["result"]["message"].as_str().expect("message").contains("already disabled")
    );

    harness.finish().await.expect("clean shutdown");
}
