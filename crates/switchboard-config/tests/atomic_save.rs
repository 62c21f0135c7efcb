// crates/switchboard-config/tests/atomic_save.rs
// ============================================================================
// Module: Atomic Save Tests
// Description: Tests for crash-atomic server list persistence.
// Purpose: Validate write-to-temp-then-rename behavior and round-trips.
// Dependencies: switchboard-config, tempfile, serde_json
// ============================================================================

//! ## Overview
//! Saves must never leave a torn document: the list is written to `*.tmp`
//! and renamed over the original, and a saved list loads back identically.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

mod common;

use std::fs;

use switchboard_config::ServerList;

use crate::common::record;
use crate::common::temp_store;
use crate::common::write_servers;

#[test]
fn save_round_trips_through_load() {
    let (_dir, store) = temp_store();
    let list = ServerList {
        tool_cap: 3,
        servers: vec![
            record("Foo Bar", "http://localhost:9000/", true),
            record("local", "stdio", false),
        ],
    };
    store.save_server_list(&list).expect("save");
    let loaded = store.load_server_list().expect("load");
    assert_eq!(loaded, list);
}

#[test]
fn save_replaces_existing_document() {
    let (dir, store) = temp_store();
    write_servers(dir.path(), r#"{"toolCap": 1, "servers": []}"#);
    let list = ServerList {
        tool_cap: 7,
        servers: Vec::new(),
    };
    store.save_server_list(&list).expect("save");
    let loaded = store.load_server_list().expect("load");
    assert_eq!(loaded.tool_cap, 7);
}

#[test]
fn save_leaves_no_temp_file_behind() {
    let (dir, store) = temp_store();
    store.save_server_list(&ServerList::default()).expect("save");
    assert!(dir.path().join("servers.json").exists());
    assert!(!dir.path().join("servers.json.tmp").exists());
}

#[test]
fn saved_document_uses_external_field_names() {
    let (dir, store) = temp_store();
    let list = ServerList {
        tool_cap: 2,
        servers: vec![record("a", "http://localhost:1/", true)],
    };
    store.save_server_list(&list).expect("save");
    let raw = fs::read_to_string(dir.path().join("servers.json")).expect("read");
    assert!(raw.contains("\"toolCap\""));
    assert!(raw.contains("\"servers\""));
    assert!(!raw.contains("tool_cap"));
}
