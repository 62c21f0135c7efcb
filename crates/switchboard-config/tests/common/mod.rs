// crates/switchboard-config/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fixtures for configuration store tests.
// Purpose: Build temporary config directories with known documents.
// Dependencies: switchboard-config, tempfile
// ============================================================================

//! ## Overview
//! Helpers for writing `servers.json` / `mcp-config.json` fixtures into a
//! temporary directory and opening a [`ConfigStore`] over them.

#![allow(
    dead_code,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Shared test helpers may be unused and assert freely."
)]

use std::fs;
use std::path::Path;

use switchboard_config::ConfigStore;
use switchboard_config::ServerRecord;
use tempfile::TempDir;

/// Creates a temporary directory and a store over its default file names.
#[must_use]
pub fn temp_store() -> (TempDir, ConfigStore) {
    let dir = TempDir::new().expect("temp dir");
    let store =
        ConfigStore::new(dir.path().join("servers.json"), dir.path().join("mcp-config.json"));
    (dir, store)
}

/// Writes raw bytes as the servers document inside the directory.
pub fn write_servers(dir: &Path, content: &str) {
    fs::write(dir.join("servers.json"), content).expect("write servers.json");
}

/// Writes raw bytes as the launch document inside the directory.
pub fn write_launch(dir: &Path, content: &str) {
    fs::write(dir.join("mcp-config.json"), content).expect("write mcp-config.json");
}

/// Builds a server record with the given name and enablement.
#[must_use]
pub fn record(name: &str, url: &str, enabled: bool) -> ServerRecord {
    ServerRecord {
        name: name.to_string(),
        url: url.to_string(),
        enabled,
    }
}
