// crates/switchboard-config/src/lib.rs
// ============================================================================
// Module: Switchboard Configuration
// Description: Configuration documents and persistence for the gateway.
// Purpose: Load, validate, and atomically save the two gateway documents.
// Dependencies: serde, serde_json, switchboard-core
// ============================================================================

//! ## Overview
//! The gateway is driven by two JSON documents: `servers.json` (the
//! administrative server list with the tool cap) and `mcp-config.json` (launch
//! descriptors for child-process downstreams). This crate owns their shapes,
//! the strict fail-closed loading rules, load-time validation, and the
//! crash-atomic save path used by the admin tools. Configuration inputs are
//! untrusted; loads are size- and UTF-8-limited and parsing is strict.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigIssue;
pub use config::DEFAULT_TOOL_CAP;
pub use config::LaunchConfig;
pub use config::LaunchDescriptor;
pub use config::ServerList;
pub use config::ServerRecord;
pub use config::validate;
pub use store::ConfigError;
pub use store::ConfigStore;
pub use store::LoadedConfig;
