// crates/switchboard-gateway/src/settings.rs
// ============================================================================
// Module: Gateway Settings
// Description: Runtime tunables for the gateway with spec defaults.
// Purpose: Keep every deadline and limit in one value tests can compress.
// Dependencies: switchboard-core
// ============================================================================

//! ## Overview
//! Runtime settings are separate from the persisted configuration documents:
//! they are operational tunables (deadlines, limits, the reserved admin
//! prefix) supplied by the CLI, not administrative state. Defaults follow the
//! gateway's external contract; tests shrink the timeouts to keep slow-path
//! coverage fast.

use std::time::Duration;

use switchboard_core::DEFAULT_ADMIN_PREFIX;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default deadline for a single downstream call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);
/// Default deadline for a downstream initialize handshake.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default time-to-live for catalog entries.
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(300);
/// Default grace period before children are force-terminated.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
/// Default capacity of the outbound write queue.
pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 1024;
/// Default stall deadline after which a full write queue is fatal.
pub const DEFAULT_WRITE_STALL_TIMEOUT: Duration = Duration::from_secs(30);
/// Maximum accepted length of one inbound JSON line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Runtime tunables for one gateway process.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Reserved prefix for built-in tool names.
    pub admin_prefix: String,
    /// Deadline for a single downstream call.
    pub call_timeout: Duration,
    /// Deadline for a downstream initialize handshake.
    pub init_timeout: Duration,
    /// Time-to-live for catalog entries.
    pub catalog_ttl: Duration,
    /// Grace period before children are force-terminated.
    pub shutdown_grace: Duration,
    /// Capacity of the outbound write queue.
    pub write_queue_capacity: usize,
    /// Stall deadline after which a full write queue is fatal.
    pub write_stall_timeout: Duration,
    /// Maximum accepted length of one inbound JSON line.
    pub max_line_bytes: usize,
    /// Server name reported by `initialize`.
    pub server_name: String,
    /// Server version reported by `initialize`.
    pub server_version: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            admin_prefix: DEFAULT_ADMIN_PREFIX.to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            catalog_ttl: DEFAULT_CATALOG_TTL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
            write_stall_timeout: DEFAULT_WRITE_STALL_TIMEOUT,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            server_name: "switchboard".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
