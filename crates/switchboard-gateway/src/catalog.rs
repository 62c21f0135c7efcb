// crates/switchboard-gateway/src/catalog.rs
// ============================================================================
// Module: Tool Catalog Cache
// Description: Cached, namespaced union of downstream tool lists.
// Purpose: Keep last-known tools per downstream with TTL and coalescing.
// Dependencies: switchboard-core
// ============================================================================

//! ## Overview
//! The catalog caches one entry per downstream: its namespaced tool
//! descriptors, when they were fetched, and a status. A failed refresh keeps
//! the previous tools and marks the entry `STALE` so transient downstream
//! trouble never erases the last-known catalog. At most one refresh per
//! downstream is in flight; concurrent refresh requests coalesce.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use switchboard_core::ToolDescriptor;
use switchboard_core::derive_namespace;
use switchboard_core::namespaced_tool_name;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Catalog entry status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogStatus {
    /// The last discovery succeeded and the entry is within its TTL.
    Ok,
    /// Discovery has never succeeded for this downstream.
    Failed,
    /// The entry is invalidated or its last refresh failed.
    Stale,
}

impl CatalogStatus {
    /// Returns the uppercase status label used by `servers_list`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Failed => "FAILED",
            Self::Stale => "STALE",
        }
    }
}

/// Last-known catalog state for one downstream.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Namespaced tool descriptors from the last successful discovery.
    pub tools: Vec<ToolDescriptor>,
    /// When the entry was last successfully fetched.
    pub fetched_at: Instant,
    /// Entry status.
    pub status: CatalogStatus,
    /// Failure reason recorded by the last failed refresh.
    pub failure: Option<String>,
}

/// Cache of per-downstream catalog entries.
#[derive(Debug)]
pub struct ToolCatalog {
    /// Time-to-live before an entry is considered stale.
    ttl: Duration,
    /// Entries keyed by administrative server name.
    entries: Mutex<HashMap<String, CatalogEntry>>,
    /// Downstreams with a refresh currently in flight.
    refreshing: Mutex<HashSet<String>>,
}

impl ToolCatalog {
    /// Creates an empty catalog with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            refreshing: Mutex::new(HashSet::new()),
        }
    }

    // ========================================================================
    // SECTION: Reads
    // ========================================================================

    /// Returns every cached tool descriptor, flattened across downstreams.
    #[must_use]
    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.entries.lock().map_or_else(
            |_| Vec::new(),
            |entries| entries.values().flat_map(|entry| entry.tools.iter().cloned()).collect(),
        )
    }

    /// Returns the total count of cached tools.
    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.entries
            .lock()
            .map_or(0, |entries| entries.values().map(|entry| entry.tools.len()).sum())
    }

    /// Returns the status of one downstream's entry, if present.
    #[must_use]
    pub fn status_of(&self, server_name: &str) -> Option<CatalogStatus> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(server_name).map(|entry| entry.status))
    }

    /// Returns true when any of the given downstreams needs a refresh.
    ///
    /// A downstream needs a refresh when it has no entry, its entry is past
    /// the TTL, or its last refresh left it `STALE`/`FAILED`.
    #[must_use]
    pub fn needs_refresh(&self, server_names: &[String]) -> bool {
        let Ok(entries) = self.entries.lock() else {
            return false;
        };
        server_names.iter().any(|name| {
            entries.get(name).is_none_or(|entry| {
                entry.status != CatalogStatus::Ok || entry.fetched_at.elapsed() >= self.ttl
            })
        })
    }

    // ========================================================================
    // SECTION: Updates
    // ========================================================================

    /// Replaces a downstream's entry after a successful discovery.
    ///
    /// Tool names are namespaced and descriptions prefixed with the server
    /// name here, so the cache only ever holds exposed descriptors. Returns
    /// the number of tools cached.
    pub fn apply_success(&self, server_name: &str, tools: Vec<ToolDescriptor>) -> usize {
        let namespace = derive_namespace(server_name);
        let tools: Vec<ToolDescriptor> = tools
            .into_iter()
            .map(|tool| ToolDescriptor {
                name: namespaced_tool_name(&namespace, &tool.name),
                description: format!("[{server_name}] {}", tool.description),
                parameters: tool.parameters,
            })
            .collect();
        let count = tools.len();
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                server_name.to_string(),
                CatalogEntry {
                    tools,
                    fetched_at: Instant::now(),
                    status: CatalogStatus::Ok,
                    failure: None,
                },
            );
        }
        count
    }

    /// Records a failed discovery, keeping the previous tools when present.
    pub fn apply_failure(&self, server_name: &str, reason: String) {
        if let Ok(mut entries) = self.entries.lock() {
            match entries.get_mut(server_name) {
                Some(entry) => {
                    entry.status = CatalogStatus::Stale;
                    entry.failure = Some(reason);
                }
                None => {
                    entries.insert(
                        server_name.to_string(),
                        CatalogEntry {
                            tools: Vec::new(),
                            fetched_at: Instant::now(),
                            status: CatalogStatus::Failed,
                            failure: Some(reason),
                        },
                    );
                }
            }
        }
    }

    /// Marks every entry stale without dropping its tools.
    pub fn invalidate_all(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            for entry in entries.values_mut() {
                entry.status = CatalogStatus::Stale;
            }
        }
    }

    /// Removes a downstream's entry entirely.
    pub fn remove(&self, server_name: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(server_name);
        }
    }

    // ========================================================================
    // SECTION: Refresh Coalescing
    // ========================================================================

    /// Claims the refresh slot for a downstream.
    ///
    /// Returns false when a refresh is already in flight; callers skip the
    /// downstream and the in-flight refresh's result stands.
    pub fn begin_refresh(&self, server_name: &str) -> bool {
        self.refreshing
            .lock()
            .map_or(false, |mut refreshing| refreshing.insert(server_name.to_string()))
    }

    /// Releases the refresh slot for a downstream.
    pub fn finish_refresh(&self, server_name: &str) {
        if let Ok(mut refreshing) = self.refreshing.lock() {
            refreshing.remove(server_name);
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
