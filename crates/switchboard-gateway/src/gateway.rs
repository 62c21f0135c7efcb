// crates/switchboard-gateway/src/gateway.rs
// ============================================================================
// Module: Gateway State
// Description: Process-wide gateway state and downstream orchestration.
// Purpose: Own records, sessions, and catalog behind one threaded value.
// Dependencies: switchboard-config, switchboard-core, tokio
// ============================================================================

//! ## Overview
//! `Gateway` is the single state value threaded through every component:
//! the persisted server records, the live session per enabled downstream,
//! the tool catalog, and the runtime settings. The dispatcher owns it and
//! hands references to tasks; there is no module-scope mutable state. Admin
//! mutations run inside one async critical section; the catalog is
//! read-mostly with atomic per-entry replacement.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::RwLock;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use switchboard_config::ConfigStore;
use switchboard_config::LaunchConfig;
use switchboard_config::LoadedConfig;
use switchboard_config::ServerList;
use switchboard_config::ServerRecord;
use switchboard_core::Notification;
use switchboard_core::ToolDescriptor;
use switchboard_core::admin_tool_definitions;
use tokio::sync::watch;
use tracing::warn;

use crate::audit::AuditSink;
use crate::audit::RequestAuditEvent;
use crate::catalog::CatalogStatus;
use crate::catalog::ToolCatalog;
use crate::outbound::OutboundSender;
use crate::session::Connector;
use crate::session::DownstreamSession;
use crate::session::SessionError;
use crate::session::SessionState;
use crate::settings::GatewaySettings;
use crate::transport::HttpEndpoint;

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Process-wide gateway state.
pub struct Gateway {
    /// Weak self-reference used to hand background tasks an owned handle.
    weak_self: Weak<Self>,
    /// Runtime tunables.
    settings: GatewaySettings,
    /// Disk store for the persisted documents.
    store: ConfigStore,
    /// Administrative server records and the tool cap.
    records: RwLock<ServerList>,
    /// Launch descriptors, read-only at runtime.
    launch: LaunchConfig,
    /// Live sessions keyed by administrative server name.
    sessions: RwLock<HashMap<String, Arc<DownstreamSession>>>,
    /// Cached, namespaced tool catalog.
    catalog: ToolCatalog,
    /// Admin critical section serializing admin tool invocations.
    admin_lock: tokio::sync::Mutex<()>,
    /// Latch for the first `initialize` side effect.
    initialized: AtomicBool,
    /// Client-bound writer, attached by the dispatcher at startup.
    outbound: OnceLock<OutboundSender>,
    /// Shutdown broadcast; `true` once shutdown begins.
    shutdown_tx: watch::Sender<bool>,
    /// Audit sink for request events.
    audit: Arc<dyn AuditSink>,
}

/// Downstream `tools/list` result payload.
#[derive(Debug, Deserialize)]
struct ToolListing {
    /// Tool descriptors returned by the downstream.
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

impl Gateway {
    /// Builds the gateway from loaded configuration.
    #[must_use]
    pub fn new(
        settings: GatewaySettings,
        store: ConfigStore,
        loaded: LoadedConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        let catalog = ToolCatalog::new(settings.catalog_ttl);
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            settings,
            store,
            records: RwLock::new(loaded.server_list),
            launch: loaded.launch,
            sessions: RwLock::new(HashMap::new()),
            catalog,
            admin_lock: tokio::sync::Mutex::new(()),
            initialized: AtomicBool::new(false),
            outbound: OnceLock::new(),
            shutdown_tx,
            audit,
        })
    }

    /// Returns an owned handle for spawning background work.
    pub(crate) fn arc(&self) -> Option<Arc<Self>> {
        self.weak_self.upgrade()
    }

    /// Returns the runtime settings.
    #[must_use]
    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Returns the disk store.
    #[must_use]
    pub(crate) fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Returns the catalog cache.
    #[must_use]
    pub(crate) fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Returns the admin critical section lock.
    pub(crate) fn admin_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.admin_lock
    }

    /// Runs a closure over the current server list.
    pub(crate) fn with_records<T>(&self, read: impl FnOnce(&ServerList) -> T) -> Option<T> {
        self.records.read().ok().map(|records| read(&records))
    }

    /// Runs a closure mutating the server list.
    pub(crate) fn with_records_mut<T>(
        &self,
        mutate: impl FnOnce(&mut ServerList) -> T,
    ) -> Option<T> {
        self.records.write().ok().map(|mut records| mutate(&mut records))
    }

    /// Returns a snapshot of the enabled records.
    #[must_use]
    pub(crate) fn enabled_records(&self) -> Vec<ServerRecord> {
        self.with_records(|records| {
            records.servers.iter().filter(|record| record.enabled).cloned().collect()
        })
        .unwrap_or_default()
    }

    // ========================================================================
    // SECTION: Outbound Wiring
    // ========================================================================

    /// Attaches the client-bound writer; later attaches are ignored.
    pub fn attach_outbound(&self, sender: OutboundSender) {
        let _ = self.outbound.set(sender);
    }

    /// Returns the client-bound writer when attached.
    #[must_use]
    pub(crate) fn outbound(&self) -> Option<&OutboundSender> {
        self.outbound.get()
    }

    /// Emits an `update/tools` notification with a summary message.
    pub(crate) fn notify_tools_updated(&self, message: String) {
        if let Some(outbound) = self.outbound.get()
            && let Ok(line) = serde_json::to_string(&Notification::update_tools(message))
        {
            outbound.try_send_raw(line);
        }
    }

    /// Records one request audit event.
    pub(crate) fn record_audit(&self, event: &RequestAuditEvent) {
        self.audit.record(event);
    }

    // ========================================================================
    // SECTION: Lifecycle
    // ========================================================================

    /// Returns the `initialize` result payload.
    #[must_use]
    pub fn initialize_result(&self) -> Value {
        json!({
            "serverInfo": {
                "name": self.settings.server_name,
                "version": self.settings.server_version,
            },
            "capabilities": {
                "tools": { "supported": true },
            },
        })
    }

    /// Latches the first `initialize`; returns true exactly once.
    pub fn mark_initialized(&self) -> bool {
        !self.initialized.swap(true, Ordering::SeqCst)
    }

    /// Begins gateway shutdown; idempotent.
    pub fn begin_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Returns true once shutdown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Returns a receiver resolving when shutdown begins.
    #[must_use]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Drains and closes every session under the configured grace period.
    pub async fn close_sessions(&self) {
        let sessions: Vec<Arc<DownstreamSession>> = self
            .sessions
            .write()
            .map_or_else(|_| Vec::new(), |mut sessions| sessions.drain().map(|(_, s)| s).collect());
        let grace = self.settings.shutdown_grace;
        let mut handles = Vec::with_capacity(sessions.len());
        for session in sessions {
            handles.push(tokio::spawn(async move { session.shutdown(grace).await }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    // ========================================================================
    // SECTION: Sessions
    // ========================================================================

    /// Returns the live session for a server, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the server is unknown or has no usable
    /// transport configuration.
    pub(crate) fn session_for_name(&self, name: &str) -> Result<Arc<DownstreamSession>, SessionError> {
        {
            let Ok(sessions) = self.sessions.read() else {
                return Err(unavailable(name, "session table unavailable"));
            };
            if let Some(session) = sessions.get(name) {
                return Ok(Arc::clone(session));
            }
        }
        let record = self
            .with_records(|records| records.find(name).cloned())
            .flatten()
            .ok_or_else(|| unavailable(name, "unknown server"))?;
        let connector = self.build_connector(&record)?;
        let session = DownstreamSession::new(&record.name, connector, self.outbound().cloned());
        let Ok(mut sessions) = self.sessions.write() else {
            return Err(unavailable(name, "session table unavailable"));
        };
        Ok(Arc::clone(sessions.entry(record.name).or_insert(session)))
    }

    /// Removes a session from the table, returning it for teardown.
    pub(crate) fn take_session(&self, name: &str) -> Option<Arc<DownstreamSession>> {
        self.sessions.write().ok().and_then(|mut sessions| sessions.remove(name))
    }

    /// Builds the connector for a record from its URL scheme.
    fn build_connector(&self, record: &ServerRecord) -> Result<Connector, SessionError> {
        if record.is_http() {
            let endpoint = HttpEndpoint::new(&record.name, &record.url)
                .map_err(|err| unavailable(&record.name, &err.to_string()))?;
            return Ok(Connector::Http(endpoint));
        }
        self.launch
            .get(&record.name)
            .cloned()
            .map(|descriptor| Connector::Child {
                descriptor,
            })
            .ok_or_else(|| unavailable(&record.name, "no launch descriptor"))
    }

    /// Returns the `servers_list` status label for a record.
    ///
    /// Disabled records report `disabled`; enabled ones report their session
    /// state, except that a `Ready` session whose last catalog refresh
    /// failed reports the catalog status so operators see `STALE` here.
    #[must_use]
    pub(crate) fn server_status(&self, record: &ServerRecord) -> &'static str {
        if !record.enabled {
            return "disabled";
        }
        let state = self
            .sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(&record.name).map(|session| session.state()));
        match state {
            Some(SessionState::Ready) => match self.catalog.status_of(&record.name) {
                Some(status) if status != CatalogStatus::Ok => status.as_str(),
                _ => SessionState::Ready.as_str(),
            },
            Some(state) => state.as_str(),
            None => SessionState::New.as_str(),
        }
    }

    // ========================================================================
    // SECTION: Catalog Discovery
    // ========================================================================

    /// Returns the exposed tool union: built-ins plus the cached catalog.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        let mut tools = admin_tool_definitions(&self.settings.admin_prefix);
        tools.extend(self.catalog.tools());
        tools
    }

    /// Returns true when any enabled downstream's entry needs a refresh.
    #[must_use]
    pub fn catalog_needs_refresh(&self) -> bool {
        let names: Vec<String> =
            self.enabled_records().into_iter().map(|record| record.name).collect();
        !names.is_empty() && self.catalog.needs_refresh(&names)
    }

    /// Fetches one downstream's raw tool list over its session.
    pub(crate) async fn discover_tools(
        &self,
        record: &ServerRecord,
    ) -> Result<Vec<ToolDescriptor>, SessionError> {
        let session = self.session_for_name(&record.name)?;
        session.ensure_ready(self.settings.init_timeout).await?;
        let reply = session.forward("tools/list", None, self.settings.call_timeout).await?;
        if let Some(error) = reply.error {
            return Err(unavailable(&record.name, &format!("tools/list failed: {}", error.message)));
        }
        let listing: ToolListing = serde_json::from_value(reply.result.unwrap_or(Value::Null))
            .map_err(|_| unavailable(&record.name, "invalid tools/list payload"))?;
        Ok(listing.tools)
    }

    /// Refreshes one downstream's catalog entry, coalescing duplicates.
    ///
    /// Returns true when this call performed the refresh.
    pub(crate) async fn refresh_server(&self, record: &ServerRecord) -> bool {
        if !self.catalog.begin_refresh(&record.name) {
            return false;
        }
        match self.discover_tools(record).await {
            Ok(tools) => {
                let count = self.catalog.apply_success(&record.name, tools);
                tracing::debug!(server = %record.name, tools = count, "catalog entry refreshed");
            }
            Err(err) => {
                warn!(server = %record.name, %err, "catalog refresh failed");
                self.catalog.apply_failure(&record.name, err.to_string());
            }
        }
        self.catalog.finish_refresh(&record.name);
        true
    }

    /// Runs fan-out discovery across every enabled downstream.
    ///
    /// Emits exactly one `update/tools` notification when at least one
    /// downstream was actually refreshed by this invocation.
    pub async fn refresh_catalog(&self) {
        let records = self.enabled_records();
        let enabled = records.len();
        let mut handles = Vec::with_capacity(records.len());
        for record in records {
            let Some(gateway) = self.arc() else {
                return;
            };
            handles.push(tokio::spawn(async move { gateway.refresh_server(&record).await }));
        }
        let mut refreshed = 0_usize;
        for handle in handles {
            if let Ok(true) = handle.await {
                refreshed += 1;
            }
        }
        if refreshed > 0 {
            let count = self.catalog.tool_count();
            self.notify_tools_updated(format!(
                "tool catalog refreshed: {count} tools from {enabled} servers"
            ));
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("settings", &self.settings)
            .field("initialized", &self.initialized.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Builds an unavailable-session error.
fn unavailable(name: &str, reason: &str) -> SessionError {
    SessionError::Unavailable {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
