// crates/switchboard-gateway/src/admin.rs
// ============================================================================
// Module: Admin Tools
// Description: Built-in server administration tools.
// Purpose: Enable, disable, list, and refresh downstreams under the cap.
// Dependencies: serde, serde_json, switchboard-config
// ============================================================================

//! ## Overview
//! The four built-in tools mutate the persisted server list under one async
//! critical section: the mutation is applied in memory, saved crash-
//! atomically, and reverted if the save fails. Every outcome carries a
//! human-readable `message`, no-ops included. The tool cap bounds the count
//! of enabled servers and is enforced only in `servers_enable`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;
use switchboard_core::AdminTool;
use thiserror::Error;
use tracing::warn;

use crate::gateway::Gateway;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Successful admin tool outcome.
#[derive(Debug)]
pub struct AdminOutcome {
    /// Result payload returned to the client.
    pub payload: Value,
    /// `update/tools` message emitted after the reply, when state changed.
    pub notify: Option<String>,
}

/// Admin tool failures.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Invalid parameters or a constraint violation (`-32602`).
    #[error("{0}")]
    InvalidParams(String),
    /// Internal failure applying the mutation (`-32603`).
    #[error("{0}")]
    Internal(String),
}

/// Parameters naming one server.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerNameParams {
    /// Administrative server name.
    name: String,
}

/// Pre-mutation check outcome for enable/disable.
enum MutationCheck {
    /// The named server does not exist.
    Unknown,
    /// The server is already in the requested state.
    NoOp,
    /// The tool cap is exhausted.
    CapReached {
        /// Count of enabled records.
        enabled: usize,
        /// Configured tool cap.
        cap: usize,
    },
    /// The mutation may proceed.
    Proceed,
}

/// Decodes tool parameters against their declared schema.
fn decode<T: DeserializeOwned>(params: Value) -> Result<T, AdminError> {
    serde_json::from_value(params)
        .map_err(|err| AdminError::InvalidParams(format!("invalid params: {err}")))
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

impl Gateway {
    /// Dispatches one admin tool invocation inside the critical section.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError`] for unknown servers, constraint violations, or
    /// persistence failures.
    pub async fn handle_admin_tool(
        &self,
        tool: AdminTool,
        params: Value,
    ) -> Result<AdminOutcome, AdminError> {
        let _guard = self.admin_lock().lock().await;
        match tool {
            AdminTool::ServersList => self.admin_servers_list(),
            AdminTool::ServersEnable => {
                let params: ServerNameParams = decode(params)?;
                self.admin_servers_enable(&params.name).await
            }
            AdminTool::ServersDisable => {
                let params: ServerNameParams = decode(params)?;
                self.admin_servers_disable(&params.name).await
            }
            AdminTool::RefreshTools => self.admin_refresh_tools(),
        }
    }

    /// Lists configured servers, their status, and the tool cap.
    fn admin_servers_list(&self) -> Result<AdminOutcome, AdminError> {
        let snapshot = self
            .with_records(Clone::clone)
            .ok_or_else(|| AdminError::Internal("server records unavailable".to_string()))?;
        let servers: Vec<Value> = snapshot
            .servers
            .iter()
            .map(|record| {
                json!({
                    "name": record.name,
                    "url": record.url,
                    "status": self.server_status(record),
                })
            })
            .collect();
        let enabled = snapshot.enabled_count();
        let message = format!(
            "{enabled} of {} servers enabled, {} tools cached",
            snapshot.servers.len(),
            self.catalog().tool_count()
        );
        Ok(AdminOutcome {
            payload: json!({
                "toolCap": snapshot.tool_cap,
                "enabledCount": enabled,
                "servers": servers,
                "message": message,
            }),
            notify: Some(message),
        })
    }

    /// Enables a server, starts its session, and warms its catalog entry.
    async fn admin_servers_enable(&self, name: &str) -> Result<AdminOutcome, AdminError> {
        let check = self
            .with_records(|records| match records.find(name) {
                None => MutationCheck::Unknown,
                Some(record) if record.enabled => MutationCheck::NoOp,
                Some(_) if records.enabled_count() >= records.tool_cap => {
                    MutationCheck::CapReached {
                        enabled: records.enabled_count(),
                        cap: records.tool_cap,
                    }
                }
                Some(_) => MutationCheck::Proceed,
            })
            .ok_or_else(|| AdminError::Internal("server records unavailable".to_string()))?;
        match check {
            MutationCheck::Unknown => {
                return Err(AdminError::InvalidParams(format!("unknown server: {name}")));
            }
            MutationCheck::NoOp => {
                return Ok(AdminOutcome {
                    payload: json!({
                        "success": true,
                        "message": format!("server {name} already enabled"),
                    }),
                    notify: None,
                });
            }
            MutationCheck::CapReached {
                enabled,
                cap,
            } => {
                return Err(AdminError::InvalidParams(format!(
                    "tool limit reached ({enabled} of {cap} servers enabled)"
                )));
            }
            MutationCheck::Proceed => {}
        }

        let snapshot = self.apply_enabled(name, true)?;
        self.catalog().invalidate_all();

        // Start the session and warm its catalog entry so the next
        // tools/list already carries the new downstream. Failures are
        // tolerated; startup is retried lazily on the next demand.
        if let Some(record) = snapshot.find(name).cloned() {
            match self.session_for_name(&record.name) {
                Ok(session) => {
                    match session.ensure_ready(self.settings().call_timeout).await {
                        Ok(()) => {
                            let _ = self.refresh_server(&record).await;
                        }
                        Err(err) => {
                            warn!(server = %record.name, %err, "enabled server failed to start");
                        }
                    }
                }
                Err(err) => warn!(server = %record.name, %err, "enabled server has no session"),
            }
        }

        Ok(AdminOutcome {
            payload: json!({
                "success": true,
                "message": format!("server {name} enabled"),
            }),
            notify: Some(format!("server {name} enabled")),
        })
    }

    /// Disables a server, drains its session, and drops its catalog entry.
    async fn admin_servers_disable(&self, name: &str) -> Result<AdminOutcome, AdminError> {
        let check = self
            .with_records(|records| match records.find(name) {
                None => MutationCheck::Unknown,
                Some(record) if !record.enabled => MutationCheck::NoOp,
                Some(_) => MutationCheck::Proceed,
            })
            .ok_or_else(|| AdminError::Internal("server records unavailable".to_string()))?;
        match check {
            MutationCheck::Unknown => {
                return Err(AdminError::InvalidParams(format!("unknown server: {name}")));
            }
            MutationCheck::NoOp => {
                return Ok(AdminOutcome {
                    payload: json!({
                        "success": true,
                        "message": format!("server {name} already disabled"),
                    }),
                    notify: None,
                });
            }
            MutationCheck::CapReached {
                ..
            }
            | MutationCheck::Proceed => {}
        }

        let _ = self.apply_enabled(name, false)?;
        self.catalog().remove(name);
        if let Some(session) = self.take_session(name) {
            session.shutdown(self.settings().shutdown_grace).await;
        }

        Ok(AdminOutcome {
            payload: json!({
                "success": true,
                "message": format!("server {name} disabled"),
            }),
            notify: Some(format!("server {name} disabled")),
        })
    }

    /// Invalidates the whole catalog and kicks off background discovery.
    fn admin_refresh_tools(&self) -> Result<AdminOutcome, AdminError> {
        let enabled = self.with_records(switchboard_config::ServerList::enabled_count).unwrap_or(0);
        self.catalog().invalidate_all();
        if let Some(gateway) = self.arc() {
            tokio::spawn(async move {
                gateway.refresh_catalog().await;
            });
        }
        Ok(AdminOutcome {
            payload: json!({
                "success": true,
                "enabledServers": enabled,
                "message": format!("catalog refresh started for {enabled} servers"),
            }),
            notify: None,
        })
    }

    /// Applies an enablement change, persists it, and reverts on failure.
    fn apply_enabled(
        &self,
        name: &str,
        enabled: bool,
    ) -> Result<switchboard_config::ServerList, AdminError> {
        let snapshot = self
            .with_records_mut(|records| {
                if let Some(record) = records.find_mut(name) {
                    record.enabled = enabled;
                }
                records.clone()
            })
            .ok_or_else(|| AdminError::Internal("server records unavailable".to_string()))?;
        if let Err(err) = self.store().save_server_list(&snapshot) {
            let _ = self.with_records_mut(|records| {
                if let Some(record) = records.find_mut(name) {
                    record.enabled = !enabled;
                }
            });
            return Err(AdminError::Internal(format!("failed to persist server list: {err}")));
        }
        Ok(snapshot)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
