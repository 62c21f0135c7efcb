// crates/switchboard-gateway/src/audit.rs
// ============================================================================
// Module: Gateway Audit Logging
// Description: Structured audit events for client request handling.
// Purpose: Emit JSON-line audit records without hard sink dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit event payloads and sinks for the gateway's client boundary. The
//! sink trait is intentionally lightweight so deployments can route events to
//! their preferred logging pipeline; the gateway ships stderr, file, and
//! no-op sinks. Standard output is never a sink — it carries JSON-RPC only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The request produced a result.
    Ok,
    /// The request produced an error response.
    Error,
}

/// Audit event for one handled client request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier as serialized JSON, when present.
    pub request_id: Option<String>,
    /// JSON-RPC method name.
    pub method: String,
    /// Tool name for `tools/call` requests.
    pub tool: Option<String>,
    /// Request outcome.
    pub outcome: AuditOutcome,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Request handling latency in milliseconds.
    pub latency_ms: u128,
}

/// Inputs for building a request audit event.
#[derive(Debug)]
pub struct RequestAuditEventParams {
    /// Request identifier as serialized JSON, when present.
    pub request_id: Option<String>,
    /// JSON-RPC method name.
    pub method: String,
    /// Tool name for `tools/call` requests.
    pub tool: Option<String>,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Request handling latency in milliseconds.
    pub latency_ms: u128,
}

impl RequestAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: RequestAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        let outcome =
            if params.error_code.is_some() { AuditOutcome::Error } else { AuditOutcome::Ok };
        Self {
            event: "gateway_request",
            timestamp_ms,
            request_id: params.request_id,
            method: params.method,
            tool: params.tool,
            outcome,
            error_code: params.error_code,
            latency_ms: params.latency_ms,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for gateway request events.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &RequestAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &RequestAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &RequestAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &RequestAuditEvent) {}
}
