// crates/switchboard-core/src/rpc.rs
// ============================================================================
// Module: JSON-RPC Envelopes
// Description: JSON-RPC 2.0 message types for both gateway boundaries.
// Purpose: Provide strict envelope parsing and serialization helpers.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The gateway speaks line-delimited JSON-RPC 2.0 twice over: as a server to
//! the upstream client on standard I/O, and as a client to every downstream
//! server. This module defines the envelopes for both directions plus the
//! error codes the gateway emits. Inbound payloads are untrusted; parsing is
//! strict about the `jsonrpc` version tag and the presence of `id`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// JSON-RPC parse error.
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC invalid request.
pub const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC method not found.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC invalid params, also used for admin constraint violations.
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC internal error, also used for upstream timeout/closure relay.
pub const INTERNAL_ERROR: i64 = -32603;

/// Protocol version tag required on every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// SECTION: Inbound Envelopes
// ============================================================================

/// Inbound JSON-RPC envelope from the upstream client.
///
/// # Invariants
/// - `id: None` means the field was absent (a notification); `Some(Null)` is
///   a present-but-null identifier and is answered like any request.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEnvelope {
    /// JSON-RPC protocol version tag.
    #[serde(default)]
    pub jsonrpc: String,
    /// Request identifier when present.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub id: Option<Value>,
    /// Method name.
    #[serde(default)]
    pub method: String,
    /// Optional parameters payload.
    pub params: Option<Value>,
}

impl RequestEnvelope {
    /// Returns true when the envelope carries a valid version tag.
    #[must_use]
    pub fn has_valid_version(&self) -> bool {
        self.jsonrpc == JSONRPC_VERSION
    }
}

/// Keeps `Some(Value::Null)` distinguishable from an absent field.
fn deserialize_some<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

// ============================================================================
// SECTION: Outbound Envelopes
// ============================================================================

/// JSON-RPC request sent to a downstream server.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// JSON-RPC protocol version tag.
    pub jsonrpc: &'static str,
    /// Session-local request identifier.
    pub id: u64,
    /// Method name to invoke.
    pub method: String,
    /// Optional parameters payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Builds a downstream request with the given local identifier.
    #[must_use]
    pub fn new(id: u64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC response emitted to the upstream client.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// JSON-RPC protocol version tag.
    pub jsonrpc: &'static str,
    /// Identifier mirrored from the request.
    pub id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    /// Builds a success response mirroring the request identifier.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response mirroring the request identifier.
    #[must_use]
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Builds an error response relaying a downstream error unchanged.
    #[must_use]
    pub fn relay_error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Structured error metadata when provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC notification emitted to the upstream client.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// JSON-RPC protocol version tag.
    pub jsonrpc: &'static str,
    /// Notification method name.
    pub method: String,
    /// Notification parameters payload.
    pub params: Value,
}

impl Notification {
    /// Builds a notification with the given method and parameters.
    #[must_use]
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.to_string(),
            params,
        }
    }

    /// Builds an `update/tools` notification with a summary message.
    #[must_use]
    pub fn update_tools(message: impl Into<String>) -> Self {
        Self::new("update/tools", serde_json::json!({ "message": message.into() }))
    }
}

// ============================================================================
// SECTION: Downstream Replies
// ============================================================================

/// Classified JSON-RPC line read from a downstream server.
#[derive(Debug, Clone)]
pub enum DownstreamMessage {
    /// Reply correlated to a forwarded request by local identifier.
    Reply {
        /// Session-local identifier the downstream mirrored back.
        id: u64,
        /// Successful result payload.
        result: Option<Value>,
        /// Error payload when the downstream failed the call.
        error: Option<RpcError>,
    },
    /// Notification emitted by the downstream (no identifier).
    Notification {
        /// Notification method name.
        method: String,
        /// Notification parameters payload.
        params: Option<Value>,
    },
}

/// Raw downstream envelope used for classification.
#[derive(Debug, Deserialize)]
struct DownstreamEnvelope {
    /// JSON-RPC protocol version tag.
    #[serde(default)]
    jsonrpc: String,
    /// Identifier when the line is a reply.
    id: Option<Value>,
    /// Successful result payload.
    result: Option<Value>,
    /// Error payload.
    error: Option<RpcError>,
    /// Method name when the line is a notification.
    method: Option<String>,
    /// Notification parameters payload.
    params: Option<Value>,
}

impl DownstreamMessage {
    /// Parses one downstream stdout line into a reply or notification.
    ///
    /// Returns `None` for lines that are not valid JSON-RPC; callers log and
    /// discard those without disturbing request correlation.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let envelope: DownstreamEnvelope = serde_json::from_str(line).ok()?;
        if envelope.jsonrpc != JSONRPC_VERSION {
            return None;
        }
        if let Some(id) = envelope.id {
            let id = id.as_u64()?;
            if envelope.result.is_none() && envelope.error.is_none() {
                return None;
            }
            return Some(Self::Reply {
                id,
                result: envelope.result,
                error: envelope.error,
            });
        }
        let method = envelope.method?;
        Some(Self::Notification {
            method,
            params: envelope.params,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
