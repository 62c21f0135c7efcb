// crates/switchboard-gateway/src/transport.rs
// ============================================================================
// Module: Transport Adapters
// Description: Child-process stdio and HTTP POST transports for downstreams.
// Purpose: Send one JSON-RPC request to a downstream and yield its reply.
// Dependencies: tokio, reqwest, serde_json
// ============================================================================

//! ## Overview
//! Two transports carry forwarded requests to downstream MCP servers:
//! child-process stdio with one JSON object per line, and `POST /mcp` with
//! one JSON-RPC request per body. Both surface the same reply shape under a
//! caller-supplied deadline. Downstream output is untrusted: HTTP bodies are
//! read under a hard size limit and replies are parsed strictly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use switchboard_config::LaunchDescriptor;
use switchboard_core::Request;
use switchboard_core::RpcError;
use thiserror::Error;
use tokio::process::Child;
use tokio::process::ChildStderr;
use tokio::process::ChildStdin;
use tokio::process::ChildStdout;
use tokio::process::Command;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum size of a downstream HTTP response body (bytes).
const MAX_HTTP_RESPONSE_BYTES: usize = 1024 * 1024;
/// Path appended to a downstream's base URL for JSON-RPC requests.
const MCP_ENDPOINT_PATH: &str = "/mcp";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Reply payload produced by either transport.
///
/// Exactly one of `result` and `error` is populated by a well-formed
/// downstream; both are relayed to the client verbatim.
#[derive(Debug, Clone)]
pub struct ForwardReply {
    /// Successful result payload.
    pub result: Option<Value>,
    /// Error payload when the downstream failed the call.
    pub error: Option<RpcError>,
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Child process could not be spawned.
    #[error("downstream {name}: spawn failed: {reason}")]
    Spawn {
        /// Downstream server name.
        name: String,
        /// Human-readable failure reason.
        reason: String,
    },
    /// HTTP connection could not be established.
    #[error("downstream {name}: connection failed")]
    Connect {
        /// Downstream server name.
        name: String,
    },
    /// HTTP request timed out.
    #[error("downstream {name}: request timed out")]
    Timeout {
        /// Downstream server name.
        name: String,
    },
    /// HTTP request failed with a non-success status.
    #[error("downstream {name}: http status {status}")]
    HttpStatus {
        /// Downstream server name.
        name: String,
        /// Response status code.
        status: u16,
    },
    /// HTTP transport failed for another reason.
    #[error("downstream {name}: http request failed: {reason}")]
    Http {
        /// Downstream server name.
        name: String,
        /// Human-readable failure reason.
        reason: String,
    },
    /// Response body exceeded the size limit.
    #[error("downstream {name}: response exceeds {limit} bytes")]
    ResponseTooLarge {
        /// Downstream server name.
        name: String,
        /// Maximum accepted size in bytes.
        limit: usize,
    },
    /// Response body was not a valid JSON-RPC reply.
    #[error("downstream {name}: invalid json-rpc response")]
    InvalidResponse {
        /// Downstream server name.
        name: String,
    },
}

/// Reply envelope parsed from a downstream HTTP body.
#[derive(Debug, Deserialize)]
struct ReplyEnvelope {
    /// Successful result payload.
    result: Option<Value>,
    /// Error payload.
    error: Option<RpcError>,
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// HTTP POST transport for one downstream endpoint.
#[derive(Debug)]
pub struct HttpEndpoint {
    /// Downstream server name, used in error messages.
    name: String,
    /// Full JSON-RPC endpoint URL.
    endpoint: String,
    /// Shared HTTP client for this downstream.
    client: reqwest::Client,
}

impl HttpEndpoint {
    /// Builds the transport for a downstream base URL.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the HTTP client cannot be constructed.
    pub fn new(name: &str, base_url: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| TransportError::Http {
                name: name.to_string(),
                reason: err.to_string(),
            })?;
        let endpoint = format!("{}{MCP_ENDPOINT_PATH}", base_url.trim_end_matches('/'));
        Ok(Self {
            name: name.to_string(),
            endpoint,
            client,
        })
    }

    /// Sends one JSON-RPC request and awaits its reply under the deadline.
    ///
    /// Connection failures are retried at most once per call; every other
    /// failure is surfaced immediately.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request cannot be completed.
    pub async fn send(
        &self,
        request: &Request,
        deadline: Duration,
    ) -> Result<ForwardReply, TransportError> {
        let payload = serde_json::to_vec(request).map_err(|_| TransportError::InvalidResponse {
            name: self.name.clone(),
        })?;
        let mut retried = false;
        loop {
            match self.send_once(payload.clone(), deadline).await {
                Ok(reply) => return Ok(reply),
                Err(TransportError::Connect {
                    name,
                }) if !retried => {
                    retried = true;
                    tracing::debug!(server = %name, "retrying after connection failure");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Performs a single HTTP round-trip.
    async fn send_once(
        &self,
        payload: Vec<u8>,
        deadline: Duration,
    ) -> Result<ForwardReply, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(deadline)
            .body(payload)
            .send()
            .await
            .map_err(|err| self.map_send_error(&err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                name: self.name.clone(),
                status: status.as_u16(),
            });
        }
        let body = self.read_body_with_limit(response, MAX_HTTP_RESPONSE_BYTES).await?;
        let envelope: ReplyEnvelope =
            serde_json::from_slice(&body).map_err(|_| TransportError::InvalidResponse {
                name: self.name.clone(),
            })?;
        if envelope.result.is_none() && envelope.error.is_none() {
            return Err(TransportError::InvalidResponse {
                name: self.name.clone(),
            });
        }
        Ok(ForwardReply {
            result: envelope.result,
            error: envelope.error,
        })
    }

    /// Reads a response body while enforcing a hard byte limit.
    async fn read_body_with_limit(
        &self,
        mut response: reqwest::Response,
        limit: usize,
    ) -> Result<Vec<u8>, TransportError> {
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|err| self.map_send_error(&err))? {
            if body.len().saturating_add(chunk.len()) > limit {
                return Err(TransportError::ResponseTooLarge {
                    name: self.name.clone(),
                    limit,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    /// Maps reqwest errors to stable transport errors.
    fn map_send_error(&self, error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                name: self.name.clone(),
            }
        } else if error.is_connect() {
            TransportError::Connect {
                name: self.name.clone(),
            }
        } else {
            TransportError::Http {
                name: self.name.clone(),
                reason: error.to_string(),
            }
        }
    }
}

// ============================================================================
// SECTION: Child-Process Transport
// ============================================================================

/// Piped streams of a freshly spawned child-process downstream.
#[derive(Debug)]
pub struct SpawnedChild {
    /// Child process handle.
    pub child: Child,
    /// Child stdin for request lines.
    pub stdin: ChildStdin,
    /// Child stdout carrying JSON-RPC lines.
    pub stdout: ChildStdout,
    /// Child stderr carrying free-form log lines.
    pub stderr: ChildStderr,
}

/// Spawns a child-process downstream with piped standard streams.
///
/// Standard error is piped so the session can hand it to the logging
/// collaborator; only stdout carries JSON-RPC.
///
/// # Errors
///
/// Returns [`TransportError::Spawn`] when the process cannot be started or a
/// stream is unavailable.
pub fn spawn_child(name: &str, descriptor: &LaunchDescriptor) -> Result<SpawnedChild, TransportError> {
    let mut command = Command::new(&descriptor.command);
    command
        .args(&descriptor.args)
        .envs(&descriptor.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &descriptor.cwd {
        command.current_dir(cwd);
    }
    let mut child = command.spawn().map_err(|err| TransportError::Spawn {
        name: name.to_string(),
        reason: err.to_string(),
    })?;
    let stdin = child.stdin.take().ok_or_else(|| TransportError::Spawn {
        name: name.to_string(),
        reason: "missing child stdin".to_string(),
    })?;
    let stdout = child.stdout.take().ok_or_else(|| TransportError::Spawn {
        name: name.to_string(),
        reason: "missing child stdout".to_string(),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| TransportError::Spawn {
        name: name.to_string(),
        reason: "missing child stderr".to_string(),
    })?;
    Ok(SpawnedChild {
        child,
        stdin,
        stdout,
        stderr,
    })
}
