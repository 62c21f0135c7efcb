// crates/switchboard-gateway/src/dispatcher.rs
// ============================================================================
// Module: JSON-RPC Dispatcher
// Description: Line-delimited JSON-RPC 2.0 loop on the client boundary.
// Purpose: Validate envelopes, route methods, and serialize all writes.
// Dependencies: tokio, serde_json, switchboard-core
// ============================================================================

//! ## Overview
//! The dispatcher reads one JSON object per line from the client, validates
//! the envelope, and routes recognized methods: `initialize` (idempotent
//! warmup side effect), `tools/list` (cached union plus a non-blocking
//! refresh), and `tools/call` (router, as a spawned task so the reader never
//! awaits a forward). Every write goes through one bounded queue drained by
//! a single writer task, so emissions are whole lines in a total order.
//! Responses may be emitted out of inbound order; clients correlate by id.
//!
//! The reader/writer handles are generic so tests can drive the dispatcher
//! over in-memory duplex pipes; production passes stdin/stdout.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use serde_json::json;
use switchboard_core::Notification;
use switchboard_core::RequestEnvelope;
use switchboard_core::Response;
use switchboard_core::rpc;
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::debug;
use tracing::error;

use crate::audit::RequestAuditEvent;
use crate::audit::RequestAuditEventParams;
use crate::gateway::Gateway;
use crate::outbound::OutboundError;
use crate::outbound::OutboundSender;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Fatal dispatcher failures, mapped to process exit codes.
#[derive(Debug, Error)]
pub enum FatalError {
    /// Standard input or output is unusable.
    #[error("stdio failure: {0}")]
    Stdio(String),
    /// The write queue stayed full past the stall deadline.
    #[error("unbounded write-queue backpressure")]
    Backpressure,
}

impl FatalError {
    /// Returns the process exit code for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Stdio(_) => 2,
            Self::Backpressure => 3,
        }
    }
}

/// Line-delimited JSON-RPC dispatcher over one gateway.
pub struct Dispatcher {
    /// Shared gateway state.
    gateway: Arc<Gateway>,
}

impl Dispatcher {
    /// Creates a dispatcher over the gateway.
    #[must_use]
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
        }
    }

    // ========================================================================
    // SECTION: Main Loop
    // ========================================================================

    /// Runs the dispatcher until EOF, shutdown, or a fatal failure.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError`] for unusable standard I/O or persistent
    /// write-queue backpressure; a clean EOF or shutdown returns `Ok`.
    pub async fn run<R, W>(&self, reader: R, writer: W) -> Result<(), FatalError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let settings = self.gateway.settings().clone();
        let (tx, rx) = mpsc::channel::<String>(settings.write_queue_capacity);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let writer_task = tokio::spawn(write_loop(writer, rx, stop_rx));

        let outbound = OutboundSender::new(tx, settings.write_stall_timeout);
        self.gateway.attach_outbound(outbound.clone());
        let _ = outbound
            .send_notification(&Notification::new(
                "notification",
                json!({
                    "message": format!(
                        "{} {} ready",
                        settings.server_name, settings.server_version
                    ),
                }),
            ))
            .await;

        let mut reader = BufReader::new(reader);
        let mut shutdown = self.gateway.shutdown_signal();
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut line = String::new();

        let outcome = loop {
            if outbound.is_stalled() {
                break Err(FatalError::Backpressure);
            }
            while tasks.try_join_next().is_some() {}
            line.clear();
            let read = tokio::select! {
                read = reader.read_line(&mut line) => read,
                _ = shutdown.changed() => break Ok(()),
            };
            match read {
                Ok(0) => break Ok(()),
                Ok(_) => {
                    let trimmed = line.trim_end_matches(['\r', '\n']);
                    if let Err(err) = self.handle_line(trimmed, &outbound, &mut tasks).await {
                        break Err(err);
                    }
                }
                Err(err) => break Err(FatalError::Stdio(format!("stdin read failed: {err}"))),
            }
        };

        // Shutdown sequence: stop accepting, fail in-flight client work,
        // drain sessions, then let the writer flush what is queued.
        self.gateway.begin_shutdown();
        while tasks.join_next().await.is_some() {}
        self.gateway.close_sessions().await;
        let _ = stop_tx.send(());
        let writer_outcome = writer_task.await;

        match outcome {
            Err(err) => {
                error!(%err, "dispatcher terminating");
                Err(err)
            }
            Ok(()) => match writer_outcome {
                Ok(Ok(())) => Ok(()),
                Ok(Err(reason)) => Err(FatalError::Stdio(reason)),
                Err(_) => Err(FatalError::Stdio("writer task failed".to_string())),
            },
        }
    }

    // ========================================================================
    // SECTION: Request Handling
    // ========================================================================

    /// Handles one inbound line.
    async fn handle_line(
        &self,
        line: &str,
        outbound: &OutboundSender,
        tasks: &mut JoinSet<()>,
    ) -> Result<(), FatalError> {
        if line.trim().is_empty() {
            return Ok(());
        }
        if line.len() > self.gateway.settings().max_line_bytes {
            return respond(
                outbound,
                Response::error(Value::Null, rpc::INVALID_REQUEST, "request too large"),
            )
            .await;
        }
        let Ok(envelope) = serde_json::from_str::<RequestEnvelope>(line) else {
            return respond(
                outbound,
                Response::error(Value::Null, rpc::PARSE_ERROR, "parse error"),
            )
            .await;
        };
        let Some(id) = envelope.id.clone() else {
            // Notifications cannot be replied to; invalid ones are dropped.
            debug!(method = %envelope.method, "dropping client notification");
            return Ok(());
        };
        if !envelope.has_valid_version() {
            return self
                .finish(
                    outbound,
                    &envelope,
                    Response::error(id, rpc::INVALID_REQUEST, "invalid request"),
                    Instant::now(),
                )
                .await;
        }

        let started = Instant::now();
        let method = envelope.method.clone();
        match method.as_str() {
            "initialize" => {
                let result = self.gateway.initialize_result();
                if self.gateway.mark_initialized() {
                    let gateway = Arc::clone(&self.gateway);
                    tasks.spawn(async move {
                        gateway.refresh_catalog().await;
                    });
                }
                self.finish(outbound, &envelope, Response::success(id, result), started).await
            }
            "tools/list" => {
                let tools = self.gateway.list_tools();
                let response = Response::success(id, json!({ "tools": tools }));
                if self.gateway.catalog_needs_refresh() {
                    let gateway = Arc::clone(&self.gateway);
                    tasks.spawn(async move {
                        gateway.refresh_catalog().await;
                    });
                }
                self.finish(outbound, &envelope, response, started).await
            }
            "tools/call" => {
                self.spawn_tool_call(envelope, id, outbound.clone(), tasks);
                Ok(())
            }
            _ => {
                self.finish(
                    outbound,
                    &envelope,
                    Response::error(id, rpc::METHOD_NOT_FOUND, "method not found"),
                    started,
                )
                .await
            }
        }
    }

    /// Spawns a `tools/call` so the reader never awaits a forward.
    fn spawn_tool_call(
        &self,
        envelope: RequestEnvelope,
        id: Value,
        outbound: OutboundSender,
        tasks: &mut JoinSet<()>,
    ) {
        let gateway = Arc::clone(&self.gateway);
        let params = envelope.params.clone().unwrap_or(Value::Null);
        tasks.spawn(async move {
            let started = Instant::now();
            let mut shutdown = gateway.shutdown_signal();
            let routed = if gateway.is_shutting_down() {
                shutting_down(id)
            } else {
                tokio::select! {
                    routed = gateway.handle_tools_call(id.clone(), params) => routed,
                    _ = shutdown.changed() => shutting_down(id),
                }
            };
            gateway.record_audit(&audit_event(&envelope, &routed.response, routed.tool, started));
            if outbound.send_response(&routed.response).await.is_err() {
                return;
            }
            if let Some(message) = routed.notify {
                let _ = outbound.send_notification(&Notification::update_tools(message)).await;
            }
        });
    }

    /// Sends a response and records its audit event.
    async fn finish(
        &self,
        outbound: &OutboundSender,
        envelope: &RequestEnvelope,
        response: Response,
        started: Instant,
    ) -> Result<(), FatalError> {
        self.gateway.record_audit(&audit_event(envelope, &response, None, started));
        respond(outbound, response).await
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Sends one response, mapping outbound failures to fatal errors.
async fn respond(outbound: &OutboundSender, response: Response) -> Result<(), FatalError> {
    match outbound.send_response(&response).await {
        Ok(()) => Ok(()),
        Err(OutboundError::Closed) => Err(FatalError::Stdio("stdout closed".to_string())),
        Err(OutboundError::Stalled) => Err(FatalError::Backpressure),
    }
}

/// Builds the shutdown response for an in-flight client request.
fn shutting_down(id: Value) -> crate::router::RoutedCall {
    crate::router::RoutedCall {
        response: Response::error(id, rpc::INTERNAL_ERROR, "gateway shutting down"),
        notify: None,
        tool: None,
    }
}

/// Builds the audit event for one handled request.
fn audit_event(
    envelope: &RequestEnvelope,
    response: &Response,
    tool: Option<String>,
    started: Instant,
) -> RequestAuditEvent {
    RequestAuditEvent::new(RequestAuditEventParams {
        request_id: envelope.id.as_ref().map(|id| id.to_string()),
        method: envelope.method.clone(),
        tool,
        error_code: response.error.as_ref().map(|error| error.code),
        latency_ms: started.elapsed().as_millis(),
    })
}

/// Drains the outbound queue onto the writer, one line at a time.
async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<String>,
    mut stop_rx: oneshot::Receiver<()>,
) -> Result<(), String>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(line) => write_line(&mut writer, &line).await?,
                None => break,
            },
            _ = &mut stop_rx => {
                while let Ok(line) = rx.try_recv() {
                    write_line(&mut writer, &line).await?;
                }
                break;
            }
        }
    }
    let _ = writer.shutdown().await;
    Ok(())
}

/// Writes one whole line followed by a newline, then flushes.
async fn write_line<W>(writer: &mut W, line: &str) -> Result<(), String>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|err| format!("stdout write failed: {err}"))?;
    writer.write_all(b"\n").await.map_err(|err| format!("stdout write failed: {err}"))?;
    writer.flush().await.map_err(|err| format!("stdout flush failed: {err}"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
