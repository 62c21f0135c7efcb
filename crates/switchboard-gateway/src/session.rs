// crates/switchboard-gateway/src/session.rs
// ============================================================================
// Module: Downstream Session
// Description: Per-downstream lifecycle, id assignment, and reply matching.
// Purpose: Own one downstream connection and its in-flight request table.
// Dependencies: tokio, serde_json, switchboard-core
// ============================================================================

//! ## Overview
//! One session owns the gateway's connection to a single downstream server:
//! the spawned child process (if any), the initialize handshake, the
//! monotonic local id counter, and the in-flight table matching replies to
//! forwarded requests. A dedicated reader task consumes the child's stdout
//! line by line; replies resolve their in-flight entry, valid notifications
//! are forwarded to the client verbatim, and anything else is logged and
//! discarded. Child stderr is free-form and only logged.
//!
//! ## Invariants
//! - Local ids start at 1 and are never reused during the session's lifetime.
//! - A timed-out call fails only that call; the session stays `Ready`.
//! - Once `Draining` or `Closed`, no new forwards are accepted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::Value;
use switchboard_config::LaunchDescriptor;
use switchboard_core::DownstreamMessage;
use switchboard_core::Request;
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::ChildStderr;
use tokio::process::ChildStdin;
use tokio::process::ChildStdout;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::warn;

use crate::outbound::OutboundSender;
use crate::transport::ForwardReply;
use crate::transport::HttpEndpoint;
use crate::transport::spawn_child;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet started.
    New,
    /// Startup in progress.
    Starting,
    /// Initialize handshake complete; forwards accepted.
    Ready,
    /// Shutting down; in-flight requests may complete, no new forwards.
    Draining,
    /// Torn down; the child (if any) is reaped.
    Closed,
    /// Startup or transport failure; retried lazily on next demand.
    Failed,
}

impl SessionState {
    /// Returns the lowercase state label used by `servers_list`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

/// Session errors surfaced to the router as `-32603` relays.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// A forwarded call missed its deadline.
    #[error("upstream timeout: {name}")]
    UpstreamTimeout {
        /// Downstream server name.
        name: String,
    },
    /// The downstream connection closed with the call in flight.
    #[error("upstream closed: {name}")]
    UpstreamClosed {
        /// Downstream server name.
        name: String,
    },
    /// The downstream could not be reached or started.
    #[error("downstream {name} unavailable: {reason}")]
    Unavailable {
        /// Downstream server name.
        name: String,
        /// Human-readable failure reason.
        reason: String,
    },
    /// The session is draining or closed and accepts no new forwards.
    #[error("downstream {name} is shutting down")]
    Draining {
        /// Downstream server name.
        name: String,
    },
}

/// How the session (re)connects to its downstream.
#[derive(Debug)]
pub enum Connector {
    /// Request/response over HTTP POST.
    Http(HttpEndpoint),
    /// Child process spawned from a launch descriptor.
    Child {
        /// Launch descriptor for the child process.
        descriptor: LaunchDescriptor,
    },
}

/// Downstream session owning one connection and its in-flight table.
pub struct DownstreamSession {
    /// Weak self-reference used to hand reader tasks an owned handle.
    weak_self: Weak<Self>,
    /// Administrative server name.
    name: String,
    /// Connector used for startup and restarts.
    connector: Connector,
    /// Lifecycle state.
    state: Mutex<SessionState>,
    /// Serializes startup attempts.
    startup: tokio::sync::Mutex<()>,
    /// Monotonic local id counter, starting at 1.
    next_id: AtomicU64,
    /// In-flight request table keyed by local id.
    pending: Mutex<HashMap<u64, oneshot::Sender<ForwardReply>>>,
    /// Child stdin writer, present while a child is running.
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    /// Child handle, present while a child is running.
    child: Mutex<Option<Child>>,
    /// Start generation counter guarding stale reader-task transitions.
    generation: AtomicU64,
    /// Client-bound writer for verbatim notification passthrough.
    outbound: Option<OutboundSender>,
}

impl DownstreamSession {
    /// Creates a session in the `New` state.
    #[must_use]
    pub fn new(name: &str, connector: Connector, outbound: Option<OutboundSender>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            name: name.to_string(),
            connector,
            state: Mutex::new(SessionState::New),
            startup: tokio::sync::Mutex::new(()),
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            stdin: tokio::sync::Mutex::new(None),
            child: Mutex::new(None),
            generation: AtomicU64::new(0),
            outbound,
        })
    }

    /// Returns the administrative server name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.lock().map_or(SessionState::Failed, |state| *state)
    }

    /// Replaces the lifecycle state.
    fn set_state(&self, next: SessionState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    /// Allocates the next local request id.
    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    // ========================================================================
    // SECTION: Startup
    // ========================================================================

    /// Brings the session to `Ready`, starting it if necessary.
    ///
    /// A `Failed` session is retried here; there is no background retry. The
    /// whole startup, including the initialize handshake, runs under the
    /// given deadline.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the session cannot reach `Ready` in
    /// time or is already shutting down.
    pub async fn ensure_ready(&self, deadline: Duration) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Ready => return Ok(()),
            SessionState::Draining | SessionState::Closed => {
                return Err(SessionError::Draining {
                    name: self.name.clone(),
                });
            }
            SessionState::New | SessionState::Starting | SessionState::Failed => {}
        }
        let _guard = self.startup.lock().await;
        match self.state() {
            SessionState::Ready => return Ok(()),
            SessionState::Draining | SessionState::Closed => {
                return Err(SessionError::Draining {
                    name: self.name.clone(),
                });
            }
            SessionState::New | SessionState::Starting | SessionState::Failed => {}
        }
        self.set_state(SessionState::Starting);
        let result = match &self.connector {
            Connector::Http(endpoint) => {
                let request = Request::new(self.allocate_id(), "initialize", None);
                endpoint.send(&request, deadline).await.map(|_| ()).map_err(|err| {
                    SessionError::Unavailable {
                        name: self.name.clone(),
                        reason: err.to_string(),
                    }
                })
            }
            Connector::Child {
                descriptor,
            } => self.start_child(descriptor, deadline).await,
        };
        match result {
            Ok(()) => {
                self.set_state(SessionState::Ready);
                debug!(server = %self.name, "session ready");
                Ok(())
            }
            Err(err) => {
                self.set_state(SessionState::Failed);
                warn!(server = %self.name, %err, "session startup failed");
                Err(err)
            }
        }
    }

    /// Spawns the child and completes the initialize handshake.
    async fn start_child(
        &self,
        descriptor: &LaunchDescriptor,
        deadline: Duration,
    ) -> Result<(), SessionError> {
        let Some(session) = self.weak_self.upgrade() else {
            return Err(SessionError::UpstreamClosed {
                name: self.name.clone(),
            });
        };
        let spawned = spawn_child(&self.name, descriptor).map_err(|err| {
            SessionError::Unavailable {
                name: self.name.clone(),
                reason: err.to_string(),
            }
        })?;
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut stdin = self.stdin.lock().await;
            *stdin = Some(spawned.stdin);
        }
        if let Ok(mut child) = self.child.lock() {
            *child = Some(spawned.child);
        }
        tokio::spawn(Arc::clone(&session).read_stdout(spawned.stdout, generation));
        tokio::spawn(session.read_stderr(spawned.stderr));

        let reply = self.send_request("initialize", None, deadline).await?;
        if let Some(error) = reply.error {
            return Err(SessionError::Unavailable {
                name: self.name.clone(),
                reason: format!("initialize rejected: {}", error.message),
            });
        }
        Ok(())
    }

    // ========================================================================
    // SECTION: Forwarding
    // ========================================================================

    /// Forwards a request on a `Ready` session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the session is not ready or the call
    /// fails or times out.
    pub async fn forward(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<ForwardReply, SessionError> {
        match self.state() {
            SessionState::Ready => {}
            SessionState::Draining | SessionState::Closed => {
                return Err(SessionError::Draining {
                    name: self.name.clone(),
                });
            }
            SessionState::New | SessionState::Starting | SessionState::Failed => {
                return Err(SessionError::Unavailable {
                    name: self.name.clone(),
                    reason: format!("session is {}", self.state().as_str()),
                });
            }
        }
        self.send_request(method, params, deadline).await
    }

    /// Sends a request over the session's transport without a state check.
    ///
    /// Used by startup (the handshake runs in `Starting`) and by `forward`.
    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<ForwardReply, SessionError> {
        match &self.connector {
            Connector::Http(endpoint) => {
                let request = Request::new(self.allocate_id(), method, params);
                match endpoint.send(&request, deadline).await {
                    Ok(reply) => Ok(reply),
                    Err(crate::transport::TransportError::Timeout {
                        name,
                    }) => Err(SessionError::UpstreamTimeout {
                        name,
                    }),
                    Err(err @ crate::transport::TransportError::Connect {
                        ..
                    }) => {
                        // The per-call retry already ran; a connection-level
                        // failure on an established session fails the session.
                        self.set_state(SessionState::Failed);
                        Err(SessionError::Unavailable {
                            name: self.name.clone(),
                            reason: err.to_string(),
                        })
                    }
                    Err(err) => Err(SessionError::Unavailable {
                        name: self.name.clone(),
                        reason: err.to_string(),
                    }),
                }
            }
            Connector::Child {
                ..
            } => self.send_stdio_request(method, params, deadline).await,
        }
    }

    /// Sends a request line to the child and awaits the matched reply.
    async fn send_stdio_request(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<ForwardReply, SessionError> {
        let id = self.allocate_id();
        let request = Request::new(id, method, params);
        let Ok(mut line) = serde_json::to_string(&request) else {
            return Err(SessionError::Unavailable {
                name: self.name.clone(),
                reason: "request serialization failed".to_string(),
            });
        };
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        {
            let Ok(mut pending) = self.pending.lock() else {
                return Err(SessionError::Unavailable {
                    name: self.name.clone(),
                    reason: "in-flight table unavailable".to_string(),
                });
            };
            pending.insert(id, tx);
        }

        {
            let mut stdin = self.stdin.lock().await;
            let Some(writer) = stdin.as_mut() else {
                self.remove_pending(id);
                return Err(SessionError::UpstreamClosed {
                    name: self.name.clone(),
                });
            };
            if let Err(err) = writer.write_all(line.as_bytes()).await {
                self.remove_pending(id);
                return Err(SessionError::Unavailable {
                    name: self.name.clone(),
                    reason: format!("stdin write failed: {err}"),
                });
            }
            if let Err(err) = writer.flush().await {
                self.remove_pending(id);
                return Err(SessionError::Unavailable {
                    name: self.name.clone(),
                    reason: format!("stdin flush failed: {err}"),
                });
            }
        }

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(SessionError::UpstreamClosed {
                name: self.name.clone(),
            }),
            Err(_) => {
                // One timeout fails this call only; the session stays Ready.
                self.remove_pending(id);
                Err(SessionError::UpstreamTimeout {
                    name: self.name.clone(),
                })
            }
        }
    }

    /// Drops one in-flight entry after a local failure.
    fn remove_pending(&self, id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }

    // ========================================================================
    // SECTION: Reader Tasks
    // ========================================================================

    /// Consumes child stdout line by line until the stream closes.
    async fn read_stdout(self: Arc<Self>, stdout: ChildStdout, generation: u64) {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => self.handle_stdout_line(&line),
                Ok(None) | Err(_) => break,
            }
        }
        self.on_stream_closed(generation);
    }

    /// Routes one stdout line to the in-flight table or the client.
    fn handle_stdout_line(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match DownstreamMessage::parse(line) {
            Some(DownstreamMessage::Reply {
                id,
                result,
                error,
            }) => {
                let entry = self.pending.lock().ok().and_then(|mut pending| pending.remove(&id));
                if let Some(tx) = entry {
                    let _ = tx.send(ForwardReply {
                        result,
                        error,
                    });
                } else {
                    debug!(server = %self.name, id, "discarding reply with no in-flight entry");
                }
            }
            Some(DownstreamMessage::Notification {
                method,
                ..
            }) => {
                debug!(server = %self.name, %method, "forwarding downstream notification");
                if let Some(outbound) = &self.outbound {
                    outbound.try_send_raw(line.to_string());
                }
            }
            None => {
                debug!(server = %self.name, "discarding non-json-rpc stdout line");
            }
        }
    }

    /// Logs child stderr lines; stderr never carries JSON-RPC.
    async fn read_stderr(self: Arc<Self>, stderr: ChildStderr) {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(server = %self.name, "downstream stderr: {line}");
        }
    }

    /// Handles the child's stdout closing for the given start generation.
    fn on_stream_closed(&self, generation: u64) {
        if self.generation.load(Ordering::Relaxed) != generation {
            return;
        }
        let next = match self.state() {
            SessionState::Draining | SessionState::Closed => SessionState::Closed,
            _ => SessionState::Failed,
        };
        self.set_state(next);
        self.fail_in_flight();
        debug!(server = %self.name, state = next.as_str(), "downstream stdout closed");
    }

    /// Fails every in-flight request with "upstream closed".
    fn fail_in_flight(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            // Dropping the senders resolves each waiter as UpstreamClosed.
            pending.clear();
        }
    }

    // ========================================================================
    // SECTION: Teardown
    // ========================================================================

    /// Drains and closes the session.
    ///
    /// New forwards are rejected immediately; in-flight requests may complete
    /// until the grace period elapses. The child is asked to terminate by
    /// closing its stdin and sending SIGTERM; after the grace period it is
    /// force-killed.
    pub async fn shutdown(&self, grace: Duration) {
        match self.state() {
            SessionState::Closed => return,
            _ => self.set_state(SessionState::Draining),
        }
        {
            let mut stdin = self.stdin.lock().await;
            stdin.take();
        }
        let child = self.child.lock().ok().and_then(|mut handle| handle.take());
        if let Some(mut child) = child {
            terminate_child(&child);
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
            }
        }
        self.set_state(SessionState::Closed);
        self.fail_in_flight();
        debug!(server = %self.name, "session closed");
    }
}

/// Delivers SIGTERM to ask the child to terminate.
fn terminate_child(child: &Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        if let Some(pid) = child.id()
            && let Ok(raw) = i32::try_from(pid)
        {
            let _ = kill(Pid::from_raw(raw), Signal::SIGTERM);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child;
    }
}

impl std::fmt::Debug for DownstreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownstreamSession")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
