// crates/switchboard-gateway/src/outbound.rs
// ============================================================================
// Module: Outbound Writer Handle
// Description: Serialized handle onto the gateway's single output writer.
// Purpose: Guarantee whole-line writes and bounded-queue backpressure.
// Dependencies: tokio, serde_json
// ============================================================================

//! ## Overview
//! All standard-output emissions flow through one bounded queue drained by a
//! single writer task, so every emitted line is a whole JSON object and
//! writes never interleave. Senders apply backpressure when the queue is
//! full; a queue that stays full past the stall deadline marks the handle
//! stalled, which the dispatcher treats as fatal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use switchboard_core::Notification;
use switchboard_core::Response;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outbound send failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OutboundError {
    /// The writer task has exited; standard output is unusable.
    #[error("output writer closed")]
    Closed,
    /// The write queue stayed full past the stall deadline.
    #[error("output write queue stalled")]
    Stalled,
}

/// Cloneable sender onto the single output writer.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    /// Bounded line queue drained by the writer task.
    tx: mpsc::Sender<String>,
    /// Stall deadline after which a full queue is fatal.
    stall_timeout: Duration,
    /// Set once a send has stalled; checked by the dispatcher loop.
    stalled: Arc<AtomicBool>,
}

impl OutboundSender {
    /// Wraps the writer queue sender.
    #[must_use]
    pub fn new(tx: mpsc::Sender<String>, stall_timeout: Duration) -> Self {
        Self {
            tx,
            stall_timeout,
            stalled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true once any send has stalled past the deadline.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Relaxed)
    }

    /// Sends a response line, waiting for queue capacity up to the stall
    /// deadline.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError`] when the writer is gone or the queue stalls.
    pub async fn send_response(&self, response: &Response) -> Result<(), OutboundError> {
        match serde_json::to_string(response) {
            Ok(line) => self.send_line(line).await,
            Err(err) => {
                warn!(%err, "response serialization failed");
                Ok(())
            }
        }
    }

    /// Sends a notification line, waiting for queue capacity up to the stall
    /// deadline.
    ///
    /// # Errors
    ///
    /// Returns [`OutboundError`] when the writer is gone or the queue stalls.
    pub async fn send_notification(&self, notification: &Notification) -> Result<(), OutboundError> {
        match serde_json::to_string(notification) {
            Ok(line) => self.send_line(line).await,
            Err(err) => {
                warn!(%err, "notification serialization failed");
                Ok(())
            }
        }
    }

    /// Forwards an already-serialized line without blocking.
    ///
    /// Used by session reader tasks relaying downstream notifications; a full
    /// queue drops the line rather than stalling downstream reads.
    pub fn try_send_raw(&self, line: String) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(line) {
            warn!("output queue full, dropping forwarded notification");
        }
    }

    /// Enqueues one line, converting a persistent stall into a fatal flag.
    async fn send_line(&self, line: String) -> Result<(), OutboundError> {
        match self.tx.try_send(line) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(OutboundError::Closed),
            Err(TrySendError::Full(line)) => {
                match tokio::time::timeout(self.stall_timeout, self.tx.send(line)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(OutboundError::Closed),
                    Err(_) => {
                        self.stalled.store(true, Ordering::Relaxed);
                        Err(OutboundError::Stalled)
                    }
                }
            }
        }
    }
}
