//! # Tracing subscriber for runtime events.
//!
//! [`LogWriter`] turns every [`Event`] into a structured `tracing` record.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Levels
//! - `error`: fatal escalation, drain grace exceeded
//! - `warn`: contained callback failures, rejected admissions, heartbeat and auth failures
//! - `info`: lifecycle transitions and connections
//! - `debug`: per-petition traffic

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Structured logging subscriber built on `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Creates the subscriber; same as `LogWriter::default()`.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let petition = e.petition.as_deref().unwrap_or("-");
        let client = e.client.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::ProcessorReady => tracing::info!(seq = e.seq, "processor ready"),
            EventKind::ShutdownRequested => {
                tracing::info!(seq = e.seq, source = reason, "shutdown requested")
            }
            EventKind::DrainStarted => {
                tracing::info!(seq = e.seq, running = ?e.count, "draining")
            }
            EventKind::ProcessorStopped => {
                tracing::info!(seq = e.seq, reason, "processor stopped")
            }
            EventKind::GraceExceeded => {
                tracing::error!(seq = e.seq, stuck = ?e.count, "drain grace exceeded")
            }
            EventKind::PetitionAdmitted => tracing::debug!(
                seq = e.seq,
                petition,
                client,
                priority = ?e.priority,
                "petition admitted"
            ),
            EventKind::PetitionRejected => {
                tracing::warn!(seq = e.seq, petition, client, reason, "petition rejected")
            }
            EventKind::PetitionStarted => {
                tracing::debug!(seq = e.seq, petition, priority = ?e.priority, "petition started")
            }
            EventKind::PetitionFinished => {
                tracing::debug!(seq = e.seq, petition, reason, "petition finished")
            }
            EventKind::PetitionCancelRequested => {
                tracing::info!(seq = e.seq, petition, "petition cancel requested")
            }
            EventKind::PetitionCancelRefused => {
                tracing::warn!(seq = e.seq, petition, client, reason, "petition cancel refused")
            }
            EventKind::StaleCompletion => {
                tracing::debug!(seq = e.seq, petition, "stale completion ignored")
            }
            EventKind::CallbackFailed => tracing::warn!(
                seq = e.seq,
                petition,
                reason,
                strikes = ?e.count,
                "manager callback failed"
            ),
            EventKind::HeartbeatBoosted => tracing::info!(seq = e.seq, "heartbeat boosted"),
            EventKind::HeartbeatFailed => {
                tracing::warn!(seq = e.seq, reason, "heartbeat failed")
            }
            EventKind::ErrorBudgetExhausted => {
                tracing::error!(seq = e.seq, strikes = ?e.count, "error budget exhausted")
            }
            EventKind::ClientConnected => tracing::info!(seq = e.seq, client, "client connected"),
            EventKind::ClientAuthFailed => {
                tracing::warn!(seq = e.seq, client, reason, "client authentication failed")
            }
            EventKind::ClientDisconnected => {
                tracing::info!(seq = e.seq, client, "client disconnected")
            }
            EventKind::SessionsExpired => {
                tracing::debug!(seq = e.seq, expired = ?e.count, "unproven sessions expired")
            }
            EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => {}
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
