//! # Processor configuration.
//!
//! Provides [`Config`] centralized settings for the dispatch runtime.
//!
//! ## Sentinel values
//! - `look_ahead = 0` → treated as `1` (strict priority order)
//! - `heartbeat.interval = 0s` → half of `heartbeat.timeout`
//! - `drain_grace = 0s` → wait for in-flight work indefinitely
//! - `handshake_timeout = 0s` → unproven sessions never expire
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

use crate::error::RuntimeError;
use crate::policies::{ErrorBudgetPolicy, HeartbeatPolicy};

/// Configuration for the processor runtime.
///
/// ## Field semantics
/// - `look_ahead`: how many queued petitions a dispatch may scan past a blocked head
/// - `heartbeat`: watchdog timeout, ping period and recovery boost
/// - `error_budget`: consecutive contained errors tolerated before a fatal exit
/// - `rescan`: periodic readiness re-scan while every petition in the window is blocked
/// - `drain_grace`: bound on the DRAINING phase (`0s` = unbounded)
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `handshake_timeout`: how long a session may stay unproven (`0s` = forever)
/// - `handle_os_signals`: SIGINT/SIGTERM/SIGQUIT start a graceful shutdown
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling
/// sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Look-ahead window for [`PetitionQueue::dequeue_ready`](crate::PetitionQueue::dequeue_ready).
    ///
    /// Values above 1 let ready petitions overtake a blocked head. Keep the
    /// window small: blocked high-priority work can only be overtaken by the
    /// petitions inside it.
    pub look_ahead: usize,

    /// Watchdog heartbeat policy.
    pub heartbeat: HeartbeatPolicy,

    /// Fatal escalation policy.
    pub error_budget: ErrorBudgetPolicy,

    /// Re-scan tick for a blocked look-ahead window.
    pub rescan: Duration,

    /// Maximum time spent DRAINING before giving up.
    ///
    /// - `Duration::ZERO` = wait until every running petition finished
    /// - `> 0` = after this long, stuck petitions get failure acks and `run`
    ///   returns `RuntimeError::GraceExceeded`
    pub drain_grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Time a client has between `Hello` and its `Proof`.
    ///
    /// Sessions still unproven after this long are dropped, so a peer that
    /// disconnects mid-handshake does not leave state behind.
    pub handshake_timeout: Duration,

    /// Whether `run` listens for OS termination signals.
    pub handle_os_signals: bool,
}

impl Config {
    /// Effective look-ahead window (at least 1).
    #[inline]
    pub fn look_ahead(&self) -> usize {
        self.look_ahead.max(1)
    }

    /// Returns the drain grace as an `Option`.
    ///
    /// - `None` → wait indefinitely
    /// - `Some(d)` → bounded drain
    #[inline]
    pub fn drain_grace(&self) -> Option<Duration> {
        if self.drain_grace == Duration::ZERO {
            None
        } else {
            Some(self.drain_grace)
        }
    }

    /// Returns the handshake timeout, `None` when unproven sessions never expire.
    #[inline]
    pub fn handshake_timeout(&self) -> Option<Duration> {
        (!self.handshake_timeout.is_zero()).then_some(self.handshake_timeout)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Rejects configurations the runtime cannot honour.
    ///
    /// # Errors
    /// [`RuntimeError::InvalidConfig`] when:
    /// - the heartbeat timeout is zero;
    /// - an explicit heartbeat interval is not strictly shorter than the timeout;
    /// - the error budget window is zero.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        let invalid = |reason: &str| {
            Err(RuntimeError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if self.heartbeat.timeout == Duration::ZERO {
            return invalid("heartbeat timeout must be greater than zero");
        }
        if !self.heartbeat.interval_is_valid() {
            return invalid("heartbeat interval must be shorter than the supervisor timeout");
        }
        if self.error_budget.window == Duration::ZERO {
            return invalid("error budget window must be greater than zero");
        }
        Ok(())
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `look_ahead = 1` (strict priority order)
    /// - `heartbeat = HeartbeatPolicy::default()` (10s timeout, 5s pings)
    /// - `error_budget = ErrorBudgetPolicy::default()` (5 errors / 60s)
    /// - `rescan = 500ms`
    /// - `drain_grace = 0s` (unbounded)
    /// - `bus_capacity = 1024`
    /// - `handshake_timeout = 10s`
    /// - `handle_os_signals = true`
    fn default() -> Self {
        Self {
            look_ahead: 1,
            heartbeat: HeartbeatPolicy::default(),
            error_budget: ErrorBudgetPolicy::default(),
            rescan: Duration::from_millis(500),
            drain_grace: Duration::ZERO,
            bus_capacity: 1024,
            handshake_timeout: Duration::from_secs(10),
            handle_os_signals: true,
        }
    }
}
