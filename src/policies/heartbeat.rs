//! # Heartbeat policy for the supervisor watchdog.
//!
//! [`HeartbeatPolicy`] controls how often the processor proves liveness:
//! - [`HeartbeatPolicy::timeout`] the supervisor's watchdog timeout;
//! - [`HeartbeatPolicy::interval`] the regular ping period (`0` = half the timeout);
//! - [`HeartbeatPolicy::boost_interval`] the faster period used while recovering;
//! - [`HeartbeatPolicy::boost_for`] how long the faster period lasts after an error.
//!
//! The effective period is always strictly shorter than the timeout.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use petitionvisor::HeartbeatPolicy;
//!
//! let hb = HeartbeatPolicy {
//!     timeout: Duration::from_secs(10),
//!     interval: Duration::ZERO,
//!     boost_interval: Duration::from_secs(1),
//!     boost_for: Duration::from_secs(30),
//! };
//! assert_eq!(hb.period(), Duration::from_secs(5));
//! assert_eq!(hb.boosted_period(), Duration::from_secs(1));
//!
//! // An interval that would let the supervisor time out is replaced.
//! let hb = HeartbeatPolicy { interval: Duration::from_secs(20), ..hb };
//! assert_eq!(hb.period(), Duration::from_secs(5));
//! ```

use std::time::Duration;

use crate::notify::SystemdNotifier;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Watchdog heartbeat policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeartbeatPolicy {
    /// Supervisor watchdog timeout.
    pub timeout: Duration,
    /// Regular ping period (`Duration::ZERO` = `timeout / 2`).
    pub interval: Duration,
    /// Ping period while recovering from a contained error.
    pub boost_interval: Duration,
    /// How long the boosted period lasts after the last contained error.
    pub boost_for: Duration,
}

impl Default for HeartbeatPolicy {
    /// Returns a policy with:
    /// - `timeout = 10s`;
    /// - `interval = 0` (5s effective);
    /// - `boost_interval = 1s`;
    /// - `boost_for = 30s`.
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            interval: Duration::ZERO,
            boost_interval: Duration::from_secs(1),
            boost_for: Duration::from_secs(30),
        }
    }
}

impl HeartbeatPolicy {
    /// Default policy with the timeout taken from `$WATCHDOG_USEC` when systemd set it.
    pub fn from_env() -> Self {
        let mut policy = Self::default();
        if let Some(timeout) = SystemdNotifier::watchdog_timeout() {
            policy.timeout = timeout;
        }
        policy
    }

    /// Effective regular ping period, strictly shorter than `timeout`.
    pub fn period(&self) -> Duration {
        if self.interval > Duration::ZERO && self.interval < self.timeout {
            self.interval
        } else {
            (self.timeout / 2).max(MIN_PERIOD)
        }
    }

    /// Effective ping period while boosted (never slower than [`period`](Self::period)).
    pub fn boosted_period(&self) -> Duration {
        if self.boost_interval == Duration::ZERO {
            (self.period() / 4).max(MIN_PERIOD)
        } else {
            self.boost_interval.min(self.period())
        }
    }

    /// `true` when the configured interval is usable as-is.
    pub fn interval_is_valid(&self) -> bool {
        self.interval == Duration::ZERO || self.interval < self.timeout
    }
}
