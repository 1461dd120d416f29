//! # Error budget for the dispatch loop.
//!
//! [`ErrorBudgetPolicy`] decides when contained errors stop being "contained":
//! more than [`ErrorBudgetPolicy::max_errors`] consecutive errors inside a
//! sliding [`ErrorBudgetPolicy::window`] escalate to a fatal exit.
//!
//! ## Rules
//! - Each contained error records a strike at the current instant.
//! - Strikes older than `window` fall out of the count.
//! - A successful iteration clears all strikes (errors must be consecutive).
//! - The budget is exhausted when the count **exceeds** `max_errors`.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Fatal escalation threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorBudgetPolicy {
    /// Strikes tolerated inside the window.
    pub max_errors: usize,
    /// Sliding window length.
    pub window: Duration,
}

impl Default for ErrorBudgetPolicy {
    /// Returns `max_errors = 5`, `window = 60s`.
    fn default() -> Self {
        Self {
            max_errors: 5,
            window: Duration::from_secs(60),
        }
    }
}

/// Sliding-window strike counter driven by an [`ErrorBudgetPolicy`].
#[derive(Debug)]
pub(crate) struct ErrorBudget {
    policy: ErrorBudgetPolicy,
    strikes: VecDeque<Instant>,
}

impl ErrorBudget {
    pub(crate) fn new(policy: ErrorBudgetPolicy) -> Self {
        Self {
            policy,
            strikes: VecDeque::new(),
        }
    }

    /// Records a strike at `now`; returns `true` once the budget is exhausted.
    pub(crate) fn record(&mut self, now: Instant) -> bool {
        while let Some(first) = self.strikes.front() {
            if now.saturating_duration_since(*first) > self.policy.window {
                self.strikes.pop_front();
            } else {
                break;
            }
        }
        self.strikes.push_back(now);
        self.strikes.len() > self.policy.max_errors
    }

    /// Clears all strikes.
    pub(crate) fn reset(&mut self) {
        self.strikes.clear();
    }

    /// Strikes currently counted.
    pub(crate) fn count(&self) -> usize {
        self.strikes.len()
    }

    pub(crate) fn window(&self) -> Duration {
        self.policy.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(max_errors: usize, window_ms: u64) -> ErrorBudget {
        ErrorBudget::new(ErrorBudgetPolicy {
            max_errors,
            window: Duration::from_millis(window_ms),
        })
    }

    #[test]
    fn exhausts_only_when_threshold_is_exceeded() {
        let mut b = budget(2, 1_000);
        let t = Instant::now();
        assert!(!b.record(t));
        assert!(!b.record(t));
        assert!(b.record(t));
        assert_eq!(b.count(), 3);
    }

    #[test]
    fn old_strikes_leave_the_window() {
        let mut b = budget(1, 100);
        let t = Instant::now();
        assert!(!b.record(t));
        assert!(!b.record(t + Duration::from_millis(150)));
        assert_eq!(b.count(), 1);
    }

    #[test]
    fn reset_requires_errors_to_be_consecutive() {
        let mut b = budget(1, 1_000);
        let t = Instant::now();
        assert!(!b.record(t));
        b.reset();
        assert!(!b.record(t));
    }
}
