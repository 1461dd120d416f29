//! Liveness and failure-containment policies.
//!
//! This module groups the knobs that control **how often** the processor
//! proves liveness and **when** contained errors become fatal.
//!
//! ## Contents
//! - [`HeartbeatPolicy`] watchdog timeout, ping period and recovery boost
//! - [`ErrorBudgetPolicy`] consecutive-error threshold inside a sliding window
//!
//! ## Quick wiring
//! ```text
//! Config { heartbeat: HeartbeatPolicy, error_budget: ErrorBudgetPolicy, .. }
//!      └─► core::watchdog uses heartbeat.period() / boosted_period()
//!      └─► core::processor feeds contained errors into ErrorBudget
//! ```

mod error_budget;
mod heartbeat;

pub use error_budget::ErrorBudgetPolicy;
pub use heartbeat::HeartbeatPolicy;

pub(crate) use error_budget::ErrorBudget;
