//! # Supervisor notification.
//!
//! - [`SupervisorNotifier`] - ready / alive / stopping contract
//! - [`SystemdNotifier`] - `$NOTIFY_SOCKET` transport
//! - [`NoopNotifier`] - for runs without a supervisor

mod notifier;
mod systemd;

use std::sync::Arc;

pub use notifier::{NoopNotifier, SupervisorNotifier};
pub use systemd::SystemdNotifier;

/// Shared handle to a notifier.
pub type NotifierRef = Arc<dyn SupervisorNotifier>;
