//! # SupervisorNotifier: liveness signalling to an external supervisor.
//!
//! ```text
//! INIT ──► READY ──notify_ready()──► ... notify_alive() every heartbeat ... ──► STOPPED ──notify_stopping()
//!                                    + out-of-band notify_alive() on contained errors
//! ```
//!
//! The transport (systemd notification socket, a test recorder, nothing at
//! all) lives behind this trait so the processor can be run and tested anywhere.

use std::io;

/// Liveness channel to the process supervisor.
///
/// Implementations must be cheap and non-blocking; they are called from the
/// heartbeat thread and from the dispatch loop.
pub trait SupervisorNotifier: Send + Sync + 'static {
    /// The service finished starting up.
    fn notify_ready(&self) -> io::Result<()>;

    /// The service is alive (watchdog ping).
    fn notify_alive(&self) -> io::Result<()>;

    /// The service is shutting down on purpose.
    fn notify_stopping(&self) -> io::Result<()>;

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Notifier for unsupervised runs: every call succeeds and does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl SupervisorNotifier for NoopNotifier {
    fn notify_ready(&self) -> io::Result<()> {
        Ok(())
    }

    fn notify_alive(&self) -> io::Result<()> {
        Ok(())
    }

    fn notify_stopping(&self) -> io::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
