//! # Manager: the embedding application's callbacks.
//!
//! The processor never performs domain work itself. It converts messages into
//! petitions, decides **when** a petition runs, and calls back into a
//! [`Manager`] to actually start and finish it.
//!
//! ## Call discipline
//! ```text
//!                   manager_lock (one per processor)
//!                 ┌──────────────────────────────────┐
//! dispatch loop ─►│ on_start(p, done) │ on_finish(p) │◄─ never overlap
//! cancel(id)   ──►│ on_cancel(p)                     │
//!                 └──────────────────────────────────┘
//! look-ahead scan ─► is_ready(p)      (no lock)
//! admission       ─► convert(msg)     (no lock)
//! ```
//!
//! ## Rules
//! - `on_start`, `on_finish` and `on_cancel` across **all** petitions are
//!   serialized by the processor; a manager need not be internally ordered.
//! - `is_ready` and `convert` run without that lock and must only read state.
//! - `on_start` should return quickly. Completion is reported through the
//!   [`Completion`] handle, from any task, at any later time.
//! - Errors and panics are contained by the processor; the petition's client
//!   receives a failure ack.

use async_trait::async_trait;

use crate::error::ManagerError;
use crate::petitions::{Message, Outcome, Petition};

use super::completion::Completion;

/// # Externally supplied petition handler.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use petitionvisor::{Completion, Manager, ManagerError, Outcome, Petition};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Manager for Echo {
///     async fn on_start(&self, _p: &Petition, done: Completion) -> Result<(), ManagerError> {
///         tokio::spawn(async move { done.succeed() });
///         Ok(())
///     }
///
///     async fn on_finish(&self, _p: &Petition, _outcome: &Outcome) -> Result<(), ManagerError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Manager: Send + Sync + 'static {
    /// Converts an admitted message into a petition.
    ///
    /// Returning `None` rejects the message. The default keeps the id and
    /// payload and uses the message's priority hint (or `0`).
    fn convert(&self, message: Message) -> Option<Petition> {
        Some(Petition::from(message))
    }

    /// Whether the petition may start now. Defaults to always ready.
    ///
    /// Called without the manager lock during look-ahead scans.
    fn is_ready(&self, _petition: &Petition) -> bool {
        true
    }

    /// Starts the work for a petition.
    ///
    /// The `done` handle must eventually be finished (or dropped, which
    /// reports a failure).
    async fn on_start(&self, petition: &Petition, done: Completion) -> Result<(), ManagerError>;

    /// Invoked once the work reported its outcome.
    async fn on_finish(&self, petition: &Petition, outcome: &Outcome) -> Result<(), ManagerError>;

    /// Requests that a running petition stop early.
    ///
    /// The manager should finish the petition's [`Completion`] once the work
    /// actually stops. Default: ignore the request.
    async fn on_cancel(&self, _petition: &Petition) -> Result<(), ManagerError> {
        Ok(())
    }

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
