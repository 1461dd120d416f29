//! Error types used by the petitionvisor runtime, its clients and managers.
//!
//! This module defines the error enums shared across the crate:
//!
//! - [`AuthError`]: a connect handshake was refused.
//! - [`AdmissionError`]: a message could not be admitted into the queue.
//! - [`ManagerError`]: returned (or caught as a panic) from a [`Manager`](crate::Manager) callback.
//! - [`ManagerCallbackError`]: a [`ManagerError`] tagged with the stage and petition it hit.
//! - [`CancelError`]: a cancel request was refused or its callback failed.
//! - [`RuntimeError`]: errors raised by the dispatch loop itself.
//!
//! Every type provides `as_label` (stable snake_case label for logs/metrics).
//! Authentication, admission and cancel errors are connection-level and never
//! stop the processor; only [`RuntimeError`] ends [`Processor::run`](crate::Processor::run).

use std::time::Duration;

use thiserror::Error;

use crate::petitions::PetitionId;

/// # Handshake failures.
///
/// Surfaced to clients as a `false` result from [`Client::connect`](crate::Client::connect);
/// the variant is available through [`Client::last_error`](crate::Client::last_error).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The service requires a shared secret but the client did not present a digest.
    #[error("authentication key required but none was provided (maybe the key is missing?)")]
    MissingKey,

    /// The handshake frames could not be interpreted.
    #[error("malformed handshake: {reason}")]
    MalformedHandshake {
        /// What was wrong with the frame.
        reason: String,
    },

    /// The digest did not match the one computed with the shared secret.
    #[error("handshake digest mismatch (wrong key?)")]
    DigestMismatch,

    /// The proof referenced a session that is not open.
    #[error("unknown or expired session")]
    UnknownSession,

    /// The proof arrived after the handshake timeout.
    #[error("handshake not completed in time")]
    HandshakeExpired,
}

impl AuthError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use petitionvisor::AuthError;
    ///
    /// assert_eq!(AuthError::DigestMismatch.as_label(), "auth_digest_mismatch");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            AuthError::MissingKey => "auth_missing_key",
            AuthError::MalformedHandshake { .. } => "auth_malformed_handshake",
            AuthError::DigestMismatch => "auth_digest_mismatch",
            AuthError::UnknownSession => "auth_unknown_session",
            AuthError::HandshakeExpired => "auth_handshake_expired",
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        AuthError::MalformedHandshake {
            reason: reason.into(),
        }
    }
}

/// # Admission failures.
///
/// Raised when a client submits a message; the caller decides whether to
/// retry with another id or give up. None of these are fatal to the processor.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// A petition with the same id is still pending or running.
    #[error("petition with id {id} already exists")]
    DuplicateId {
        /// The conflicting id.
        id: PetitionId,
    },

    /// The session never completed (or failed) the connect handshake.
    #[error("session is not authenticated")]
    NotAuthenticated,

    /// The processor is draining; no new petitions are accepted.
    #[error("processor is shutting down - no more petitions are accepted")]
    ShuttingDown,

    /// The manager refused to turn the message into a petition.
    #[error("message {id} rejected by manager")]
    Rejected {
        /// Id carried by the rejected message.
        id: PetitionId,
    },
}

impl AdmissionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AdmissionError::DuplicateId { .. } => "admission_duplicate_id",
            AdmissionError::NotAuthenticated => "admission_not_authenticated",
            AdmissionError::ShuttingDown => "admission_shutting_down",
            AdmissionError::Rejected { .. } => "admission_rejected",
        }
    }
}

/// # Errors produced by manager callbacks.
///
/// Managers return [`ManagerError::Fail`]; the processor turns a panic inside a
/// callback into [`ManagerError::Panicked`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
    /// Callback failed.
    #[error("callback failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Callback panicked; the panic was caught at the loop boundary.
    #[error("callback panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl ManagerError {
    /// Shorthand for [`ManagerError::Fail`].
    ///
    /// # Example
    /// ```
    /// use petitionvisor::ManagerError;
    ///
    /// let err = ManagerError::fail("disk full");
    /// assert_eq!(err.to_string(), "callback failed: disk full");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        ManagerError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ManagerError::Fail { .. } => "manager_failed",
            ManagerError::Panicked { .. } => "manager_panicked",
        }
    }
}

/// Which manager callback raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStage {
    /// [`Manager::on_start`](crate::Manager::on_start).
    Start,
    /// [`Manager::on_finish`](crate::Manager::on_finish).
    Finish,
    /// [`Manager::on_cancel`](crate::Manager::on_cancel).
    Cancel,
}

impl CallbackStage {
    /// Returns the callback name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackStage::Start => "on_start",
            CallbackStage::Finish => "on_finish",
            CallbackStage::Cancel => "on_cancel",
        }
    }
}

impl std::fmt::Display for CallbackStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// # A manager callback error contained by the dispatch loop.
#[derive(Error, Debug, Clone)]
#[error("{stage} failed for petition {petition}: {source}")]
pub struct ManagerCallbackError {
    /// Callback that failed.
    pub stage: CallbackStage,
    /// Petition being handled.
    pub petition: PetitionId,
    /// What the callback reported.
    #[source]
    pub source: ManagerError,
}

impl ManagerCallbackError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        self.source.as_label()
    }
}

/// # Cancel request failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum CancelError {
    /// The request came from a session that has not completed the handshake.
    #[error("cancel refused: session is not authenticated")]
    NotAuthenticated,

    /// The petition was admitted by another session.
    #[error("petition {id} belongs to another session")]
    NotOwner {
        /// Requested id.
        id: PetitionId,
    },

    /// The petition is not running (unknown, still pending, or already finished).
    #[error("petition {id} not found or not running")]
    NotRunning {
        /// Requested id.
        id: PetitionId,
    },

    /// The manager's `on_cancel` failed.
    #[error(transparent)]
    Callback(#[from] ManagerCallbackError),
}

impl CancelError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CancelError::NotAuthenticated => "cancel_not_authenticated",
            CancelError::NotOwner { .. } => "cancel_not_owner",
            CancelError::NotRunning { .. } => "cancel_not_running",
            CancelError::Callback(_) => "cancel_callback_failed",
        }
    }
}

/// # Errors produced by the dispatch loop.
///
/// [`RuntimeError::ErrorBudgetExhausted`] is the fatal escalation path: the
/// processor stops notifying the supervisor and returns, leaving recovery to
/// the supervisor's restart policy.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Too many contained errors inside the sliding window.
    #[error("error budget exhausted: {errors} errors within {window:?}")]
    ErrorBudgetExhausted {
        /// Errors counted inside the window.
        errors: usize,
        /// The configured window.
        window: Duration,
    },

    /// `run` was called more than once.
    #[error("processor already running")]
    AlreadyRunning,

    /// Draining exceeded the configured grace period.
    #[error("drain grace {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Ids of petitions still running when the grace expired.
        stuck: Vec<String>,
    },

    /// The heartbeat thread could not be started.
    #[error("cannot start the heartbeat thread: {0}")]
    Watchdog(#[source] std::io::Error),

    /// Configuration rejected by [`Config::validate`](crate::Config::validate).
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Why the configuration is invalid.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use petitionvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::ErrorBudgetExhausted { errors: 6, window: Duration::from_secs(60) };
    /// assert_eq!(err.as_label(), "runtime_error_budget_exhausted");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::ErrorBudgetExhausted { .. } => "runtime_error_budget_exhausted",
            RuntimeError::AlreadyRunning => "runtime_already_running",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Watchdog(_) => "runtime_watchdog_failed",
            RuntimeError::InvalidConfig { .. } => "runtime_invalid_config",
        }
    }

    /// Returns `true` when the supervisor is expected to restart the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RuntimeError::ErrorBudgetExhausted { .. })
    }
}
