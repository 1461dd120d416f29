//! # Runtime events emitted by the processor.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: processor state transitions (ready, draining, stopped)
//! - **Petition events**: admission, start, finish, cancel of individual petitions
//! - **Containment events**: contained callback errors, watchdog boosts, fatal escalation
//! - **Connection events**: handshake outcomes and disconnects
//!
//! The [`Event`] struct carries metadata such as timestamps, petition id,
//! client id and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use petitionvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::CallbackFailed)
//!     .with_petition("build-42")
//!     .with_reason("on_start failed: disk full");
//!
//! assert_eq!(ev.kind, EventKind::CallbackFailed);
//! assert_eq!(ev.petition.as_deref(), Some("build-42"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Lifecycle ===
    /// Processor entered READY and notified the supervisor.
    ProcessorReady,

    /// Shutdown requested (sentinel admitted, by API call or OS signal).
    ///
    /// Sets:
    /// - `reason`: `"api"` or `"signal"`
    ShutdownRequested,

    /// Sentinel dequeued; waiting for running petitions.
    ///
    /// Sets:
    /// - `count`: petitions still running
    DrainStarted,

    /// Processor reached STOPPED.
    ///
    /// Sets:
    /// - `reason`: set when the stop was not graceful
    ProcessorStopped,

    /// Drain grace expired with petitions still running.
    ///
    /// Sets:
    /// - `count`: stuck petitions
    GraceExceeded,

    // === Petitions ===
    /// Petition admitted into the queue.
    ///
    /// Sets:
    /// - `petition`, `client`, `priority`
    PetitionAdmitted,

    /// Message refused at admission.
    ///
    /// Sets:
    /// - `petition`, `client`
    /// - `reason`: admission error label
    PetitionRejected,

    /// `on_start` returned successfully.
    ///
    /// Sets:
    /// - `petition`, `priority`
    PetitionStarted,

    /// `on_finish` ran and the ack was sent.
    ///
    /// Sets:
    /// - `petition`
    /// - `reason`: failure detail, if any
    PetitionFinished,

    /// A running petition was asked to stop.
    ///
    /// Sets:
    /// - `petition`
    PetitionCancelRequested,

    /// A cancel request was refused (unauthenticated or foreign session).
    ///
    /// Sets:
    /// - `petition`
    /// - `client`
    /// - `reason`: cancel error label
    PetitionCancelRefused,

    /// Completion reported for a petition that is no longer running.
    ///
    /// Sets:
    /// - `petition`
    StaleCompletion,

    // === Containment ===
    /// A manager callback failed or panicked; the loop continued.
    ///
    /// Sets:
    /// - `petition`
    /// - `reason`: error message
    /// - `count`: strikes inside the error budget window
    CallbackFailed,

    /// The watchdog switched to its faster recovery period.
    HeartbeatBoosted,

    /// A supervisor notification could not be delivered.
    ///
    /// Sets:
    /// - `reason`: I/O error
    HeartbeatFailed,

    /// Consecutive errors exceeded the budget; the processor exits.
    ///
    /// Sets:
    /// - `count`: strikes inside the window
    ErrorBudgetExhausted,

    // === Connections ===
    /// Handshake succeeded.
    ///
    /// Sets:
    /// - `client`
    ClientConnected,

    /// Handshake failed.
    ///
    /// Sets:
    /// - `client`
    /// - `reason`: auth error message
    ClientAuthFailed,

    /// Session closed.
    ///
    /// Sets:
    /// - `client`
    ClientDisconnected,

    /// Sessions that never completed the handshake were dropped.
    ///
    /// Sets:
    /// - `count`: sessions removed
    SessionsExpired,

    // === Subscribers ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `client`: subscriber name
    /// - `reason`: panic info
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `client`: subscriber name
    /// - `reason`: `"full"` or `"closed"`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Petition id, if applicable.
    pub petition: Option<Arc<str>>,
    /// Client (or subscriber) name, if applicable.
    pub client: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Petition priority, if applicable.
    pub priority: Option<i64>,
    /// Counter attached to the event (strikes, running petitions, ...).
    pub count: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            petition: None,
            client: None,
            reason: None,
            priority: None,
            count: None,
        }
    }

    /// Attaches a petition id.
    #[inline]
    pub fn with_petition(mut self, id: impl Into<Arc<str>>) -> Self {
        self.petition = Some(id.into());
        self
    }

    /// Attaches a client name.
    #[inline]
    pub fn with_client(mut self, client: impl Into<Arc<str>>) -> Self {
        self.client = Some(client.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a priority.
    #[inline]
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Attaches a counter (saturating at `u32::MAX`).
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_client(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_client(subscriber)
            .with_reason(info)
    }

    /// `true` for events produced by the subscriber machinery itself.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
