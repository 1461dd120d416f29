//! # PetitionQueue: ordered container with bounded look-ahead dequeue.
//!
//! Holds admitted petitions in [`OrderKey`] order and hands them to a single
//! consumer (the processor loop). Any number of admitters may call
//! [`PetitionQueue::enqueue`] concurrently.
//!
//! ## Architecture
//! ```text
//! admitters (many)                         consumer (one)
//!   enqueue(p) ──► Mutex<Inner> ──notify──► dequeue_ready(look_ahead, is_ready)
//!                    ├─ pending: BTreeMap<OrderKey, Queued>
//!                    ├─ ids: HashSet<PetitionId>   (pending + running)
//!                    ├─ next_seq
//!                    └─ closed
//! ```
//!
//! ## Look-ahead scan
//! ```text
//! window = first `look_ahead` entries (head first)
//!   for (i, p) in window:
//!     sentinel → ready only when i == 0
//!     real     → ready when is_ready(p)
//!   first ready → removed and returned; skipped entries keep their order
//!   none ready  → wait for enqueue notification or the rescan tick
//! ```
//!
//! ## Rules
//! - `is_ready` is evaluated **outside** the queue lock, so admitters are never
//!   blocked by a slow readiness check.
//! - Ids stay reserved from admission until [`PetitionQueue::release`]
//!   (pending + running), so duplicates fail with `DuplicateId`.
//! - [`PetitionQueue::shutdown`] closes the queue to real petitions and admits
//!   exactly one sentinel; further calls are no-ops.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, oneshot};
use tokio::time;

use crate::auth::SessionId;
use crate::error::AdmissionError;

use super::message::ManagerAck;
use super::petition::{OrderKey, Petition, PetitionId};

/// A petition together with the channel its acknowledgement goes to.
#[derive(Debug)]
pub(crate) struct Queued {
    pub(crate) petition: Petition,
    pub(crate) reply: Option<oneshot::Sender<ManagerAck>>,
    /// Session that admitted the petition; only it may cancel the petition.
    pub(crate) owner: Option<SessionId>,
}

#[derive(Default)]
struct Inner {
    pending: BTreeMap<OrderKey, Queued>,
    ids: HashSet<PetitionId>,
    next_seq: u64,
    closed: bool,
}

/// Thread-safe ordered queue with bounded look-ahead.
pub struct PetitionQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    rescan: Duration,
}

impl PetitionQueue {
    /// Creates an empty queue.
    ///
    /// `rescan` is the periodic tick on which a blocked consumer re-evaluates
    /// readiness even without new admissions (clamped to at least 1ms).
    pub fn new(rescan: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            rescan: rescan.max(Duration::from_millis(1)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admits a petition, assigning its sequence number.
    ///
    /// Returns the assigned sequence number.
    ///
    /// # Errors
    /// - [`AdmissionError::DuplicateId`] if the id is pending or running.
    /// - [`AdmissionError::ShuttingDown`] once [`shutdown`](Self::shutdown) was called.
    pub fn enqueue(&self, petition: Petition) -> Result<u64, AdmissionError> {
        self.admit(petition, None, None)
    }

    pub(crate) fn admit(
        &self,
        mut petition: Petition,
        reply: Option<oneshot::Sender<ManagerAck>>,
        owner: Option<SessionId>,
    ) -> Result<u64, AdmissionError> {
        let seq = {
            let mut inner = self.lock();
            if inner.closed {
                return Err(AdmissionError::ShuttingDown);
            }
            if let Some(id) = petition.id() {
                if inner.ids.contains(id) {
                    return Err(AdmissionError::DuplicateId { id: id.clone() });
                }
                inner.ids.insert(id.clone());
            }
            inner.next_seq += 1;
            let seq = inner.next_seq;
            petition.assign_seq(seq);
            inner
                .pending
                .insert(petition.order_key(), Queued { petition, reply, owner });
            seq
        };
        self.notify.notify_waiters();
        Ok(seq)
    }

    /// Closes the queue to real petitions and admits the sentinel.
    ///
    /// Returns `true` only for the call that actually closed the queue.
    pub fn shutdown(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.closed {
                return false;
            }
            inner.closed = true;
            let sentinel = Petition::sentinel();
            inner.pending.insert(
                sentinel.order_key(),
                Queued {
                    petition: sentinel,
                    reply: None,
                    owner: None,
                },
            );
        }
        self.notify.notify_waiters();
        true
    }

    /// Frees a finished petition's id so it can be admitted again.
    ///
    /// Returns `false` if the id was not reserved.
    pub fn release(&self, id: &PetitionId) -> bool {
        self.lock().ids.remove(id)
    }

    /// Waits for the first ready petition within the look-ahead window and removes it.
    ///
    /// `look_ahead = 0` behaves like `1`. See the module docs for the scan rules.
    pub async fn dequeue_ready<F>(&self, look_ahead: usize, is_ready: F) -> Petition
    where
        F: Fn(&Petition) -> bool,
    {
        self.next_ready(look_ahead, is_ready).await.petition
    }

    /// Non-blocking variant of [`dequeue_ready`](Self::dequeue_ready).
    pub fn try_dequeue_ready<F>(&self, look_ahead: usize, is_ready: F) -> Option<Petition>
    where
        F: Fn(&Petition) -> bool,
    {
        self.scan(look_ahead, &is_ready).map(|q| q.petition)
    }

    pub(crate) async fn next_ready<F>(&self, look_ahead: usize, is_ready: F) -> Queued
    where
        F: Fn(&Petition) -> bool,
    {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(q) = self.scan(look_ahead, &is_ready) {
                return q;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = time::sleep(self.rescan) => {}
            }
        }
    }

    fn scan<F>(&self, look_ahead: usize, is_ready: &F) -> Option<Queued>
    where
        F: Fn(&Petition) -> bool,
    {
        let window: Vec<Petition> = self
            .lock()
            .pending
            .values()
            .take(look_ahead.max(1))
            .map(|q| q.petition.clone())
            .collect();

        let pick = window
            .iter()
            .enumerate()
            .find(|(i, p)| {
                if p.is_sentinel() {
                    *i == 0
                } else {
                    is_ready(p)
                }
            })
            .map(|(_, p)| p.order_key())?;

        self.lock().pending.remove(&pick)
    }

    /// Removes every pending entry (used when the processor dies).
    pub(crate) fn drain(&self) -> Vec<Queued> {
        let mut inner = self.lock();
        inner.closed = true;
        let drained = std::mem::take(&mut inner.pending);
        drained.into_values().collect()
    }

    /// Number of pending entries (the sentinel included).
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// `true` once [`shutdown`](Self::shutdown) was called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// `true` if the id is pending or running.
    pub fn contains(&self, id: &PetitionId) -> bool {
        self.lock().ids.contains(id)
    }
}

impl Default for PetitionQueue {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}
