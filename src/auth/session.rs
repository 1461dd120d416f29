//! Per-connection authentication state.
//!
//! A [`Session`] is created by `Hello`, flipped to authenticated by a valid
//! `Proof`, and removed on disconnect, on a failed proof, or when its
//! handshake is not completed in time. It never outlives its connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Session identifier, unique for the life of the processor.
pub type SessionId = u64;

/// Authentication state of one connection.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session id.
    pub id: SessionId,
    /// Name the client announced.
    pub client_id: String,
    /// Whether a shared secret was required when the session opened.
    pub key_required: bool,
    /// Nonce issued in the challenge.
    pub nonce: Option<String>,
    /// Set once the proof verified.
    pub authenticated: bool,
    /// When the `Hello` arrived.
    pub opened_at: Instant,
}

impl Session {
    /// `true` if the handshake is still pending after `timeout`.
    pub fn handshake_expired(&self, timeout: Duration, now: Instant) -> bool {
        !self.authenticated && now.saturating_duration_since(self.opened_at) >= timeout
    }
}

/// Table of open sessions.
#[derive(Default)]
pub(crate) struct SessionTable {
    sessions: Mutex<HashMap<SessionId, Session>>,
    next_id: AtomicU64,
}

impl SessionTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a session and returns its id.
    pub(crate) fn open(&self, client_id: String, nonce: Option<String>) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let session = Session {
            id,
            client_id,
            key_required: nonce.is_some(),
            nonce,
            authenticated: false,
            opened_at: Instant::now(),
        };
        self.lock().insert(id, session);
        id
    }

    pub(crate) fn get(&self, id: SessionId) -> Option<Session> {
        self.lock().get(&id).cloned()
    }

    pub(crate) fn mark_authenticated(&self, id: SessionId) -> bool {
        match self.lock().get_mut(&id) {
            Some(s) => {
                s.authenticated = true;
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_authenticated(&self, id: SessionId) -> bool {
        self.lock().get(&id).is_some_and(|s| s.authenticated)
    }

    pub(crate) fn remove(&self, id: SessionId) -> Option<Session> {
        self.lock().remove(&id)
    }

    /// Drops sessions whose handshake is still pending after `timeout`.
    ///
    /// Returns how many were removed.
    pub(crate) fn expire_unproven(&self, timeout: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !s.handshake_expired(timeout, now));
        before - sessions.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}
