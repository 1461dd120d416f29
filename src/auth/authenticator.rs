//! # Authenticator: gates admission behind the connect handshake.
//!
//! ## Flow
//! ```text
//! hello(Hello)  ─► open session ─► Challenge { session, nonce? }
//! prove(Proof)  ─► verify ─┬─ Ok  → session.authenticated = true
//!                          └─ Err → session removed, AuthError returned
//! (any call)    ─► sessions unproven after `handshake_timeout` are dropped
//! require(id)   ─► Ok if authenticated, else NotAuthenticated
//! close(id)     ─► session removed
//! ```
//!
//! ## Outcomes
//! | secret configured | digest in proof | result                 |
//! |-------------------|-----------------|------------------------|
//! | no                | any             | Ok                     |
//! | yes               | none            | `MissingKey`           |
//! | yes               | not hex / size  | `MalformedHandshake`   |
//! | yes               | wrong           | `DigestMismatch`       |
//! | yes               | right           | Ok                     |
//! | any               | any, too late   | `HandshakeExpired`     |

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{AdmissionError, AuthError};

use super::digest;
use super::handshake::{Challenge, Hello, Proof};
use super::session::{Session, SessionId, SessionTable};

/// Validates handshakes against an optional shared secret and owns the session table.
pub struct Authenticator {
    secret: Option<Arc<[u8]>>,
    sessions: SessionTable,
    handshake_timeout: Option<Duration>,
}

impl Authenticator {
    /// Creates an authenticator; `None` accepts every client.
    pub fn new(secret: Option<Vec<u8>>) -> Self {
        Self {
            secret: secret.map(Arc::from),
            sessions: SessionTable::default(),
            handshake_timeout: None,
        }
    }

    /// Drops sessions that do not complete the handshake within `timeout`.
    ///
    /// `Duration::ZERO` keeps unproven sessions until they are closed.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// `true` when clients must prove knowledge of the shared secret.
    pub fn requires_key(&self) -> bool {
        self.secret.is_some()
    }

    /// Opens a session and issues the challenge.
    pub fn hello(&self, hello: Hello) -> Challenge {
        self.expire_unproven();
        let nonce = self.secret.as_ref().map(|_| digest::new_nonce());
        let session = self.sessions.open(hello.client_id, nonce.clone());
        Challenge { session, nonce }
    }

    /// Verifies a proof. A failed proof closes the session.
    ///
    /// Returns the authenticated session on success.
    pub fn prove(&self, proof: &Proof) -> Result<Session, AuthError> {
        let Some(session) = self.sessions.get(proof.session) else {
            return Err(AuthError::UnknownSession);
        };
        let now = Instant::now();
        if self
            .handshake_timeout
            .is_some_and(|timeout| session.handshake_expired(timeout, now))
        {
            self.sessions.remove(session.id);
            return Err(AuthError::HandshakeExpired);
        }

        match self.check(&session, proof.digest.as_deref()) {
            Ok(()) => {
                if !self.sessions.mark_authenticated(session.id) {
                    return Err(AuthError::UnknownSession);
                }
                Ok(Session {
                    authenticated: true,
                    ..session
                })
            }
            Err(e) => {
                self.sessions.remove(session.id);
                Err(e)
            }
        }
    }

    fn check(&self, session: &Session, digest: Option<&str>) -> Result<(), AuthError> {
        if session.authenticated {
            return Err(AuthError::malformed("handshake already completed"));
        }
        let Some(secret) = self.secret.as_deref() else {
            return Ok(());
        };
        let Some(nonce) = session.nonce.as_deref() else {
            return Err(AuthError::malformed("no challenge was issued for this session"));
        };
        match digest {
            None => Err(AuthError::MissingKey),
            Some(d) => digest::verify(secret, nonce, d),
        }
    }

    /// Admission gate for messages arriving on `session`.
    pub fn require(&self, session: SessionId) -> Result<(), AdmissionError> {
        if self.sessions.is_authenticated(session) {
            Ok(())
        } else {
            Err(AdmissionError::NotAuthenticated)
        }
    }

    /// Snapshot of an open session.
    pub fn session(&self, id: SessionId) -> Option<Session> {
        self.sessions.get(id)
    }

    /// Destroys a session (disconnect).
    pub fn close(&self, session: SessionId) -> Option<Session> {
        self.sessions.remove(session)
    }

    /// Drops unproven sessions older than the handshake timeout.
    ///
    /// Returns how many were removed; always `0` without a timeout.
    pub fn expire_unproven(&self) -> usize {
        match self.handshake_timeout {
            Some(timeout) => self.sessions.expire_unproven(timeout),
            None => 0,
        }
    }

    /// Number of open sessions.
    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }
}
