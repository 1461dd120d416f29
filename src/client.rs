//! # Client: producer-side handle.
//!
//! ```text
//! connect() ─► hello ─► challenge{nonce?} ─► sign_nonce(key) ─► proof ─► bool
//! submit(msg) ─► Processor::admit ─► Submission ─► ack().await ─► ManagerAck
//! ```
//!
//! `connect()` never returns an error: a refused handshake yields `false`
//! and the reason stays available through [`Client::last_error`].
//! Dropping a client closes its session.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::auth::{Hello, Proof, SessionId, sign_nonce};
use crate::core::Processor;
use crate::error::{AdmissionError, AuthError, CancelError};
use crate::petitions::{ManagerAck, Message, PetitionId};

/// Producer handle bound to one [`Processor`].
pub struct Client {
    processor: Arc<Processor>,
    client_id: String,
    key: Option<Vec<u8>>,
    session: Option<SessionId>,
    last_error: Option<AuthError>,
}

impl Client {
    /// Creates a disconnected client.
    pub fn new(processor: Arc<Processor>, client_id: impl Into<String>) -> Self {
        Self {
            processor,
            client_id: client_id.into(),
            key: None,
            session: None,
            last_error: None,
        }
    }

    /// Sets the shared secret presented during [`connect`](Self::connect).
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Runs the handshake. Reconnecting closes the previous session first.
    ///
    /// Returns `true` on success; otherwise see [`last_error`](Self::last_error).
    pub fn connect(&mut self) -> bool {
        self.disconnect();

        let challenge = self.processor.hello(Hello {
            client_id: self.client_id.clone(),
        });
        let digest = match (challenge.nonce.as_deref(), self.key.as_deref()) {
            (Some(nonce), Some(key)) => match sign_nonce(key, nonce) {
                Ok(d) => Some(d),
                Err(e) => {
                    self.processor.close_session(challenge.session);
                    self.last_error = Some(e);
                    return false;
                }
            },
            _ => None,
        };

        match self.processor.prove(&Proof {
            session: challenge.session,
            digest,
        }) {
            Ok(session) => {
                self.session = Some(session.id);
                self.last_error = None;
                true
            }
            Err(e) => {
                self.last_error = Some(e);
                false
            }
        }
    }

    /// Why the last [`connect`](Self::connect) failed, if it did.
    pub fn last_error(&self) -> Option<&AuthError> {
        self.last_error.as_ref()
    }

    /// `true` after a successful handshake until [`disconnect`](Self::disconnect).
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Submits a message.
    ///
    /// # Errors
    /// [`AdmissionError::NotAuthenticated`] before a successful `connect`,
    /// otherwise whatever [`Processor::admit`] reports.
    pub fn submit(&self, message: Message) -> Result<Submission, AdmissionError> {
        let session = self.session.ok_or(AdmissionError::NotAuthenticated)?;
        self.processor.admit(session, message)
    }

    /// Asks the processor to cancel a running petition this client submitted.
    ///
    /// # Errors
    /// [`CancelError::NotAuthenticated`] before a successful `connect`,
    /// otherwise whatever [`Processor::cancel`] reports.
    pub async fn cancel(&self, id: impl Into<PetitionId>) -> Result<(), CancelError> {
        let session = self.session.ok_or(CancelError::NotAuthenticated)?;
        self.processor.cancel(session, &id.into()).await
    }

    /// Closes the session, if any.
    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            self.processor.close_session(session);
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// An admitted petition awaiting its ack.
#[derive(Debug)]
pub struct Submission {
    id: PetitionId,
    rx: oneshot::Receiver<ManagerAck>,
}

impl Submission {
    pub(crate) fn new(id: PetitionId, rx: oneshot::Receiver<ManagerAck>) -> Self {
        Self { id, rx }
    }

    /// Id of the admitted petition.
    pub fn id(&self) -> &PetitionId {
        &self.id
    }

    /// Waits for the ack sent after `on_finish`.
    ///
    /// If the processor goes away without acking, a failure ack is returned.
    pub async fn ack(self) -> ManagerAck {
        let Self { id, rx } = self;
        rx.await
            .unwrap_or_else(|_| ManagerAck::failure(id, "processor dropped the petition"))
    }
}
