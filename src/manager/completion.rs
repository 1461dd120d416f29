//! # Completion handle handed to `on_start`.
//!
//! Decouples the (quick) start call from the (eventual) completion signal:
//!
//! ```text
//! on_start(p, done) ──► manager spawns work ──► done.finish(outcome)
//!                                                     │
//!                            completion channel ◄─────┘
//!                                    │
//!                       dispatch loop: collect ─► on_finish ─► ManagerAck
//! ```
//!
//! Dropping an unfinished handle reports [`Outcome::Failed`], so a petition can
//! never disappear without an acknowledgement.

use tokio::sync::mpsc;

use crate::petitions::{Outcome, PetitionId};

/// Completion report sent back to the dispatch loop.
#[derive(Debug)]
pub(crate) struct Completed {
    pub(crate) id: PetitionId,
    pub(crate) seq: u64,
    pub(crate) outcome: Outcome,
}

/// One-shot completion handle for a running petition.
#[derive(Debug)]
pub struct Completion {
    id: PetitionId,
    seq: u64,
    tx: Option<mpsc::UnboundedSender<Completed>>,
}

impl Completion {
    pub(crate) fn new(id: PetitionId, seq: u64, tx: mpsc::UnboundedSender<Completed>) -> Self {
        Self {
            id,
            seq,
            tx: Some(tx),
        }
    }

    /// Id of the petition this handle completes.
    pub fn id(&self) -> &PetitionId {
        &self.id
    }

    /// Reports the outcome. Returns `false` if the processor has already stopped.
    pub fn finish(mut self, outcome: Outcome) -> bool {
        self.send(outcome)
    }

    /// Shorthand for `finish(Outcome::success())`.
    pub fn succeed(self) -> bool {
        self.finish(Outcome::success())
    }

    /// Shorthand for `finish(Outcome::failure(reason))`.
    pub fn fail(self, reason: impl Into<String>) -> bool {
        self.finish(Outcome::failure(reason))
    }

    fn send(&mut self, outcome: Outcome) -> bool {
        match self.tx.take() {
            Some(tx) => tx
                .send(Completed {
                    id: self.id.clone(),
                    seq: self.seq,
                    outcome,
                })
                .is_ok(),
            None => false,
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.send(Outcome::failure("completion handle dropped without a result"));
        }
    }
}
