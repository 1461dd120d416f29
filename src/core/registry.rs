//! # In-flight registry: petitions between `on_start` and their ack.
//!
//! The dispatch loop inserts a petition right before calling `on_start` and
//! takes it back when its completion is collected. The reply channel of the
//! originating client travels with the entry, so whoever removes an entry is
//! the one responsible for acknowledging it.
//!
//! ## Rules
//! - Entries are keyed by petition id; the queue guarantees id uniqueness.
//! - `take(id, seq)` only matches the exact admission (`seq`) that was started,
//!   so a late completion for an earlier petition with a reused id is stale.
//! - `drain()` empties the registry (grace exceeded, fatal exit).

use std::collections::HashMap;

use tokio::sync::{RwLock, oneshot};

use crate::auth::SessionId;
use crate::petitions::{ManagerAck, Petition, PetitionId};

/// A running petition and the channel its ack goes to.
pub(crate) struct InFlight {
    pub(crate) petition: Petition,
    pub(crate) reply: Option<oneshot::Sender<ManagerAck>>,
    pub(crate) owner: Option<SessionId>,
}

impl InFlight {
    /// Sends the ack, if anyone is still waiting for it.
    pub(crate) fn acknowledge(self, ack: ManagerAck) {
        if let Some(tx) = self.reply {
            let _ = tx.send(ack);
        }
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    running: RwLock<HashMap<PetitionId, InFlight>>,
}

impl Registry {
    pub(crate) async fn insert(&self, id: PetitionId, entry: InFlight) {
        self.running.write().await.insert(id, entry);
    }

    /// Removes the entry for `id` if it belongs to admission `seq`.
    pub(crate) async fn take(&self, id: &PetitionId, seq: u64) -> Option<InFlight> {
        let mut running = self.running.write().await;
        match running.get(id) {
            Some(entry) if entry.petition.seq() == seq => running.remove(id),
            _ => None,
        }
    }

    /// Snapshot of a running petition and the session that admitted it.
    pub(crate) async fn get(&self, id: &PetitionId) -> Option<(Petition, Option<SessionId>)> {
        self.running
            .read()
            .await
            .get(id)
            .map(|e| (e.petition.clone(), e.owner))
    }

    pub(crate) async fn contains(&self, id: &PetitionId) -> bool {
        self.running.read().await.contains_key(id)
    }

    /// Returns sorted list of running petition ids.
    pub(crate) async fn list(&self) -> Vec<PetitionId> {
        let running = self.running.read().await;
        let mut ids: Vec<PetitionId> = running.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) async fn len(&self) -> usize {
        self.running.read().await.len()
    }

    pub(crate) async fn is_empty(&self) -> bool {
        self.running.read().await.is_empty()
    }

    /// Atomically removes every entry, sorted by id.
    pub(crate) async fn drain(&self) -> Vec<(PetitionId, InFlight)> {
        let mut drained: Vec<(PetitionId, InFlight)> =
            self.running.write().await.drain().collect();
        drained.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn entry(id: &str, seq: u64) -> (PetitionId, InFlight) {
        let mut petition = Petition::new(id, 0, Value::Null);
        petition.assign_seq(seq);
        (
            PetitionId::from(id),
            InFlight {
                petition,
                reply: None,
                owner: Some(seq),
            },
        )
    }

    #[tokio::test]
    async fn take_requires_the_started_sequence() {
        let reg = Registry::default();
        let (id, e) = entry("a", 7);
        reg.insert(id.clone(), e).await;

        assert!(reg.take(&id, 3).await.is_none());
        assert!(reg.contains(&id).await);
        let (petition, owner) = reg.get(&id).await.unwrap();
        assert_eq!(petition.seq(), 7);
        assert_eq!(owner, Some(7));
        assert!(reg.take(&id, 7).await.is_some());
        assert!(reg.is_empty().await);
    }

    #[tokio::test]
    async fn list_and_drain_are_sorted() {
        let reg = Registry::default();
        for (name, seq) in [("c", 1), ("a", 2), ("b", 3)] {
            let (id, e) = entry(name, seq);
            reg.insert(id, e).await;
        }
        let expected: Vec<PetitionId> = ["a", "b", "c"].into_iter().map(PetitionId::from).collect();
        assert_eq!(reg.list().await, expected);

        let drained: Vec<PetitionId> = reg.drain().await.into_iter().map(|(id, _)| id).collect();
        assert_eq!(drained, expected);
        assert_eq!(reg.len().await, 0);
    }
}
