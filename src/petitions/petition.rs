//! # Petition: one unit of work and its total order.
//!
//! A [`Petition`] is a tagged union over a real unit of work and the
//! shutdown sentinel. Both variants share **one** comparator, [`compare`],
//! built from an [`OrderKey`] so any two queue elements are always comparable.
//!
//! ## Order
//! ```text
//! OrderKey = (priority, rank, seq)
//!
//!   Real   { priority, seq } → (priority,  0, seq)
//!   Empty                    → (i64::MAX,  1, 0)
//! ```
//!
//! ## Rules
//! - Lower priority value is served earlier; ties go to the earlier admission (`seq`).
//! - The sentinel sorts after every real petition, whatever its priority.
//! - All sentinels compare equal to each other and to nothing else.
//! - `id`, `priority` and `action` are fixed at construction.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque action payload, interpreted only by the [`Manager`](crate::Manager).
pub type Action = serde_json::Value;

/// Petition identifier: either a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PetitionId {
    /// Integer identifier.
    Int(i64),
    /// String identifier.
    Str(Arc<str>),
}

impl fmt::Display for PetitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PetitionId::Int(n) => write!(f, "{n}"),
            PetitionId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for PetitionId {
    fn from(n: i64) -> Self {
        PetitionId::Int(n)
    }
}

impl From<&str> for PetitionId {
    fn from(s: &str) -> Self {
        PetitionId::Str(Arc::from(s))
    }
}

impl From<String> for PetitionId {
    fn from(s: String) -> Self {
        PetitionId::Str(Arc::from(s))
    }
}

/// Lifecycle of a petition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetitionState {
    /// Admitted and waiting in the queue.
    Pending,
    /// Handed to the manager via `on_start`.
    Running,
    /// `on_finish` has been called.
    Finished,
}

/// Sort key shared by every petition variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    priority: i64,
    rank: u8,
    seq: u64,
}

/// A real unit of work.
#[derive(Debug, Clone)]
pub struct Job {
    id: PetitionId,
    priority: i64,
    seq: u64,
    action: Action,
    state: PetitionState,
}

/// Shutdown sentinel. Carries no payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyPetition;

/// A queue element: real work or the shutdown sentinel.
#[derive(Debug, Clone)]
pub enum Petition {
    /// A unit of work.
    Real(Job),
    /// The sentinel that drains and stops the processor.
    Empty(EmptyPetition),
}

impl Petition {
    /// Creates a pending petition.
    ///
    /// The sequence number is assigned by the queue at admission.
    ///
    /// # Example
    /// ```
    /// use petitionvisor::{Petition, PetitionState};
    ///
    /// let p = Petition::new("build", 5, serde_json::json!({"cmd": "make"}));
    /// assert_eq!(p.priority(), 5);
    /// assert_eq!(p.state(), PetitionState::Pending);
    /// assert!(!p.is_sentinel());
    /// ```
    pub fn new(id: impl Into<PetitionId>, priority: i64, action: Action) -> Self {
        Petition::Real(Job {
            id: id.into(),
            priority,
            seq: 0,
            action,
            state: PetitionState::Pending,
        })
    }

    /// Creates the shutdown sentinel.
    pub fn sentinel() -> Self {
        Petition::Empty(EmptyPetition)
    }

    /// Returns `true` for the shutdown sentinel.
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Petition::Empty(_))
    }

    /// Petition id (`None` for the sentinel).
    pub fn id(&self) -> Option<&PetitionId> {
        match self {
            Petition::Real(job) => Some(&job.id),
            Petition::Empty(_) => None,
        }
    }

    /// Effective priority; the sentinel reports `i64::MAX`.
    pub fn priority(&self) -> i64 {
        match self {
            Petition::Real(job) => job.priority,
            Petition::Empty(_) => i64::MAX,
        }
    }

    /// Admission sequence number (`0` until admitted, always `0` for the sentinel).
    pub fn seq(&self) -> u64 {
        match self {
            Petition::Real(job) => job.seq,
            Petition::Empty(_) => 0,
        }
    }

    /// Action payload (`Null` for the sentinel).
    pub fn action(&self) -> &Action {
        static NULL: Action = Action::Null;
        match self {
            Petition::Real(job) => &job.action,
            Petition::Empty(_) => &NULL,
        }
    }

    /// Current lifecycle state; the sentinel is always `Pending`.
    pub fn state(&self) -> PetitionState {
        match self {
            Petition::Real(job) => job.state,
            Petition::Empty(_) => PetitionState::Pending,
        }
    }

    /// Canonical sort key.
    #[inline]
    pub fn order_key(&self) -> OrderKey {
        match self {
            Petition::Real(job) => OrderKey {
                priority: job.priority,
                rank: 0,
                seq: job.seq,
            },
            Petition::Empty(_) => OrderKey {
                priority: i64::MAX,
                rank: 1,
                seq: 0,
            },
        }
    }

    pub(crate) fn assign_seq(&mut self, seq: u64) {
        if let Petition::Real(job) = self {
            job.seq = seq;
        }
    }

    pub(crate) fn advance(&mut self, state: PetitionState) {
        if let Petition::Real(job) = self {
            job.state = state;
        }
    }

    /// Short label used in events and logs.
    pub(crate) fn label(&self) -> String {
        match self {
            Petition::Real(job) => job.id.to_string(),
            Petition::Empty(_) => "<sentinel>".to_string(),
        }
    }
}

/// Canonical comparator across all petition variants.
///
/// # Example
/// ```
/// use std::cmp::Ordering;
/// use petitionvisor::{Petition, compare};
///
/// let real = Petition::new(1, i64::MAX, serde_json::Value::Null);
/// assert_eq!(compare(&real, &Petition::sentinel()), Ordering::Less);
/// assert_eq!(compare(&Petition::sentinel(), &Petition::sentinel()), Ordering::Equal);
/// ```
#[inline]
pub fn compare(a: &Petition, b: &Petition) -> Ordering {
    a.order_key().cmp(&b.order_key())
}

impl PartialEq for Petition {
    fn eq(&self, other: &Self) -> bool {
        compare(self, other) == Ordering::Equal
    }
}

impl Eq for Petition {}

impl PartialOrd for Petition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(compare(self, other))
    }
}

impl Ord for Petition {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl fmt::Display for Petition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Petition::Real(job) => write!(
                f,
                "petition(id={}, priority={}, seq={})",
                job.id, job.priority, job.seq
            ),
            Petition::Empty(_) => f.write_str("petition(<sentinel>)"),
        }
    }
}
