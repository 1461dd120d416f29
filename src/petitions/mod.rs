//! # Petition data model and queue.
//!
//! - [`Petition`] - tagged union of real work and the shutdown sentinel, totally ordered
//! - [`Message`] - client request converted 1:1 into a petition at admission
//! - [`ManagerAck`] / [`Outcome`] - completion reporting
//! - [`PetitionQueue`] - ordered queue with bounded look-ahead dequeue

mod message;
mod petition;
mod queue;

pub use message::{ManagerAck, Message, Outcome};
pub use petition::{
    Action, EmptyPetition, Job, OrderKey, Petition, PetitionId, PetitionState, compare,
};
pub use queue::PetitionQueue;

pub(crate) use queue::Queued;
