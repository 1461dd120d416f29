//! # Manager contract.
//!
//! - [`Manager`] - trait the embedding application implements
//! - [`ManagerRef`] - shared reference (`Arc<dyn Manager>`)
//! - [`Completion`] - handle used to report that started work has finished

mod completion;
#[allow(clippy::module_inception)]
mod manager;

use std::sync::Arc;

pub use completion::Completion;
pub use manager::Manager;

pub(crate) use completion::Completed;

/// Shared handle to a manager.
pub type ManagerRef = Arc<dyn Manager>;
