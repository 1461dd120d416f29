//! Runtime core: configuration, dispatch loop and lifecycle.
//!
//! The public API from this module is [`Processor`], its [`ProcessorBuilder`],
//! [`ProcessorState`] and [`Config`].
//!
//! Internal modules:
//! - [`processor`]: admission, main loop, failure containment;
//! - [`watchdog`]: supervisor heartbeat on its own task;
//! - [`registry`]: petitions between `on_start` and their ack;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod config;
mod processor;
mod registry;
mod shutdown;
mod watchdog;

pub use builder::ProcessorBuilder;
pub use config::Config;
pub use processor::{Processor, ProcessorState};
