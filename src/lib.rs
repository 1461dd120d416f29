//! # petitionvisor
//!
//! **Petitionvisor** is a host-local dispatch engine: it accepts units of work
//! ("petitions") from authenticated clients, orders them in a priority queue
//! with bounded look-ahead, and hands them to an embedding application's
//! [`Manager`] one callback at a time, while proving liveness to an external
//! process supervisor.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │    Client    │   │    Client    │   │    Client    │
//!     │ connect()    │   │ submit(msg)  │   │ cancel(id)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Processor                                                        │
//! │  - Authenticator (sessions, HMAC challenge/response)              │
//! │  - PetitionQueue (priority, seq) + look-ahead                     │
//! │  - Registry (running petitions and their ack channels)            │
//! │  - manager_lock (serializes on_start / on_finish / on_cancel)     │
//! │  - Watchdog (own thread: notify_alive every heartbeat period)     │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!   Manager::on_start   Completion::finish  Manager::on_finish │
//!   (under the lock)    (any task, later)   (under the lock)   │
//!        │                                                     │
//!        ▼                                                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                    (capacity: Config::bus_capacity)               │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                            SubscriberSet
//!                          (per-sub queues)
//!                        ┌──────────┼──────────┐
//!                        ▼          ▼          ▼
//!                    LogWriter   metrics     custom
//! ```
//!
//! ### Lifecycle
//! ```text
//! Message ──► convert ──► PetitionQueue ──► dequeue_ready(look_ahead, is_ready)
//!
//! loop {
//!   ├─► completion arrived ──► on_finish ──► release id ──► ManagerAck to client
//!   ├─► sentinel dequeued  ──► DRAINING (no more admissions)
//!   ├─► petition dequeued  ──► RUNNING ──► on_start(petition, Completion)
//!   │
//!   ├─ Ok  ──► error budget reset
//!   └─ Err ──► contained: CallbackFailed, out-of-band ping, boosted heartbeat
//!              └─ budget exhausted ──► failure acks for all, exit without STOPPING=1
//! }
//! DRAINING + nothing running ──► STOPPED (notify_stopping)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Dispatch**      | Priority queue, look-ahead, serialized callbacks.            | [`Processor`], [`Manager`], [`Completion`]  |
//! | **Petitions**     | Totally ordered work items and their wire forms.             | [`Petition`], [`Message`], [`ManagerAck`]   |
//! | **Auth**          | Shared-secret challenge/response gating admission.           | [`Client`], [`Authenticator`]               |
//! | **Liveness**      | Ready/alive/stopping notifications, watchdog boost.          | [`SupervisorNotifier`], [`HeartbeatPolicy`] |
//! | **Subscriber API**| Hook into runtime events (logging, metrics).                 | [`Subscribe`], [`LogWriter`]                |
//! | **Errors**        | Typed errors with stable labels.                             | [`AdmissionError`], [`RuntimeError`]        |
//! | **Configuration** | Centralize runtime settings.                                 | [`Config`]                                  |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use petitionvisor::{
//!     Completion, Config, Manager, ManagerError, Message, Outcome, Petition, ProcessorBuilder,
//! };
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Manager for Echo {
//!     async fn on_start(&self, _p: &Petition, done: Completion) -> Result<(), ManagerError> {
//!         tokio::spawn(async move { done.succeed() });
//!         Ok(())
//!     }
//!     async fn on_finish(&self, _p: &Petition, _o: &Outcome) -> Result<(), ManagerError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config { handle_os_signals: false, ..Config::default() };
//!     let processor = ProcessorBuilder::new(cfg, Arc::new(Echo)).build();
//!     let runner = tokio::spawn({
//!         let processor = Arc::clone(&processor);
//!         async move { processor.run().await }
//!     });
//!
//!     let mut client = processor.client("example");
//!     assert!(client.connect());
//!     let ack = client.submit(Message::new("hello", serde_json::json!({"cmd": "true"})))?.ack().await;
//!     assert!(ack.success);
//!
//!     processor.shutdown();
//!     runner.await??;
//!     Ok(())
//! }
//! ```

mod auth;
mod client;
mod core;
mod error;
mod events;
mod manager;
mod notify;
mod petitions;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use auth::{
    Authenticator, Challenge, Hello, NONCE_LEN, Proof, Session, SessionId, Verdict, sign_nonce,
};
pub use client::{Client, Submission};
pub use self::core::{Config, Processor, ProcessorBuilder, ProcessorState};
pub use error::{
    AdmissionError, AuthError, CallbackStage, CancelError, ManagerCallbackError, ManagerError,
    RuntimeError,
};
pub use events::{Bus, Event, EventKind};
pub use manager::{Completion, Manager, ManagerRef};
pub use notify::{NoopNotifier, NotifierRef, SupervisorNotifier, SystemdNotifier};
pub use petitions::{
    Action, EmptyPetition, Job, ManagerAck, Message, OrderKey, Outcome, Petition, PetitionId,
    PetitionQueue, PetitionState, compare,
};
pub use policies::{ErrorBudgetPolicy, HeartbeatPolicy};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
