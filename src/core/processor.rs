//! # Processor: admission, dispatch loop, failure containment.
//!
//! The [`Processor`] owns the [`PetitionQueue`], the session table, the
//! in-flight registry and the supervisor watchdog. [`Processor::run`] is the
//! single consumer of the queue; any number of clients admit concurrently.
//!
//! ## State machine
//! ```text
//! INIT ──run()──► READY ──sentinel dequeued──► DRAINING ──registry empty──► STOPPED
//!                   │                              │
//!                   └──── error budget exhausted ──┴──────────────────────► STOPPED (fatal)
//! ```
//!
//! ## Loop
//! ```text
//!            ┌──────────────────── select (biased) ─────────────────────┐
//!            │ 1. completion from a Completion handle ─► collect()       │
//!            │       (stale completions are ignored)                     │
//!            │ 2. drain grace deadline (DRAINING only) ─► abandon stuck  │
//!            │ 3. queue.next_ready(look_ahead, is_ready) (READY only)    │
//!            │       ├─ sentinel ─► DRAINING                             │
//!            │       └─ petition ─► launch() ─► on_start(p, Completion)  │
//!            └───────────────────────────────────────────────────────────┘
//!   Ok  ─► error budget reset
//!   Err ─► contain(): CallbackFailed + out-of-band ping + boost, strike recorded
//!          strikes > max_errors within window ─► fatal exit
//! ```
//!
//! ## Rules
//! - `on_start`, `on_finish` and `on_cancel` run under one `manager_lock`;
//!   `is_ready` and `convert` never take it.
//! - Every admitted petition ends with exactly one ack (success, failure or
//!   abandoned), even on a fatal exit.
//! - A petition's id is released **before** its ack is sent, so the client can
//!   resubmit the same id as soon as the ack arrives.
//! - The fatal path never calls `notify_stopping`: the supervisor is expected
//!   to notice the silence and restart the service.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::auth::{Authenticator, Challenge, Hello, Proof, Session, SessionId};
use crate::client::{Client, Submission};
use crate::core::{
    config::Config,
    registry::{InFlight, Registry},
    shutdown,
    watchdog::Watchdog,
};
use crate::error::{
    AdmissionError, AuthError, CallbackStage, CancelError, ManagerCallbackError, ManagerError,
    RuntimeError,
};
use crate::events::{Bus, Event, EventKind};
use crate::manager::{Completed, Completion, ManagerRef};
use crate::notify::NotifierRef;
use crate::petitions::{
    ManagerAck, Message, Petition, PetitionId, PetitionQueue, PetitionState, Queued,
};
use crate::policies::ErrorBudget;
use crate::subscribers::SubscriberSet;

/// Lifecycle of a [`Processor`]. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcessorState {
    /// Built, `run` not called yet. Admission already works.
    Init,
    /// Dispatching petitions.
    Ready,
    /// Sentinel dequeued; finishing running petitions, admitting nothing.
    Draining,
    /// Terminal.
    Stopped,
}

/// One iteration's wake-up reason.
enum Step {
    Completed(Completed),
    Dequeued(Queued),
    GraceExpired,
}

/// The dispatch engine.
///
/// Build it with [`ProcessorBuilder`](crate::ProcessorBuilder), drive it with
/// [`run`](Self::run), feed it through [`Client`]s.
pub struct Processor {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    manager: ManagerRef,
    manager_lock: Mutex<()>,
    queue: Arc<PetitionQueue>,
    auth: Authenticator,
    notifier: NotifierRef,
    watchdog: Arc<Watchdog>,
    registry: Registry,
    completion_tx: mpsc::UnboundedSender<Completed>,
    completion_rx: Mutex<Option<mpsc::UnboundedReceiver<Completed>>>,
    state: watch::Sender<ProcessorState>,
    token: CancellationToken,
}

impl Processor {
    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        manager: ManagerRef,
        auth: Authenticator,
        notifier: NotifierRef,
    ) -> Self {
        let token = CancellationToken::new();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ProcessorState::Init);
        let watchdog = Watchdog::new(cfg.heartbeat, Arc::clone(&notifier), bus.clone());

        Self {
            queue: Arc::new(PetitionQueue::new(cfg.rescan)),
            cfg,
            bus,
            subs,
            manager,
            manager_lock: Mutex::new(()),
            auth,
            notifier,
            watchdog,
            registry: Registry::default(),
            completion_tx,
            completion_rx: Mutex::new(Some(completion_rx)),
            state,
            token,
        }
    }

    // ---------------------------
    // Main loop
    // ---------------------------

    /// Runs the dispatch loop until the sentinel drains or the error budget runs out.
    ///
    /// # Errors
    /// - [`RuntimeError::InvalidConfig`] before anything starts.
    /// - [`RuntimeError::AlreadyRunning`] on a second call.
    /// - [`RuntimeError::Watchdog`] if the heartbeat thread cannot start.
    /// - [`RuntimeError::ErrorBudgetExhausted`] on fatal escalation.
    /// - [`RuntimeError::GraceExceeded`] when draining outlived `drain_grace`.
    pub async fn run(self: &Arc<Self>) -> Result<(), RuntimeError> {
        self.cfg.validate()?;
        let mut completions = self
            .completion_rx
            .lock()
            .await
            .take()
            .ok_or(RuntimeError::AlreadyRunning)?;

        let heartbeat = self.watchdog.spawn().map_err(RuntimeError::Watchdog)?;
        if self.cfg.handle_os_signals {
            self.signal_listener();
        }
        self.enter_ready();

        let look_ahead = self.cfg.look_ahead();
        let mut budget = ErrorBudget::new(self.cfg.error_budget);
        let mut draining = false;
        let mut grace_deadline: Option<Instant> = None;

        let result = loop {
            if draining && self.registry.is_empty().await {
                break Ok(());
            }

            let step = tokio::select! {
                biased;
                Some(done) = completions.recv() => Step::Completed(done),
                _ = time::sleep_until(grace_deadline.unwrap_or_else(Instant::now)), if grace_deadline.is_some() => {
                    Step::GraceExpired
                }
                queued = self.queue.next_ready(look_ahead, |p| self.ready(p)), if !draining => {
                    Step::Dequeued(queued)
                }
                else => break Ok(()),
            };

            let outcome = match step {
                Step::Completed(done) => match self.registry.take(&done.id, done.seq).await {
                    Some(entry) => self.collect(done, entry).await,
                    None => {
                        self.bus.publish(
                            Event::new(EventKind::StaleCompletion)
                                .with_petition(done.id.to_string()),
                        );
                        continue;
                    }
                },
                Step::Dequeued(queued) if queued.petition.is_sentinel() => {
                    draining = true;
                    grace_deadline = self.cfg.drain_grace().map(|grace| Instant::now() + grace);
                    self.enter_draining().await;
                    Ok(())
                }
                Step::Dequeued(queued) => self.launch(queued).await,
                Step::GraceExpired => break Err(self.abandon_stuck().await),
            };

            match outcome {
                Ok(()) => budget.reset(),
                Err(err) => {
                    if let Some(fatal) = self.contain(&mut budget, err) {
                        self.fail_everything("processor stopped after repeated errors")
                            .await;
                        break Err(fatal);
                    }
                }
            }
        };

        self.enter_stopped(&result);
        heartbeat.join().await;
        result
    }

    /// Starts one petition: RUNNING, registered, then `on_start` under the lock.
    async fn launch(&self, queued: Queued) -> Result<(), ManagerCallbackError> {
        let Queued {
            mut petition,
            reply,
            owner,
        } = queued;
        let Some(id) = petition.id().cloned() else {
            return Ok(());
        };
        let seq = petition.seq();

        petition.advance(PetitionState::Running);
        self.registry
            .insert(
                id.clone(),
                InFlight {
                    petition: petition.clone(),
                    reply,
                    owner,
                },
            )
            .await;

        let done = Completion::new(id.clone(), seq, self.completion_tx.clone());
        match self
            .guarded(CallbackStage::Start, &id, self.manager.on_start(&petition, done))
            .await
        {
            Ok(()) => {
                self.bus.publish(
                    Event::new(EventKind::PetitionStarted)
                        .with_petition(id.to_string())
                        .with_priority(petition.priority()),
                );
                Ok(())
            }
            Err(err) => {
                if let Some(entry) = self.registry.take(&id, seq).await {
                    self.queue.release(&id);
                    self.publish_finished(&id, Some(&err.to_string()));
                    entry.acknowledge(ManagerAck::failure(id, err.to_string()));
                }
                Err(err)
            }
        }
    }

    /// Finishes one petition: `on_finish` under the lock, release, ack.
    async fn collect(&self, done: Completed, entry: InFlight) -> Result<(), ManagerCallbackError> {
        let Completed { id, outcome, .. } = done;
        let InFlight {
            mut petition,
            reply,
            owner,
        } = entry;

        let result = self
            .guarded(
                CallbackStage::Finish,
                &id,
                self.manager.on_finish(&petition, &outcome),
            )
            .await;
        petition.advance(PetitionState::Finished);
        self.queue.release(&id);

        let ack = match &result {
            Ok(()) => ManagerAck::from_outcome(id.clone(), &outcome),
            Err(err) => ManagerAck::failure(id.clone(), err.to_string()),
        };
        let failure = (!ack.success).then(|| ack.detail.clone().unwrap_or_default());
        self.publish_finished(&id, failure.as_deref());
        InFlight {
            petition,
            reply,
            owner,
        }
        .acknowledge(ack);
        result
    }

    /// Runs a manager callback under the manager lock, turning panics into errors.
    async fn guarded<F>(
        &self,
        stage: CallbackStage,
        id: &PetitionId,
        callback: F,
    ) -> Result<(), ManagerCallbackError>
    where
        F: Future<Output = Result<(), ManagerError>>,
    {
        let _lock = self.manager_lock.lock().await;
        invoke(stage, id, callback).await
    }

    /// `is_ready` without the manager lock; a panic counts as "not ready".
    fn ready(&self, petition: &Petition) -> bool {
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.manager.is_ready(petition))) {
            Ok(ready) => ready,
            Err(panic) => {
                tracing::warn!(
                    petition = %petition.label(),
                    info = %crate::panic_message(panic.as_ref()),
                    "is_ready panicked; petition treated as blocked"
                );
                false
            }
        }
    }

    // ---------------------------
    // Failure containment
    // ---------------------------

    /// Records a contained error; returns the fatal error once the budget is gone.
    fn contain(&self, budget: &mut ErrorBudget, err: ManagerCallbackError) -> Option<RuntimeError> {
        let exhausted = budget.record(Instant::now());
        self.watchdog.alert();
        self.bus.publish(
            Event::new(EventKind::CallbackFailed)
                .with_petition(err.petition.to_string())
                .with_reason(err.to_string())
                .with_count(budget.count()),
        );
        if !exhausted {
            return None;
        }

        let errors = budget.count();
        tracing::error!(errors, window = ?budget.window(), "error budget exhausted");
        self.bus
            .publish(Event::new(EventKind::ErrorBudgetExhausted).with_count(errors));
        Some(RuntimeError::ErrorBudgetExhausted {
            errors,
            window: budget.window(),
        })
    }

    /// Fatal exit: every pending and running petition gets a failure ack.
    async fn fail_everything(&self, reason: &str) {
        for Queued { petition, reply, .. } in self.queue.drain() {
            if let (Some(id), Some(tx)) = (petition.id(), reply) {
                let _ = tx.send(ManagerAck::failure(id.clone(), reason));
            }
        }
        for (id, entry) in self.registry.drain().await {
            self.queue.release(&id);
            entry.acknowledge(ManagerAck::failure(id, reason));
        }
    }

    /// Drain grace expired: abandon whatever is still running.
    async fn abandon_stuck(&self) -> RuntimeError {
        let grace = self.cfg.drain_grace;
        let mut stuck = Vec::new();
        for (id, entry) in self.registry.drain().await {
            self.queue.release(&id);
            stuck.push(id.to_string());
            entry.acknowledge(ManagerAck::failure(id, "abandoned: drain grace exceeded"));
        }
        self.bus
            .publish(Event::new(EventKind::GraceExceeded).with_count(stuck.len()));
        RuntimeError::GraceExceeded { grace, stuck }
    }

    // ---------------------------
    // Lifecycle transitions
    // ---------------------------

    fn enter_ready(&self) {
        self.state.send_replace(ProcessorState::Ready);
        if let Err(e) = self.notifier.notify_ready() {
            self.publish_heartbeat_failure(&e);
        }
        self.bus.publish(Event::new(EventKind::ProcessorReady));
    }

    async fn enter_draining(&self) {
        self.state.send_replace(ProcessorState::Draining);
        self.bus.publish(
            Event::new(EventKind::DrainStarted).with_count(self.registry.len().await),
        );
    }

    fn enter_stopped(&self, result: &Result<(), RuntimeError>) {
        self.watchdog.stop();
        let fatal = matches!(result, Err(e) if e.is_fatal());
        if !fatal {
            if let Err(e) = self.notifier.notify_stopping() {
                self.publish_heartbeat_failure(&e);
            }
        }
        self.state.send_replace(ProcessorState::Stopped);

        let mut ev = Event::new(EventKind::ProcessorStopped);
        if let Err(e) = result {
            ev = ev.with_reason(e.as_label());
        }
        self.bus.publish(ev);
        self.token.cancel();
    }

    // ---------------------------
    // Admission and sessions
    // ---------------------------

    /// Opens a session and returns its challenge.
    ///
    /// Sessions left unproven past `Config::handshake_timeout` are dropped first.
    pub fn hello(&self, hello: Hello) -> Challenge {
        let expired = self.auth.expire_unproven();
        if expired > 0 {
            self.bus
                .publish(Event::new(EventKind::SessionsExpired).with_count(expired));
        }
        self.auth.hello(hello)
    }

    /// Completes a handshake.
    ///
    /// # Errors
    /// [`AuthError`] describing why the proof was refused; the session is closed.
    pub fn prove(&self, proof: &Proof) -> Result<Session, AuthError> {
        let client = self.client_name(proof.session);
        let result = self.auth.prove(proof);
        let ev = match &result {
            Ok(_) => Event::new(EventKind::ClientConnected),
            Err(e) => Event::new(EventKind::ClientAuthFailed).with_reason(e.to_string()),
        };
        self.bus.publish(ev.with_client(client));
        result
    }

    /// Closes a session. Returns `false` if it was not open.
    pub fn close_session(&self, session: SessionId) -> bool {
        match self.auth.close(session) {
            Some(s) => {
                self.bus.publish(
                    Event::new(EventKind::ClientDisconnected).with_client(s.client_id),
                );
                true
            }
            None => false,
        }
    }

    /// Admits a message arriving on `session`.
    ///
    /// # Errors
    /// - [`AdmissionError::NotAuthenticated`] for an unauthenticated session.
    /// - [`AdmissionError::Rejected`] when [`Manager::convert`](crate::Manager::convert) refuses it.
    /// - [`AdmissionError::DuplicateId`] while the id is pending or running.
    /// - [`AdmissionError::ShuttingDown`] after shutdown was requested.
    pub fn admit(&self, session: SessionId, message: Message) -> Result<Submission, AdmissionError> {
        let client = self.client_name(session);
        let requested = message.id.clone();

        let admitted = self.auth.require(session).and_then(|()| {
            if self.queue.is_closed() {
                return Err(AdmissionError::ShuttingDown);
            }
            let petition = self.convert(message).ok_or_else(|| AdmissionError::Rejected {
                id: requested.clone(),
            })?;
            let id = petition.id().cloned().ok_or_else(|| AdmissionError::Rejected {
                id: requested.clone(),
            })?;
            let priority = petition.priority();
            let (tx, rx) = oneshot::channel();
            self.queue.admit(petition, Some(tx), Some(session))?;
            Ok((Submission::new(id, rx), priority))
        });

        match admitted {
            Ok((submission, priority)) => {
                self.bus.publish(
                    Event::new(EventKind::PetitionAdmitted)
                        .with_petition(submission.id().to_string())
                        .with_client(client)
                        .with_priority(priority),
                );
                Ok(submission)
            }
            Err(err) => {
                self.bus.publish(
                    Event::new(EventKind::PetitionRejected)
                        .with_petition(requested.to_string())
                        .with_client(client)
                        .with_reason(err.as_label()),
                );
                Err(err)
            }
        }
    }

    fn convert(&self, message: Message) -> Option<Petition> {
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.manager.convert(message))) {
            Ok(petition) => petition,
            Err(panic) => {
                tracing::warn!(
                    info = %crate::panic_message(panic.as_ref()),
                    "convert panicked; message rejected"
                );
                None
            }
        }
    }

    fn client_name(&self, session: SessionId) -> String {
        self.auth
            .session(session)
            .map(|s| s.client_id)
            .unwrap_or_else(|| format!("session-{session}"))
    }

    /// Creates a client bound to this processor.
    pub fn client(self: &Arc<Self>, client_id: impl Into<String>) -> Client {
        Client::new(Arc::clone(self), client_id)
    }

    // ---------------------------
    // Control
    // ---------------------------

    /// Requests a graceful shutdown by admitting the sentinel.
    ///
    /// Returns `false` if shutdown was already requested.
    pub fn shutdown(&self) -> bool {
        request_shutdown(&self.queue, &self.bus, "api")
    }

    /// Asks the manager to stop a running petition admitted on `session`.
    ///
    /// The manager is expected to finish the petition's [`Completion`]; the
    /// petition is acked through the normal collection path.
    ///
    /// # Errors
    /// - [`CancelError::NotAuthenticated`] for an unauthenticated session.
    /// - [`CancelError::NotOwner`] if another session admitted the petition.
    /// - [`CancelError::NotRunning`] if the id is unknown, pending or finished.
    /// - [`CancelError::Callback`] if `on_cancel` failed.
    pub async fn cancel(&self, session: SessionId, id: &PetitionId) -> Result<(), CancelError> {
        if self.auth.require(session).is_err() {
            return Err(self.refuse_cancel(session, id, CancelError::NotAuthenticated));
        }

        // The petition may finish while we wait for the lock; look it up under it.
        let _lock = self.manager_lock.lock().await;
        let petition = match self.registry.get(id).await {
            Some((petition, owner)) if owner.is_none_or(|o| o == session) => petition,
            Some(_) => {
                let err = CancelError::NotOwner { id: id.clone() };
                return Err(self.refuse_cancel(session, id, err));
            }
            None => return Err(CancelError::NotRunning { id: id.clone() }),
        };
        self.bus.publish(
            Event::new(EventKind::PetitionCancelRequested).with_petition(id.to_string()),
        );

        let result = invoke(CallbackStage::Cancel, id, self.manager.on_cancel(&petition)).await;
        if let Err(err) = &result {
            self.watchdog.alert();
            self.bus.publish(
                Event::new(EventKind::CallbackFailed)
                    .with_petition(id.to_string())
                    .with_reason(err.to_string()),
            );
        }
        result.map_err(CancelError::from)
    }

    fn refuse_cancel(&self, session: SessionId, id: &PetitionId, err: CancelError) -> CancelError {
        self.bus.publish(
            Event::new(EventKind::PetitionCancelRefused)
                .with_petition(id.to_string())
                .with_client(self.client_name(session))
                .with_reason(err.as_label()),
        );
        err
    }

    // ---------------------------
    // Introspection
    // ---------------------------

    /// `true` if the petition is between `on_start` and its ack.
    pub async fn is_running(&self, id: &PetitionId) -> bool {
        self.registry.contains(id).await
    }

    /// Sorted ids of running petitions.
    pub async fn running(&self) -> Vec<PetitionId> {
        self.registry.list().await
    }

    /// Pending queue entries (the sentinel included once shutdown was requested).
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessorState {
        *self.state.borrow()
    }

    /// Waits until the processor reached `target` (or a later state).
    pub async fn wait_for_state(&self, target: ProcessorState) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| *s >= target).await;
    }

    /// Event bus handle (publish or subscribe directly).
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Subscribes to runtime events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    // ---------------------------
    // Background tasks
    // ---------------------------

    /// Subscribes to the bus and forwards events to the subscriber set.
    ///
    /// Stops once the processor stopped and the buffered events were forwarded.
    pub(crate) fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        let token = self.token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber listener lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
        });
    }

    /// Turns an OS termination signal into a sentinel.
    fn signal_listener(&self) {
        let queue = Arc::clone(&self.queue);
        let bus = self.bus.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                res = shutdown::wait_for_shutdown_signal() => match res {
                    Ok(()) => {
                        request_shutdown(&queue, &bus, "signal");
                    }
                    Err(e) => tracing::warn!(error = %e, "cannot listen for termination signals"),
                },
            }
        });
    }

    fn publish_finished(&self, id: &PetitionId, failure: Option<&str>) {
        let mut ev = Event::new(EventKind::PetitionFinished).with_petition(id.to_string());
        if let Some(reason) = failure {
            ev = ev.with_reason(reason);
        }
        self.bus.publish(ev);
    }

    fn publish_heartbeat_failure(&self, err: &std::io::Error) {
        self.bus.publish(
            Event::new(EventKind::HeartbeatFailed)
                .with_client(self.notifier.name())
                .with_reason(err.to_string()),
        );
    }
}

/// Awaits a manager callback, turning a panic into [`ManagerError::Panicked`].
async fn invoke<F>(
    stage: CallbackStage,
    id: &PetitionId,
    callback: F,
) -> Result<(), ManagerCallbackError>
where
    F: Future<Output = Result<(), ManagerError>>,
{
    let source = match AssertUnwindSafe(callback).catch_unwind().await {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(err)) => err,
        Err(panic) => ManagerError::Panicked {
            info: crate::panic_message(panic.as_ref()),
        },
    };
    Err(ManagerCallbackError {
        stage,
        petition: id.clone(),
        source,
    })
}

fn request_shutdown(queue: &PetitionQueue, bus: &Bus, source: &'static str) -> bool {
    if !queue.shutdown() {
        return false;
    }
    bus.publish(Event::new(EventKind::ShutdownRequested).with_reason(source));
    true
}
