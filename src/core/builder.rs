use std::sync::Arc;

use crate::{
    auth::Authenticator,
    core::Config,
    events::Bus,
    manager::ManagerRef,
    notify::{NoopNotifier, NotifierRef},
    subscribers::{Subscribe, SubscriberSet},
};
use super::processor::Processor;

/// Builder for constructing a [`Processor`].
///
/// ```no_run
/// # use std::sync::Arc;
/// # use petitionvisor::{Config, LogWriter, ManagerRef, ProcessorBuilder, SystemdNotifier};
/// # async fn demo(manager: ManagerRef) {
/// let processor = ProcessorBuilder::new(Config::default(), manager)
///     .with_notifier(Arc::new(SystemdNotifier::from_env()))
///     .with_subscribers(vec![Arc::new(LogWriter)])
///     .with_secret(b"shared-secret".to_vec())
///     .build();
/// processor.run().await.ok();
/// # }
/// ```
pub struct ProcessorBuilder {
    cfg: Config,
    manager: ManagerRef,
    notifier: NotifierRef,
    subscribers: Vec<Arc<dyn Subscribe>>,
    secret: Option<Vec<u8>>,
}

impl ProcessorBuilder {
    /// Creates a new builder with the given configuration and manager.
    ///
    /// Defaults: [`NoopNotifier`], no subscribers, no shared secret.
    pub fn new(cfg: Config, manager: ManagerRef) -> Self {
        Self {
            cfg,
            manager,
            notifier: Arc::new(NoopNotifier),
            subscribers: Vec::new(),
            secret: None,
        }
    }

    /// Sets the supervisor notifier used for ready/alive/stopping signals.
    pub fn with_notifier(mut self, notifier: NotifierRef) -> Self {
        self.notifier = notifier;
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (lifecycle, petitions, containment)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Requires clients to prove knowledge of `secret` during the handshake.
    pub fn with_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Builds and returns the processor.
    ///
    /// Must be called inside a Tokio runtime: subscriber workers and the
    /// bus listener are spawned here so events published before
    /// [`Processor::run`] are delivered too.
    pub fn build(self) -> Arc<Processor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let auth = Authenticator::new(self.secret)
            .with_handshake_timeout(self.cfg.handshake_timeout);

        let processor = Arc::new(Processor::new_internal(
            self.cfg,
            bus,
            subs,
            self.manager,
            auth,
            self.notifier,
        ));
        processor.subscriber_listener();
        processor
    }
}
