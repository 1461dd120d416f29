//! # Watchdog: supervisor heartbeat on an independent timer.
//!
//! The watchdog runs on its own OS thread, not on the async runtime, so an
//! `on_start` that blocks its worker thread (or a stalled current-thread
//! runtime) never delays a ping.
//!
//! ## Timeline
//! ```text
//! normal:   ──ping──────period──────ping──────period──────ping──
//! alert():  ──ping(now)──boost──ping──boost──ping── ... (boost_for) ──period──
//! stop():   thread exits; no further pings
//! ```
//!
//! ## Rules
//! - `alert()` pings **synchronously** and then switches the thread to the boosted period.
//! - Every further `alert()` extends the boost window.
//! - A failed ping publishes `HeartbeatFailed`; the thread keeps running.
//! - Dropping the [`Heartbeat`] handle stops the thread.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::events::{Bus, Event, EventKind};
use crate::notify::NotifierRef;
use crate::policies::HeartbeatPolicy;

/// Wake-ups for the heartbeat thread.
enum Signal {
    Boost,
    Stop,
}

pub(crate) struct Watchdog {
    policy: HeartbeatPolicy,
    notifier: NotifierRef,
    bus: Bus,
    tx: Mutex<Option<Sender<Signal>>>,
}

impl Watchdog {
    pub(crate) fn new(policy: HeartbeatPolicy, notifier: NotifierRef, bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            policy,
            notifier,
            bus,
            tx: Mutex::new(None),
        })
    }

    fn sender(&self) -> MutexGuard<'_, Option<Sender<Signal>>> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the heartbeat thread.
    pub(crate) fn spawn(self: &Arc<Self>) -> io::Result<Heartbeat> {
        let (tx, rx) = mpsc::channel();
        *self.sender() = Some(tx);
        let me = Arc::clone(self);
        let thread = thread::Builder::new()
            .name("petitionvisor-watchdog".to_string())
            .spawn(move || me.beat(&rx))
            .inspect_err(|_| {
                self.sender().take();
            })?;

        Ok(Heartbeat {
            watchdog: Arc::clone(self),
            thread: Some(thread),
        })
    }

    /// Out-of-band ping plus a temporary switch to the boosted period.
    pub(crate) fn alert(&self) {
        self.ping();
        if let Some(tx) = self.sender().as_ref() {
            let _ = tx.send(Signal::Boost);
        }
    }

    /// Stops the heartbeat thread without telling the supervisor anything.
    pub(crate) fn stop(&self) {
        if let Some(tx) = self.sender().take() {
            let _ = tx.send(Signal::Stop);
        }
    }

    fn ping(&self) {
        if let Err(e) = self.notifier.notify_alive() {
            self.bus.publish(
                Event::new(EventKind::HeartbeatFailed)
                    .with_client(self.notifier.name())
                    .with_reason(e.to_string()),
            );
        }
    }

    fn beat(&self, rx: &mpsc::Receiver<Signal>) {
        let mut boosted_until: Option<Instant> = None;

        loop {
            let period = match boosted_until {
                Some(until) if Instant::now() < until => self.policy.boosted_period(),
                _ => {
                    boosted_until = None;
                    self.policy.period()
                }
            };

            match rx.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => self.ping(),
                Ok(Signal::Boost) => {
                    if boosted_until.is_none() {
                        self.bus.publish(Event::new(EventKind::HeartbeatBoosted));
                    }
                    boosted_until = Some(Instant::now() + self.policy.boost_for);
                }
                Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}

/// Handle to a running heartbeat thread.
pub(crate) struct Heartbeat {
    watchdog: Arc<Watchdog>,
    thread: Option<JoinHandle<()>>,
}

impl Heartbeat {
    /// Stops the thread and waits for it to exit.
    pub(crate) async fn join(mut self) {
        self.watchdog.stop();
        if let Some(thread) = self.thread.take() {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.watchdog.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::SupervisorNotifier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Pings(AtomicUsize);

    impl Pings {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl SupervisorNotifier for Pings {
        fn notify_ready(&self) -> io::Result<()> {
            Ok(())
        }
        fn notify_alive(&self) -> io::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn notify_stopping(&self) -> io::Result<()> {
            Ok(())
        }
    }

    fn policy(timeout_ms: u64) -> HeartbeatPolicy {
        HeartbeatPolicy {
            timeout: Duration::from_millis(timeout_ms),
            interval: Duration::ZERO,
            boost_interval: Duration::from_millis(20),
            boost_for: Duration::from_secs(5),
        }
    }

    #[test]
    fn pings_on_the_regular_period_and_stops_on_drop() {
        let pings = Arc::new(Pings::default());
        let wd = Watchdog::new(policy(200), pings.clone(), Bus::new(8));
        let heartbeat = wd.spawn().unwrap();

        thread::sleep(Duration::from_millis(550));
        let seen = pings.count();
        assert!((3..=6).contains(&seen), "{seen} pings in 550ms with a 100ms period");

        drop(heartbeat);
        let at_drop = pings.count();
        thread::sleep(Duration::from_millis(300));
        assert!(pings.count() <= at_drop + 1);
    }

    #[test]
    fn alert_pings_now_and_boosts() {
        let pings = Arc::new(Pings::default());
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let wd = Watchdog::new(policy(10_000), pings.clone(), bus);
        let _heartbeat = wd.spawn().unwrap();

        wd.alert();
        assert_eq!(pings.count(), 1);

        thread::sleep(Duration::from_millis(300));
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::HeartbeatBoosted);
        assert!(pings.count() >= 5, "only {} pings while boosted", pings.count());
    }

    #[test]
    fn alert_without_a_thread_still_pings() {
        let pings = Arc::new(Pings::default());
        let wd = Watchdog::new(policy(10_000), pings.clone(), Bus::new(8));
        wd.alert();
        wd.stop();
        assert_eq!(pings.count(), 1);
    }
}
