#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use petitionvisor::{
    Client, Completion, Config, Manager, ManagerError, Message, Outcome, Petition, Processor,
    ProcessorBuilder, RuntimeError, SupervisorNotifier,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Wall-clock instant; the heartbeat thread does not follow a paused test clock.
pub type WallClock = std::time::Instant;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config for tests: no OS signal handling, fast rescans.
pub fn test_config() -> Config {
    Config {
        handle_os_signals: false,
        rescan: Duration::from_millis(20),
        ..Config::default()
    }
}

pub fn build(cfg: Config, manager: Arc<TestManager>, notifier: Arc<RecordingNotifier>) -> Arc<Processor> {
    init_tracing();
    ProcessorBuilder::new(cfg, manager)
        .with_notifier(notifier)
        .with_subscribers(vec![Arc::new(petitionvisor::LogWriter)])
        .build()
}

/// Like [`build`], but clients must prove knowledge of `secret`.
pub fn build_keyed(
    cfg: Config,
    manager: Arc<TestManager>,
    notifier: Arc<RecordingNotifier>,
    secret: &str,
) -> Arc<Processor> {
    init_tracing();
    ProcessorBuilder::new(cfg, manager)
        .with_notifier(notifier)
        .with_subscribers(vec![Arc::new(petitionvisor::LogWriter)])
        .with_secret(secret.as_bytes().to_vec())
        .build()
}

pub fn spawn_run(processor: &Arc<Processor>) -> JoinHandle<Result<(), RuntimeError>> {
    let p = Arc::clone(processor);
    tokio::spawn(async move { p.run().await })
}

pub fn connected(processor: &Arc<Processor>, name: &str) -> Client {
    let mut client = processor.client(name);
    assert!(client.connect(), "connect failed: {:?}", client.last_error());
    client
}

pub fn msg(id: &str, priority: i64) -> Message {
    Message::new(id, serde_json::json!({ "id": id })).with_priority(priority)
}

/// Polls `cond` until it holds; panics after `limit`.
pub async fn eventually<F, Fut>(limit: Duration, mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + limit;
    while !cond().await {
        assert!(Instant::now() < deadline, "condition not met within {limit:?}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Instrumented manager.
///
/// - counts concurrent callback entries (`max_active`);
/// - completes petitions immediately when `auto_complete`, otherwise holds
///   their [`Completion`] until [`TestManager::complete`];
/// - refuses readiness for `blocked` ids, fails `on_start` for `fail_start` ids.
#[derive(Default)]
pub struct TestManager {
    active: AtomicUsize,
    max_active: AtomicUsize,
    cancels: AtomicUsize,
    pub auto_complete: bool,
    pub start_delay: Duration,
    pub blocking_start: Duration,
    pub fail_all_starts: bool,
    pub started: Mutex<Vec<String>>,
    pub finished: Mutex<Vec<String>>,
    pub start_spans: Mutex<Vec<(WallClock, WallClock)>>,
    pub blocked: Mutex<HashSet<String>>,
    pub fail_start: Mutex<HashSet<String>>,
    pub reject: Mutex<HashSet<String>>,
    held: Mutex<HashMap<String, Completion>>,
}

impl TestManager {
    pub fn auto() -> Self {
        Self {
            auto_complete: true,
            ..Self::default()
        }
    }

    pub fn manual() -> Self {
        Self::default()
    }

    /// Makes every `on_start` take `delay` before returning.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Makes every `on_start` block its thread for `delay`.
    pub fn with_blocking_start(mut self, delay: Duration) -> Self {
        self.blocking_start = delay;
        self
    }

    pub fn block(&self, id: &str) {
        self.blocked.lock().unwrap().insert(id.to_string());
    }

    pub fn unblock(&self, id: &str) {
        self.blocked.lock().unwrap().remove(id);
    }

    pub fn fail_on_start(&self, id: &str) {
        self.fail_start.lock().unwrap().insert(id.to_string());
    }

    /// Finishes a held petition successfully.
    pub fn complete(&self, id: &str) -> bool {
        let done = self.held.lock().unwrap().remove(id);
        done.map(|d| d.succeed()).unwrap_or(false)
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    /// Number of `on_cancel` calls.
    pub fn cancelled(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn id_of(p: &Petition) -> String {
    p.id().map(|id| id.to_string()).unwrap_or_default()
}

#[async_trait]
impl Manager for TestManager {
    fn convert(&self, message: Message) -> Option<Petition> {
        if self.reject.lock().unwrap().contains(&message.id.to_string()) {
            return None;
        }
        Some(message.into())
    }

    fn is_ready(&self, petition: &Petition) -> bool {
        !self.blocked.lock().unwrap().contains(&id_of(petition))
    }

    async fn on_start(&self, petition: &Petition, done: Completion) -> Result<(), ManagerError> {
        self.enter();
        let begun = WallClock::now();
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        if !self.blocking_start.is_zero() {
            std::thread::sleep(self.blocking_start);
        }
        tokio::task::yield_now().await;

        let id = id_of(petition);
        self.started.lock().unwrap().push(id.clone());
        self.start_spans.lock().unwrap().push((begun, WallClock::now()));

        let failing = self.fail_all_starts || self.fail_start.lock().unwrap().contains(&id);
        let result = if failing {
            Err(ManagerError::fail(format!("cannot start {id}")))
        } else if self.auto_complete {
            let _ = done.succeed();
            Ok(())
        } else {
            self.held.lock().unwrap().insert(id, done);
            Ok(())
        };
        self.leave();
        result
    }

    async fn on_finish(&self, petition: &Petition, _outcome: &Outcome) -> Result<(), ManagerError> {
        self.enter();
        tokio::task::yield_now().await;
        self.finished.lock().unwrap().push(id_of(petition));
        self.leave();
        Ok(())
    }

    async fn on_cancel(&self, petition: &Petition) -> Result<(), ManagerError> {
        self.enter();
        self.cancels.fetch_add(1, Ordering::SeqCst);
        let done = self.held.lock().unwrap().remove(&id_of(petition));
        if let Some(done) = done {
            let _ = done.fail("cancelled");
        }
        self.leave();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "test-manager"
    }
}

/// Notifier recording every call.
#[derive(Default)]
pub struct RecordingNotifier {
    pub ready: AtomicUsize,
    pub stopping: AtomicUsize,
    pub alive: Mutex<Vec<WallClock>>,
}

impl RecordingNotifier {
    pub fn ready_count(&self) -> usize {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn stopping_count(&self) -> usize {
        self.stopping.load(Ordering::SeqCst)
    }

    pub fn alive_count(&self) -> usize {
        self.alive.lock().unwrap().len()
    }

    pub fn alive_at(&self) -> Vec<WallClock> {
        self.alive.lock().unwrap().clone()
    }
}

impl SupervisorNotifier for RecordingNotifier {
    fn notify_ready(&self) -> io::Result<()> {
        self.ready.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn notify_alive(&self) -> io::Result<()> {
        self.alive.lock().unwrap().push(WallClock::now());
        Ok(())
    }

    fn notify_stopping(&self) -> io::Result<()> {
        self.stopping.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
