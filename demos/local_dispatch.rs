//! Local dispatch demo.
//!
//! Starts a processor with a shared secret, connects two producers (one with
//! the wrong key), submits a handful of petitions with mixed priorities and
//! shuts down once they are acked.
//!
//! ```text
//! RUST_LOG=info cargo run --example local_dispatch
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use petitionvisor::{
    Completion, Config, HeartbeatPolicy, LogWriter, Manager, ManagerError, Message, Outcome,
    Petition, ProcessorBuilder, SystemdNotifier,
};
use tracing_subscriber::EnvFilter;

/// Pretends to run a command for `action.millis` milliseconds.
struct SimulatedRunner;

#[async_trait]
impl Manager for SimulatedRunner {
    fn is_ready(&self, petition: &Petition) -> bool {
        petition.action().get("blocked").and_then(|b| b.as_bool()) != Some(true)
    }

    async fn on_start(&self, petition: &Petition, done: Completion) -> Result<(), ManagerError> {
        let millis = petition
            .action()
            .get("millis")
            .and_then(|m| m.as_u64())
            .ok_or_else(|| ManagerError::fail("action.millis missing"))?;

        tracing::info!(petition = %petition, millis, "starting");
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            done.finish(Outcome::Succeeded {
                detail: Some(format!("ran for {millis}ms")),
            });
        });
        Ok(())
    }

    async fn on_finish(&self, petition: &Petition, outcome: &Outcome) -> Result<(), ManagerError> {
        tracing::info!(petition = %petition, ok = outcome.is_success(), "finished");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "simulated-runner"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Config {
        look_ahead: 2,
        heartbeat: HeartbeatPolicy::from_env(),
        ..Config::default()
    };
    let processor = ProcessorBuilder::new(cfg, Arc::new(SimulatedRunner))
        .with_notifier(Arc::new(SystemdNotifier::from_env()))
        .with_subscribers(vec![Arc::new(LogWriter)])
        .with_secret(b"demo-secret".to_vec())
        .build();

    let runner = tokio::spawn({
        let processor = Arc::clone(&processor);
        async move { processor.run().await }
    });

    let mut intruder = processor.client("intruder").with_key("not-the-secret");
    if !intruder.connect() {
        tracing::warn!(reason = ?intruder.last_error(), "intruder refused");
    }

    let mut producer = processor.client("producer").with_key("demo-secret");
    anyhow::ensure!(producer.connect(), "handshake failed: {:?}", producer.last_error());

    let mut pending = Vec::new();
    for (id, priority, millis) in [("backup", 5, 300), ("deploy", 1, 200), ("report", 5, 100)] {
        let message = Message::new(id, serde_json::json!({ "millis": millis })).with_priority(priority);
        pending.push(producer.submit(message)?);
    }
    pending.push(producer.submit(Message::new("broken", serde_json::json!({})))?);

    for submission in pending {
        let ack = submission.ack().await;
        tracing::info!(id = %ack.id, success = ack.success, detail = ?ack.detail, "ack");
    }

    processor.shutdown();
    runner.await??;
    Ok(())
}
