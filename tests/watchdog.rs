mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use petitionvisor::{Config, HeartbeatPolicy};

// The heartbeat runs on its own thread with the wall clock, so these tests
// run in real time.

fn heartbeat(timeout_ms: u64) -> Config {
    Config {
        heartbeat: HeartbeatPolicy {
            timeout: Duration::from_millis(timeout_ms),
            interval: Duration::ZERO,
            boost_interval: Duration::from_millis(100),
            boost_for: Duration::from_secs(2),
        },
        ..test_config()
    }
}

fn pings_during_first_start(manager: &TestManager, notifier: &RecordingNotifier) -> usize {
    let (begun, ended) = manager.start_spans.lock().unwrap()[0];
    notifier
        .alive_at()
        .into_iter()
        .filter(|t| *t > begun && *t < ended)
        .count()
}

#[tokio::test]
async fn blocking_on_start_does_not_starve_the_heartbeat() {
    // current_thread runtime: the blocked on_start holds the only worker.
    let manager = Arc::new(TestManager::auto().with_blocking_start(Duration::from_millis(1_200)));
    let notifier = Arc::new(RecordingNotifier::default());
    let p = build(heartbeat(400), manager.clone(), notifier.clone());
    let client = connected(&p, "producer");

    let slow = client.submit(msg("slow", 0)).unwrap();
    let run = spawn_run(&p);
    assert!(slow.ack().await.success);

    let during = pings_during_first_start(&manager, &notifier);
    assert!(during >= 2, "{during} heartbeats during a 1.2s blocking on_start with a 200ms period");

    p.shutdown();
    run.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_on_start_does_not_starve_the_heartbeat() {
    let manager = Arc::new(TestManager::auto().with_start_delay(Duration::from_millis(1_200)));
    let notifier = Arc::new(RecordingNotifier::default());
    let p = build(heartbeat(400), manager.clone(), notifier.clone());
    let client = connected(&p, "producer");

    let slow = client.submit(msg("slow", 0)).unwrap();
    let run = spawn_run(&p);
    assert!(slow.ack().await.success);

    let during = pings_during_first_start(&manager, &notifier);
    assert!(during >= 2, "{during} heartbeats during a 1.2s on_start with a 200ms period");

    p.shutdown();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn contained_error_pings_immediately() {
    let manager = Arc::new(TestManager::auto());
    manager.fail_on_start("bad");
    let notifier = Arc::new(RecordingNotifier::default());
    // One regular ping every 30s: anything earlier is out of band.
    let p = build(heartbeat(60_000), manager.clone(), notifier.clone());
    let client = connected(&p, "producer");

    let bad = client.submit(msg("bad", 0)).unwrap();
    let run = spawn_run(&p);
    let ack = bad.ack().await;
    assert!(!ack.success);
    assert!(ack.detail.unwrap().contains("cannot start bad"));
    let n = notifier.clone();
    eventually(Duration::from_millis(200), move || {
        let n = n.clone();
        async move { n.alive_count() >= 1 }
    })
    .await;

    // Boosted period: several pings within the boost window.
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(notifier.alive_count() >= 5);

    p.shutdown();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn stopped_processor_stops_pinging() {
    let manager = Arc::new(TestManager::auto());
    let notifier = Arc::new(RecordingNotifier::default());
    let p = build(heartbeat(100), manager, notifier.clone());

    let run = spawn_run(&p);
    tokio::time::sleep(Duration::from_millis(300)).await;
    p.shutdown();
    run.await.unwrap().unwrap();

    let at_stop = notifier.alive_count();
    assert!(at_stop >= 2);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(notifier.alive_count(), at_stop);
}
