mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use petitionvisor::{CancelError, EventKind, PetitionId};

#[tokio::test(start_paused = true)]
async fn cancel_asks_the_manager_to_finish_a_running_petition() {
    let manager = Arc::new(TestManager::manual());
    let p = build(test_config(), manager.clone(), Arc::default());
    let mut events = p.subscribe();
    let client = connected(&p, "producer");

    let job = client.submit(msg("job", 0)).unwrap();
    let run = spawn_run(&p);
    let watched = p.clone();
    eventually(Duration::from_secs(5), move || {
        let p = watched.clone();
        async move { p.is_running(&PetitionId::from("job")).await }
    })
    .await;

    client.cancel("job").await.unwrap();
    let ack = job.ack().await;
    assert!(!ack.success);
    assert_eq!(ack.detail.as_deref(), Some("cancelled"));
    assert_eq!(manager.finished(), ["job"]);

    let mut saw_request = false;
    while let Ok(ev) = events.try_recv() {
        saw_request |= ev.kind == EventKind::PetitionCancelRequested;
    }
    assert!(saw_request);

    p.shutdown();
    run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn only_running_petitions_can_be_cancelled() {
    let manager = Arc::new(TestManager::manual());
    manager.block("queued");
    let p = build(test_config(), manager.clone(), Arc::default());
    let client = connected(&p, "producer");
    client.submit(msg("queued", 0)).unwrap();

    assert!(matches!(
        client.cancel("queued").await,
        Err(CancelError::NotRunning { .. })
    ));
    let err = client.cancel(7i64).await.unwrap_err();
    assert_eq!(err.as_label(), "cancel_not_running");
    assert_eq!(p.pending_len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_handshake_cannot_cancel() {
    let manager = Arc::new(TestManager::manual());
    let p = build_keyed(test_config(), manager.clone(), Arc::default(), "s3cret");
    let mut events = p.subscribe();

    let mut owner = p.client("owner").with_key("s3cret");
    assert!(owner.connect());
    let job = owner.submit(msg("job", 0)).unwrap();
    let run = spawn_run(&p);
    let m = manager.clone();
    eventually(Duration::from_secs(5), move || {
        let m = m.clone();
        async move { m.started().contains(&"job".to_string()) }
    })
    .await;

    let mut intruder = p.client("intruder").with_key("guess");
    assert!(!intruder.connect());
    let err = intruder.cancel("job").await.unwrap_err();
    assert!(matches!(err, CancelError::NotAuthenticated));
    assert_eq!(err.as_label(), "cancel_not_authenticated");

    // A session id that never completed the handshake is refused too.
    let err = p.cancel(9_999, &PetitionId::from("job")).await.unwrap_err();
    assert!(matches!(err, CancelError::NotAuthenticated));

    assert!(p.is_running(&PetitionId::from("job")).await);
    assert!(manager.complete("job"));
    assert!(job.ack().await.success);

    let refused: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|ev| ev.kind == EventKind::PetitionCancelRefused)
        .collect();
    assert_eq!(refused.len(), 1);
    assert_eq!(refused[0].reason.as_deref(), Some("cancel_not_authenticated"));

    p.shutdown();
    run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn only_the_admitting_session_can_cancel() {
    let manager = Arc::new(TestManager::manual());
    let p = build(test_config(), manager.clone(), Arc::default());
    let owner = connected(&p, "owner");
    let other = connected(&p, "other");

    let job = owner.submit(msg("job", 0)).unwrap();
    let run = spawn_run(&p);
    let m = manager.clone();
    eventually(Duration::from_secs(5), move || {
        let m = m.clone();
        async move { m.started().contains(&"job".to_string()) }
    })
    .await;

    assert!(matches!(
        other.cancel("job").await,
        Err(CancelError::NotOwner { .. })
    ));
    assert!(p.is_running(&PetitionId::from("job")).await);

    owner.cancel("job").await.unwrap();
    assert_eq!(job.ack().await.detail.as_deref(), Some("cancelled"));

    p.shutdown();
    run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancel_waiting_on_the_lock_sees_a_finished_petition() {
    let manager = Arc::new(TestManager::manual().with_start_delay(Duration::from_secs(1)));
    let p = build(test_config(), manager.clone(), Arc::default());
    let client = connected(&p, "producer");

    let first = client.submit(msg("first", 0)).unwrap();
    let run = spawn_run(&p);
    let m = manager.clone();
    eventually(Duration::from_secs(5), move || {
        let m = m.clone();
        async move { m.started().contains(&"first".to_string()) }
    })
    .await;

    // "second" holds the manager lock for a second inside on_start.
    let second = client.submit(msg("second", 0)).unwrap();
    let watched = p.clone();
    eventually(Duration::from_secs(5), move || {
        let p = watched.clone();
        async move { p.is_running(&PetitionId::from("second")).await }
    })
    .await;

    // "first" completes while the loop is busy; by the time the cancel gets
    // the lock the loop has already collected it.
    assert!(manager.complete("first"));
    assert!(matches!(
        client.cancel("first").await,
        Err(CancelError::NotRunning { .. })
    ));
    assert!(first.ack().await.success);
    assert_eq!(manager.cancelled(), 0);

    assert!(manager.complete("second"));
    assert!(second.ack().await.success);
    p.shutdown();
    run.await.unwrap().unwrap();
}
