mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use petitionvisor::PetitionId;

#[tokio::test(start_paused = true)]
async fn dispatches_by_priority_then_admission_order() {
    let manager = Arc::new(TestManager::auto());
    let p = build(test_config(), manager.clone(), Arc::default());
    let client = connected(&p, "producer");

    let a = client.submit(msg("a", 5)).unwrap();
    let b = client.submit(msg("b", 1)).unwrap();
    let c = client.submit(msg("c", 5)).unwrap();
    let run = spawn_run(&p);

    for s in [a, b, c] {
        assert!(s.ack().await.success);
    }
    assert_eq!(manager.started(), ["b", "a", "c"]);
    assert_eq!(manager.finished(), ["b", "a", "c"]);

    p.shutdown();
    run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn look_ahead_dispatches_past_blocked_head() {
    let manager = Arc::new(TestManager::manual());
    manager.block("h1");
    manager.block("h2");
    let cfg = petitionvisor::Config {
        look_ahead: 3,
        ..test_config()
    };
    let p = build(cfg, manager.clone(), Arc::default());
    let client = connected(&p, "producer");

    let subs: Vec<_> = [("h1", 1), ("h2", 2), ("h3", 3)]
        .into_iter()
        .map(|(id, prio)| client.submit(msg(id, prio)).unwrap())
        .collect();
    let run = spawn_run(&p);

    let m = manager.clone();
    eventually(Duration::from_secs(5), move || {
        let m = m.clone();
        async move { m.started() == ["h3"] }
    })
    .await;
    assert_eq!(p.pending_len(), 2);
    assert!(p.is_running(&PetitionId::from("h3")).await);

    manager.unblock("h1");
    manager.unblock("h2");
    let m = manager.clone();
    eventually(Duration::from_secs(5), move || {
        let m = m.clone();
        async move { m.started().len() == 3 }
    })
    .await;
    assert_eq!(manager.started(), ["h3", "h1", "h2"]);
    assert_eq!(
        p.running().await,
        ["h1", "h2", "h3"].map(PetitionId::from).to_vec()
    );

    for id in ["h1", "h2", "h3"] {
        assert!(manager.complete(id));
    }
    for s in subs {
        assert!(s.ack().await.success);
    }
    p.shutdown();
    run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn blocked_petition_outside_window_is_not_overtaken() {
    let manager = Arc::new(TestManager::auto());
    manager.block("h1");
    manager.block("h2");
    let cfg = petitionvisor::Config {
        look_ahead: 2,
        ..test_config()
    };
    let p = build(cfg, manager.clone(), Arc::default());
    let client = connected(&p, "producer");
    for (id, prio) in [("h1", 1), ("h2", 2), ("h3", 3)] {
        client.submit(msg(id, prio)).unwrap();
    }
    let run = spawn_run(&p);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(manager.started().is_empty());
    assert_eq!(p.pending_len(), 3);

    manager.unblock("h2");
    let m = manager.clone();
    eventually(Duration::from_secs(5), move || {
        let m = m.clone();
        async move { m.started() == ["h2", "h3"] }
    })
    .await;

    manager.unblock("h1");
    p.shutdown();
    run.await.unwrap().unwrap();
    assert_eq!(manager.started(), ["h2", "h3", "h1"]);
}
