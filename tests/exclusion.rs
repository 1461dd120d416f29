mod common;

use std::sync::Arc;

use common::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn callbacks_never_overlap_under_concurrent_admission() {
    let manager = Arc::new(TestManager::auto());
    let p = build(test_config(), manager.clone(), Arc::default());
    let run = spawn_run(&p);

    let mut producers = Vec::new();
    for c in 0..8 {
        let p = p.clone();
        producers.push(tokio::spawn(async move {
            let client = connected(&p, &format!("producer-{c}"));
            let mut pending = Vec::new();
            for n in 0..16 {
                pending.push(client.submit(msg(&format!("{c}-{n}"), n % 3)).unwrap());
                tokio::task::yield_now().await;
            }
            for s in pending {
                assert!(s.ack().await.success);
            }
        }));
    }
    for h in producers {
        h.await.unwrap();
    }

    assert_eq!(manager.started().len(), 128);
    assert_eq!(manager.finished().len(), 128);
    assert_eq!(manager.max_active(), 1);

    p.shutdown();
    run.await.unwrap().unwrap();
}
