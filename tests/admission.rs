mod common;

use std::sync::Arc;

use common::*;
use petitionvisor::{AdmissionError, EventKind, Message, PetitionId};

#[tokio::test(start_paused = true)]
async fn duplicate_id_is_refused_until_finished() {
    let manager = Arc::new(TestManager::manual());
    let p = build(test_config(), manager.clone(), Arc::default());
    let client = connected(&p, "producer");
    let run = spawn_run(&p);

    let first = client.submit(msg("dup", 0)).unwrap();
    assert_eq!(
        client.submit(msg("dup", 3)).unwrap_err(),
        AdmissionError::DuplicateId {
            id: PetitionId::from("dup")
        }
    );

    let watched = p.clone();
    eventually(std::time::Duration::from_secs(5), move || {
        let p = watched.clone();
        async move { p.is_running(&PetitionId::from("dup")).await }
    })
    .await;
    assert!(matches!(
        client.submit(msg("dup", 0)),
        Err(AdmissionError::DuplicateId { .. })
    ));

    assert!(manager.complete("dup"));
    assert!(first.ack().await.success);
    let second = client.submit(msg("dup", 0)).unwrap();
    assert_eq!(second.id(), &PetitionId::from("dup"));

    let m = manager.clone();
    eventually(std::time::Duration::from_secs(5), move || {
        let m = m.clone();
        async move { m.complete("dup") }
    })
    .await;
    assert!(second.ack().await.success);

    p.shutdown();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn rejected_conversion_never_reaches_the_queue() {
    let manager = Arc::new(TestManager::auto());
    manager.reject.lock().unwrap().insert("nope".into());
    let p = build(test_config(), manager.clone(), Arc::default());
    let client = connected(&p, "producer");
    let mut events = p.subscribe();

    let err = client.submit(msg("nope", 0)).unwrap_err();
    assert_eq!(
        err,
        AdmissionError::Rejected {
            id: PetitionId::from("nope")
        }
    );
    assert_eq!(p.pending_len(), 0);

    let ev = std::iter::from_fn(|| events.try_recv().ok())
        .find(|ev| ev.kind == EventKind::PetitionRejected)
        .expect("no PetitionRejected event");
    assert_eq!(ev.petition.as_deref(), Some("nope"));
    assert_eq!(ev.reason.as_deref(), Some("admission_rejected"));
}

#[tokio::test]
async fn integer_ids_and_default_priority() {
    let manager = Arc::new(TestManager::auto());
    let p = build(test_config(), manager, Arc::default());
    let client = connected(&p, "producer");

    let wire: Message = serde_json::from_str(r#"{"id": 42, "action": {"cmd": "ls"}}"#).unwrap();
    assert_eq!(wire.priority, None);
    let sub = client.submit(wire).unwrap();
    assert_eq!(sub.id(), &PetitionId::Int(42));
    assert!(matches!(
        client.submit(Message::new(42i64, serde_json::Value::Null)),
        Err(AdmissionError::DuplicateId { .. })
    ));
}
