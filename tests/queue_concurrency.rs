//! Concurrency tests for the shared-store mutation paths.
//!
//! The store has no compare-and-swap and no transactions; every list
//! mutation is read-entire-value, mutate, write-entire-value. These tests
//! pin down the property the per-key locking exists for: concurrent writers
//! against one target never silently discard each other's update.

use tether::queue::{CommandPayload, CommandQueue, KeyboardData};
use tether::registry::{PresenceRegistry, RegisterInfo};
use tether::store::Store;

fn keypress(key: &str) -> CommandPayload {
    CommandPayload::Keyboard(KeyboardData::Press { key: key.into() })
}

#[tokio::test]
async fn many_concurrent_enqueues_all_survive() {
    const WRITERS: usize = 16;

    let queue = CommandQueue::new(Store::memory());
    let mut handles = Vec::new();
    for n in 0..WRITERS {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            queue.enqueue("abc", keypress(&format!("k{n}"))).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }

    let listed: Vec<String> = queue
        .list("abc")
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(listed.len(), WRITERS, "an enqueue was lost");
    for id in &ids {
        assert!(listed.contains(id), "missing command {id}");
    }
}

#[tokio::test]
async fn concurrent_enqueue_and_ack_do_not_interfere() {
    let queue = CommandQueue::new(Store::memory());
    let first = queue.enqueue("abc", keypress("a")).await.unwrap();
    let second = queue.enqueue("abc", keypress("b")).await.unwrap();

    let (acker, enqueuer) = (queue.clone(), queue.clone());
    let ack_first = tokio::spawn(async move { acker.ack("abc", &first).await });
    let enqueue_third = tokio::spawn(async move { enqueuer.enqueue("abc", keypress("c")).await });

    ack_first.await.unwrap().unwrap();
    let third = enqueue_third.await.unwrap().unwrap();

    let listed: Vec<String> = queue
        .list("abc")
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(listed.len(), 2);
    // FIFO position of the surviving original entry is preserved.
    assert_eq!(listed[0], second);
    assert!(listed.contains(&third));
}

#[tokio::test]
async fn concurrent_acks_of_distinct_ids_both_apply() {
    let queue = CommandQueue::new(Store::memory());
    let a = queue.enqueue("abc", keypress("a")).await.unwrap();
    let b = queue.enqueue("abc", keypress("b")).await.unwrap();
    let c = queue.enqueue("abc", keypress("c")).await.unwrap();

    let (q1, q2) = (queue.clone(), queue.clone());
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { q1.ack("abc", &a).await }),
        tokio::spawn(async move { q2.ack("abc", &c).await }),
    );
    ra.unwrap().unwrap();
    rb.unwrap().unwrap();

    let listed: Vec<String> = queue
        .list("abc")
        .await
        .unwrap()
        .into_iter()
        .map(|cmd| cmd.id)
        .collect();
    assert_eq!(listed, [b]);
}

#[tokio::test]
async fn concurrent_registrations_of_distinct_targets_all_indexed() {
    const AGENTS: usize = 12;

    let registry = PresenceRegistry::new(Store::memory());
    let mut handles = Vec::new();
    for n in 0..AGENTS {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .register(RegisterInfo {
                    target_id: format!("agent-{n}"),
                    ..Default::default()
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(registry.list().await.unwrap().len(), AGENTS);
}

#[tokio::test]
async fn concurrent_reregistrations_of_one_target_stay_deduplicated() {
    const WRITERS: usize = 8;

    let registry = PresenceRegistry::new(Store::memory());
    let mut handles = Vec::new();
    for _ in 0..WRITERS {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .register(RegisterInfo {
                    target_id: "abc".into(),
                    ..Default::default()
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(registry.list().await.unwrap().len(), 1);
}
