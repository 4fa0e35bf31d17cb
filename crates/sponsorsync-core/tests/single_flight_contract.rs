//! Contract Test: Single-Flight Runs
//!
//! Constraints verified:
//! - A run requested while another is in progress returns Skipped at once
//! - A skipped run performs no upstream or store work
//! - The guard is released after completion and after abort

mod common;

use common::*;
use sponsorsync_core::engine::{Reconciler, RunOutcome, SyncEvent};
use sponsorsync_core::state::MemorySponsorStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

async fn wait_until_parked(source: &ScriptedSource) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while source.waiting() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("first run reaches the upstream fetch");
}

#[tokio::test]
async fn concurrent_run_is_skipped() {
    let gate = Arc::new(Notify::new());
    let source = ScriptedSource::new()
        .with_page(1, full_page(1, 2, 1))
        .gated(Arc::clone(&gate));
    let store = FailingStore::new(MemorySponsorStore::new());

    let (reconciler, mut events) = Reconciler::new(
        Box::new(source.clone()),
        Box::new(store.clone()),
        fast_config(100),
    )
    .unwrap();
    let reconciler = Arc::new(reconciler);

    let first = tokio::spawn({
        let reconciler = Arc::clone(&reconciler);
        async move { reconciler.run().await }
    });

    wait_until_parked(&source).await;
    assert!(reconciler.is_running());

    // second invocation while the first is parked inside the fetch
    assert_eq!(reconciler.run().await, RunOutcome::Skipped);
    assert_eq!(source.call_count(), 1, "skipped run must not fetch");
    assert_eq!(store.upsert_call_count(), 0, "skipped run must not write");

    gate.notify_one();
    let outcome = first.await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed { synced: 2, pages: 1 });
    assert!(!reconciler.is_running());

    let events = drain_events(&mut events);
    assert_eq!(
        events.iter().filter(|e| **e == SyncEvent::RunSkipped).count(),
        1
    );
    assert_eq!(
        events.iter().filter(|e| **e == SyncEvent::RunStarted).count(),
        1
    );
}

#[tokio::test]
async fn guard_is_released_after_completion() {
    let gate = Arc::new(Notify::new());
    let source = ScriptedSource::new()
        .with_page(1, full_page(1, 1, 1))
        .gated(Arc::clone(&gate));

    let (reconciler, _events) = Reconciler::new(
        Box::new(source.clone()),
        Box::new(MemorySponsorStore::new()),
        fast_config(100),
    )
    .unwrap();

    // a stored permit lets each run through its single fetch
    gate.notify_one();
    assert!(matches!(reconciler.run().await, RunOutcome::Completed { .. }));
    gate.notify_one();
    assert!(matches!(reconciler.run().await, RunOutcome::Completed { .. }));
    assert_eq!(source.call_count(), 2);
}

#[tokio::test]
async fn guard_is_released_after_abort() {
    let source = ScriptedSource::new().failing_on(1, "boom");

    let (reconciler, _events) = Reconciler::new(
        Box::new(source.clone()),
        Box::new(MemorySponsorStore::new()),
        fast_config(100),
    )
    .unwrap();

    assert!(matches!(reconciler.run().await, RunOutcome::Aborted { .. }));
    assert!(!reconciler.is_running());
    assert!(
        matches!(reconciler.run().await, RunOutcome::Aborted { .. }),
        "an aborted run must not leave the guard held"
    );
    assert_eq!(source.call_count(), 2);
}
