//! Disposable handle semantics under concurrency.

use futures::future::join_all;
use pixload_core::TargetId;
use pixload_core::events::TargetEvent;
use pixload_loader::JobState;
use pixload_tests::{FakeFetcher, RecordingTarget, eventually, loader_with, uri};
use std::time::Duration;

#[tokio::test]
async fn test_waiters_racing_dispose_all_return() {
    let loader = loader_with(FakeFetcher::new().blocking());
    let disposable = loader
        .enqueue(loader.new_request(uri("a")).build().unwrap())
        .unwrap();

    let waiters: Vec<_> = (0..10)
        .map(|_| {
            let disposable = disposable.clone();
            tokio::spawn(async move { disposable.wait().await })
        })
        .collect();
    tokio::task::yield_now().await;
    disposable.dispose();

    let results = tokio::time::timeout(Duration::from_secs(2), join_all(waiters))
        .await
        .expect("every waiter should observe disposal");
    assert!(results.iter().all(|r| r.is_ok()));
}

#[tokio::test]
async fn test_dispose_is_idempotent_across_clones() {
    let loader = loader_with(FakeFetcher::new().blocking());
    let disposable = loader
        .enqueue(loader.new_request(uri("a")).build().unwrap())
        .unwrap();
    let clone = disposable.clone();

    disposable.dispose();
    clone.dispose();
    disposable.dispose();

    assert!(disposable.is_disposed());
    assert!(clone.is_disposed());
}

#[tokio::test]
async fn test_wait_on_completed_handle_returns_immediately() {
    let loader = loader_with(FakeFetcher::new());
    let disposable = loader
        .enqueue(loader.new_request(uri("a")).build().unwrap())
        .unwrap();
    disposable.wait().await;

    tokio::time::timeout(Duration::from_millis(100), disposable.wait())
        .await
        .expect("second wait should not block");
}

#[tokio::test]
async fn test_target_wait_follows_restarted_job() {
    let fetcher = FakeFetcher::new().with_delay(Duration::from_millis(30));
    let loader = loader_with(fetcher.clone());
    let target = RecordingTarget::new();
    let id: TargetId = pixload_core::ports::Target::id(target.as_ref());

    let disposable = loader
        .enqueue(
            loader
                .new_request(uri("a"))
                .target(target.clone())
                .build()
                .unwrap(),
        )
        .unwrap();
    assert!(eventually(|| fetcher.calls() == 1).await);
    let original = loader.targets().current_request(id).unwrap().job;

    loader.handle_target_event(TargetEvent::Detached { target_id: id });
    loader.handle_target_event(TargetEvent::Attached { target_id: id });
    let restarted = loader.targets().current_request(id).unwrap().job;
    assert!(!restarted.ptr_eq(&original));

    disposable.wait().await;

    assert_eq!(original.state(), JobState::Cancelled);
    assert_eq!(restarted.state(), JobState::Completed);
    assert_eq!(target.success_count(), 1);
}
