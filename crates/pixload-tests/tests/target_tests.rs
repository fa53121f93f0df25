//! Target lifecycle tests: replacement, detach and reattach, destruction.

use pixload_core::events::TargetEvent;
use pixload_core::{Data, DataSource, DefaultRequestOptions, Request, Result, TargetId};
use pixload_loader::{Job, JobState, LoaderConfig, TargetPhase, TargetRequestManager};
use pixload_tests::{
    Callback, FakeFetcher, RecordingListener, RecordingTarget, eventually, loader_with,
    loader_with_config, uri,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_new_request_replaces_previous_on_same_target() {
    let fetcher = FakeFetcher::new().blocking();
    let loader = loader_with(fetcher.clone());
    let target = RecordingTarget::new();
    let first_listener = RecordingListener::new();

    let first = loader
        .enqueue(
            loader
                .new_request(uri("first"))
                .target(target.clone())
                .listener(first_listener.clone())
                .build()
                .unwrap(),
        )
        .unwrap();
    assert!(eventually(|| fetcher.calls() == 1).await);

    let second = loader
        .enqueue(
            loader
                .new_request(uri("second"))
                .target(target.clone())
                .build()
                .unwrap(),
        )
        .unwrap();

    assert!(first.is_disposed());
    assert!(!second.is_disposed());
    assert!(eventually(|| first_listener.cancel_count() == 1).await);

    let current = loader.targets().current_request(target_id(&target)).unwrap();
    assert!(Arc::ptr_eq(&current.request, second.request().unwrap()));
}

#[tokio::test]
async fn test_only_latest_request_reaches_target() {
    let fetcher = FakeFetcher::new().with_delay(Duration::from_millis(20));
    let loader = loader_with(fetcher.clone());
    let target = RecordingTarget::new();

    for name in ["a", "b", "c"] {
        loader
            .enqueue(
                loader
                    .new_request(uri(name))
                    .target(target.clone())
                    .build()
                    .unwrap(),
            )
            .unwrap();
    }
    let current = loader.targets().current_request(target_id(&target)).unwrap();
    assert_eq!(current.job.join().await, JobState::Completed);

    assert_eq!(target.success_count(), 1);
    assert_eq!(target.error_count(), 0);
}

#[tokio::test]
async fn test_target_size_is_used_when_request_has_none() {
    let loader = loader_with(FakeFetcher::new());
    let target = RecordingTarget::with_size(40, 30);

    let disposable = loader
        .enqueue(
            loader
                .new_request(uri("a"))
                .target(target.clone())
                .build()
                .unwrap(),
        )
        .unwrap();
    disposable.wait().await;

    assert_eq!(
        target.callbacks(),
        vec![Callback::Start, Callback::Success(DataSource::Network)]
    );
    let cached = loader.memory_cache().get(&uri("a").to_string()).unwrap();
    assert_eq!((cached.image.width, cached.image.height), (40, 30));
    assert!(cached.is_sampled);
}

#[tokio::test]
async fn test_detach_pauses_and_attach_restarts_through_listener() {
    let fetcher = FakeFetcher::new().with_delay(Duration::from_millis(50));
    let loader = loader_with(fetcher.clone());
    loader.start().unwrap();
    let target = RecordingTarget::new();
    let id = target_id(&target);

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
    let paused = loader.targets().current_request(id).unwrap().job;

    loader
        .publish_target_event(TargetEvent::Detached { target_id: id })
        .await
        .unwrap();
    assert!(eventually(|| paused.state() == JobState::Cancelled).await);
    assert!(!disposable.is_disposed());
    assert_eq!(loader.targets().phase(id), TargetPhase::Active);

    loader
        .publish_target_event(TargetEvent::Attached { target_id: id })
        .await
        .unwrap();
    assert!(eventually(|| target.success_count() == 1).await);
    assert_eq!(fetcher.calls(), 2);
    assert!(!disposable.is_disposed());

    loader.shutdown().await;
}

#[tokio::test]
async fn test_event_burst_with_small_queue_loses_nothing() {
    let fetcher = FakeFetcher::new().blocking();
    let config = LoaderConfig {
        target_event_capacity: 1,
        ..LoaderConfig::default()
    };
    let loader = loader_with_config(fetcher.clone(), config);
    let target = RecordingTarget::new();
    let id = target_id(&target);

    let disposable = loader
        .enqueue(
            loader
                .new_request(uri("a"))
                .target(target.clone())
                .build()
                .unwrap(),
        )
        .unwrap();

    // Published before the listener runs: the queue holds one event and the
    // rest wait for capacity.
    let publisher = {
        let loader = loader.clone();
        tokio::spawn(async move {
            for _ in 0..25 {
                loader
                    .publish_target_event(TargetEvent::Detached { target_id: id })
                    .await?;
                loader
                    .publish_target_event(TargetEvent::Attached { target_id: id })
                    .await?;
            }
            loader
                .publish_target_event(TargetEvent::Detached { target_id: id })
                .await
        })
    };
    tokio::task::yield_now().await;
    loader.start().unwrap();

    tokio::time::timeout(Duration::from_secs(2), publisher)
        .await
        .expect("publisher should drain")
        .unwrap()
        .unwrap();
    assert!(eventually(|| !loader.targets().is_attached(id)).await);
    assert!(eventually(|| {
        loader
            .targets()
            .current_request(id)
            .is_some_and(|current| !current.job.is_active())
    })
    .await);
    assert!(!disposable.is_disposed());

    loader.shutdown().await;
    assert!(matches!(
        loader
            .publish_target_event(TargetEvent::Attached { target_id: id })
            .await,
        Err(pixload_core::Error::Shutdown)
    ));
}

#[tokio::test]
async fn test_events_for_unknown_target_are_ignored() {
    let loader = loader_with(FakeFetcher::new());
    let id = TargetId::new();

    loader.handle_target_event(TargetEvent::Detached { target_id: id });
    loader.handle_target_event(TargetEvent::Attached { target_id: id });

    assert_eq!(loader.targets().target_count(), 0);
}

#[tokio::test]
async fn test_detach_after_completion_does_not_refetch() {
    let fetcher = FakeFetcher::new();
    let loader = loader_with(fetcher.clone());
    let target = RecordingTarget::new();
    let id = target_id(&target);

    let disposable = loader
        .enqueue(
            loader
                .new_request(uri("a"))
                .target(target.clone())
                .build()
                .unwrap(),
        )
        .unwrap();
    disposable.wait().await;

    loader.handle_target_event(TargetEvent::Detached { target_id: id });
    loader.handle_target_event(TargetEvent::Attached { target_id: id });

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(target.success_count(), 1);
}

#[tokio::test]
async fn test_destroyed_target_cancels_and_forgets() {
    let fetcher = FakeFetcher::new().blocking();
    let loader = loader_with(fetcher.clone());
    let target = RecordingTarget::new();
    let id = target_id(&target);

    let disposable = loader
        .enqueue(
            loader
                .new_request(uri("a"))
                .target(target.clone())
                .build()
                .unwrap(),
        )
        .unwrap();
    let job = loader.targets().current_request(id).unwrap().job;

    loader.handle_target_event(TargetEvent::Destroyed { target_id: id });

    assert_eq!(job.state(), JobState::Cancelled);
    assert!(disposable.is_disposed());
    assert_eq!(loader.targets().target_count(), 0);
}

#[tokio::test]
async fn test_dispose_leaves_target_pending_clear() {
    let fetcher = FakeFetcher::new().blocking();
    let loader = loader_with(fetcher.clone());
    let target = RecordingTarget::new();
    let id = target_id(&target);

    let disposable = loader
        .enqueue(
            loader
                .new_request(uri("a"))
                .target(target.clone())
                .build()
                .unwrap(),
        )
        .unwrap();
    disposable.dispose();

    assert!(disposable.is_disposed());
    assert_eq!(loader.targets().phase(id), TargetPhase::PendingClear);
    // A reattach after a clear has nothing to restart.
    loader.handle_target_event(TargetEvent::Detached { target_id: id });
    loader.handle_target_event(TargetEvent::Attached { target_id: id });
    assert!(loader.targets().current_request(id).is_none());
    assert_eq!(target.success_count(), 0);
}

fn target_id(target: &Arc<RecordingTarget>) -> TargetId {
    pixload_core::ports::Target::id(target.as_ref())
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Set(usize),
    Clear(usize),
    Detach(usize),
    Attach(usize),
}

const TARGETS: usize = 3;

fn op() -> impl Strategy<Value = Op> {
    (0..4u8, 0..TARGETS).prop_map(|(kind, target)| match kind {
        0 => Op::Set(target),
        1 => Op::Clear(target),
        2 => Op::Detach(target),
        _ => Op::Attach(target),
    })
}

fn request() -> Arc<Request> {
    Arc::new(
        Request::builder(Data::Uri("p".to_string()), &DefaultRequestOptions::default())
            .build()
            .unwrap(),
    )
}

fn pending_job() -> Job {
    Job::spawn(|_| std::future::pending::<Result<()>>())
}

proptest! {
    #[test]
    fn at_most_one_active_job_per_target(ops in prop::collection::vec(op(), 1..64)) {
        tokio_test::block_on(async {
            let manager = TargetRequestManager::new();
            let targets: Vec<TargetId> = (0..TARGETS).map(|_| TargetId::new()).collect();
            let mut jobs: Vec<Vec<Job>> = vec![Vec::new(); TARGETS];
            let mut requests: Vec<Vec<(Arc<Request>, bool)>> = vec![Vec::new(); TARGETS];

            for op in ops {
                match op {
                    Op::Set(t) => {
                        let job = pending_job();
                        let request = request();
                        jobs[t].push(job.clone());
                        requests[t].push((Arc::clone(&request), false));
                        manager.set_current_request(targets[t], request, job);
                    }
                    Op::Clear(t) => manager.clear_current_request(targets[t]),
                    Op::Detach(t) => manager.on_detached(targets[t]),
                    Op::Attach(t) => {
                        if let Some(request) = manager.on_attached(targets[t]) {
                            let job = pending_job();
                            jobs[t].push(job.clone());
                            manager.restart_request(targets[t], &request, job);
                        }
                    }
                }

                for t in 0..TARGETS {
                    let active: Vec<&Job> = jobs[t].iter().filter(|job| job.is_active()).collect();
                    assert!(active.len() <= 1, "target {} has {} active jobs", t, active.len());
                    if let Some(job) = active.first() {
                        let current = manager
                            .current_request(targets[t])
                            .expect("an active job must be the current one");
                        assert!(current.job.ptr_eq(job));
                    }

                    // Once disposed, a request never comes back.
                    for (request, was_disposed) in requests[t].iter_mut() {
                        let disposed = manager.is_request_disposed(targets[t], request);
                        assert!(disposed || !*was_disposed);
                        *was_disposed = disposed;
                    }
                }
            }
        });
    }
}
