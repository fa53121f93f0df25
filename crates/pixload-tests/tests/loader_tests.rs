//! End-to-end tests for request execution and caching.

use futures::future::join_all;
use pixload_core::ports::Fetcher;
use pixload_core::{CachePolicy, Data, DataSource, Error, PixelFormat, Precision};
use pixload_loader::{ImageLoader, JobState, LoaderConfig, RequestDisposable};
use pixload_tests::{
    Callback, FakeDecoder, FakeFetcher, FakeTransformation, RecordingListener, RecordingTarget,
    eventually, init_test_logging, loader_with, loader_with_config, uri,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn job_of(disposable: &RequestDisposable) -> &pixload_loader::Job {
    match disposable {
        RequestDisposable::OneShot { job } => job,
        RequestDisposable::TargetBound { .. } => panic!("expected a one-shot handle"),
    }
}

#[tokio::test]
async fn test_memory_cache_hit_skips_fetch() {
    init_test_logging();
    let fetcher = FakeFetcher::new();
    let loader = loader_with(fetcher.clone());

    let first = loader
        .execute(loader.new_request(uri("a")).build().unwrap())
        .await
        .unwrap();
    assert_eq!(first.data_source, DataSource::Network);

    let second = loader
        .execute(loader.new_request(uri("a")).size(50, 50).build().unwrap())
        .await
        .unwrap();
    assert_eq!(second.data_source, DataSource::MemoryCache);
    assert!(Arc::ptr_eq(&first.image, &second.image));
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(loader.stats().memory_hits, 1);
}

#[tokio::test]
async fn test_uncacheable_source_is_never_stored() {
    let fetcher = FakeFetcher::new().uncacheable();
    let loader = loader_with(fetcher.clone());

    for _ in 0..2 {
        let result = loader
            .execute(loader.new_request(uri("a")).build().unwrap())
            .await
            .unwrap();
        assert_eq!(result.data_source, DataSource::Network);
    }
    assert_eq!(fetcher.calls(), 2);
    assert!(loader.memory_cache().is_empty());
}

#[tokio::test]
async fn test_disabled_memory_policy_bypasses_cache() {
    let fetcher = FakeFetcher::new();
    let config = LoaderConfig::default().with_memory_cache_policy(CachePolicy::Disabled);
    let loader = loader_with_config(fetcher.clone(), config);

    for _ in 0..2 {
        loader
            .execute(loader.new_request(uri("a")).build().unwrap())
            .await
            .unwrap();
    }
    assert_eq!(fetcher.calls(), 2);
    assert!(loader.memory_cache().is_empty());
}

#[tokio::test]
async fn test_exact_precision_rejects_different_aspect() {
    let fetcher = FakeFetcher::new();
    let loader = loader_with(fetcher.clone());

    loader
        .execute(loader.new_request(uri("a")).size(50, 50).build().unwrap())
        .await
        .unwrap();
    let result = loader
        .execute(
            loader
                .new_request(uri("a"))
                .size(60, 30)
                .precision(Precision::Exact)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(result.data_source, DataSource::Network);
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_hardware_cached_image_rejected_when_disallowed() {
    let fetcher = FakeFetcher::new();
    let loader = loader_with(fetcher.clone());

    loader
        .execute(
            loader
                .new_request(uri("a"))
                .format(PixelFormat::Hardware)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
    let result = loader
        .execute(
            loader
                .new_request(uri("a"))
                .allow_hardware(false)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(result.data_source, DataSource::Network);
    assert_eq!(result.image.format, PixelFormat::Argb8888);
}

#[tokio::test]
async fn test_transformations_are_part_of_cache_identity() {
    let fetcher = FakeFetcher::new();
    let loader = loader_with(fetcher.clone());
    let blur = FakeTransformation::new("blur(4)");

    let transformed = loader
        .execute(
            loader
                .new_request(uri("a"))
                .transformation(Arc::new(blur.clone()))
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
    let plain = loader
        .execute(loader.new_request(uri("a")).build().unwrap())
        .await
        .unwrap();

    assert_eq!(transformed.data_source, DataSource::Network);
    assert_eq!(plain.data_source, DataSource::Network);
    assert_eq!(blur.calls(), 1);
    assert_eq!(loader.memory_cache().len(), 2);
}

#[tokio::test]
async fn test_file_source_is_cached_by_path_and_mtime() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.png");
    std::fs::write(&path, b"fake png bytes").unwrap();

    let loader = ImageLoader::builder(LoaderConfig::default())
        .with_decoder(Arc::new(FakeDecoder::default()))
        .build()
        .unwrap();

    let first = loader
        .execute(loader.new_request(Data::Path(path.clone())).build().unwrap())
        .await
        .unwrap();
    let second = loader
        .execute(loader.new_request(Data::Path(path.clone())).build().unwrap())
        .await
        .unwrap();

    assert_eq!(first.data_source, DataSource::Disk);
    assert_eq!(second.data_source, DataSource::MemoryCache);
}

#[tokio::test]
async fn test_fetch_failure_reaches_target_and_listener() {
    let loader = loader_with(FakeFetcher::new().failing("connection reset"));
    let target = RecordingTarget::new();
    let listener = RecordingListener::new();

    let request = loader
        .new_request(uri("a"))
        .target(target.clone())
        .listener(listener.clone())
        .build()
        .unwrap();
    let result = loader.execute(request).await;

    assert!(matches!(result, Err(Error::Fetch(_))));
    assert_eq!(target.error_count(), 1);
    assert_eq!(target.success_count(), 0);
    assert_eq!(
        listener.callbacks(),
        vec![
            Callback::Start,
            Callback::Error("Fetch failed: connection reset".to_string())
        ]
    );
}

#[tokio::test]
async fn test_enqueued_request_delivers_success() {
    let loader = loader_with(FakeFetcher::new());
    let listener = RecordingListener::new();

    let disposable = loader
        .enqueue(
            loader
                .new_request(uri("a"))
                .listener(listener.clone())
                .build()
                .unwrap(),
        )
        .unwrap();
    disposable.wait().await;

    assert_eq!(job_of(&disposable).state(), JobState::Completed);
    assert!(disposable.is_disposed());
    assert_eq!(
        listener.callbacks(),
        vec![Callback::Start, Callback::Success(DataSource::Network)]
    );
}

#[tokio::test]
async fn test_dispose_cancels_in_flight_fetch() {
    let fetcher = FakeFetcher::new().blocking();
    let loader = loader_with(fetcher.clone());
    let listener = RecordingListener::new();

    let disposable = loader
        .enqueue(
            loader
                .new_request(uri("a"))
                .listener(listener.clone())
                .build()
                .unwrap(),
        )
        .unwrap();
    assert!(eventually(|| fetcher.calls() == 1).await);

    disposable.dispose();
    assert!(disposable.is_disposed());
    assert_eq!(job_of(&disposable).state(), JobState::Cancelled);
    tokio::time::timeout(Duration::from_secs(1), disposable.wait())
        .await
        .expect("wait should return after dispose");

    assert!(eventually(|| listener.cancel_count() == 1).await);
    assert!(
        !listener
            .callbacks()
            .iter()
            .any(|c| matches!(c, Callback::Success(_) | Callback::Error(_)))
    );
    assert!(loader.memory_cache().is_empty());
}

#[tokio::test]
async fn test_concurrent_requests_all_complete() {
    let fetcher = FakeFetcher::new().with_delay(Duration::from_millis(10));
    let loader = loader_with(fetcher.clone());

    let requests = (0..8).map(|i| {
        let loader = loader.clone();
        async move {
            let request = loader
                .new_request(uri(&format!("image-{}", i)))
                .build()
                .unwrap();
            loader.execute(request).await
        }
    });
    let results = join_all(requests).await;

    assert!(results.iter().all(|result| result.is_ok()));
    assert_eq!(fetcher.calls(), 8);
    assert_eq!(loader.memory_cache().len(), 8);
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_and_rejects_new_requests() {
    let fetcher = FakeFetcher::new().blocking();
    let loader = loader_with(fetcher.clone());
    let target = RecordingTarget::new();

    let one_shot = loader
        .enqueue(loader.new_request(uri("a")).build().unwrap())
        .unwrap();
    let bound = loader
        .enqueue(
            loader
                .new_request(uri("b"))
                .target(target.clone())
                .build()
                .unwrap(),
        )
        .unwrap();
    assert!(eventually(|| fetcher.calls() == 2).await);

    loader.shutdown().await;

    assert_eq!(job_of(&one_shot).state(), JobState::Cancelled);
    assert!(bound.is_disposed());
    assert_eq!(loader.active_one_shot_count(), 0);
    assert!(matches!(
        loader.execute(loader.new_request(uri("c")).build().unwrap()).await,
        Err(Error::Shutdown)
    ));
    assert!(matches!(
        loader.enqueue(loader.new_request(uri("c")).build().unwrap()),
        Err(Error::Shutdown)
    ));
}

#[tokio::test]
async fn test_custom_fetcher_takes_priority_over_builtins() {
    let fetcher = FakeFetcher::new();
    assert!(fetcher.handles(&uri("a")));

    let loader = loader_with(fetcher.clone());
    let bytes = Data::Bytes(Arc::from(vec![1u8, 2, 3]));
    let result = loader
        .execute(loader.new_request(bytes).build().unwrap())
        .await
        .unwrap();

    // Bytes fall through to the built-in fetcher.
    assert_eq!(result.data_source, DataSource::Memory);
    assert_eq!(fetcher.calls(), 0);
}
