//! Fakes for the loader's ports.

use async_trait::async_trait;
use pixload_core::ports::{Decoder, Fetcher, RequestListener, Target, Transformation};
use pixload_core::{
    Data, DataSource, DecodeResult, Error, Image, ImageResult, Options, Result, Size,
    SourceResult, TargetId,
};
use pixload_loader::{ImageLoader, LoaderConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Mime type produced by [`FakeFetcher`].
pub const FAKE_MIME_TYPE: &str = "image/x-fake";

/// Fetcher for `Data::Uri` that returns a few placeholder bytes.
///
/// Clones share the call counter.
#[derive(Debug, Clone)]
pub struct FakeFetcher {
    cacheable: bool,
    delay: Option<Duration>,
    blocking: bool,
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl Default for FakeFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            cacheable: true,
            delay: None,
            blocking: false,
            failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Report no cache key, so results are never cached.
    pub fn uncacheable(mut self) -> Self {
        self.cacheable = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Never finish fetching.
    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of fetches started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    fn handles(&self, data: &Data) -> bool {
        matches!(data, Data::Uri(_))
    }

    fn key(&self, data: &Data) -> Option<String> {
        self.cacheable.then(|| data.to_string())
    }

    async fn fetch(&self, _data: &Data, _size: Size, _options: &Options) -> Result<SourceResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.blocking {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(Error::Fetch(message.clone()));
        }
        Ok(SourceResult {
            bytes: Arc::from(vec![0u8; 16]),
            mime_type: Some(FAKE_MIME_TYPE.to_string()),
            data_source: DataSource::Network,
        })
    }
}

/// Decoder that produces a blank image.
///
/// The source is treated as `native_width` x `native_height`. When a smaller
/// pixel size is requested the image is sampled down to it (keeping the
/// requested dimensions), otherwise the native size is returned unsampled.
#[derive(Debug, Clone)]
pub struct FakeDecoder {
    native_width: u32,
    native_height: u32,
    calls: Arc<AtomicUsize>,
}

impl Default for FakeDecoder {
    fn default() -> Self {
        Self::new(100, 100)
    }
}

impl FakeDecoder {
    pub fn new(native_width: u32, native_height: u32) -> Self {
        Self {
            native_width,
            native_height,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Decoder for FakeDecoder {
    fn handles(&self, _source: &SourceResult) -> bool {
        true
    }

    async fn decode(
        &self,
        _source: SourceResult,
        size: Size,
        options: &Options,
    ) -> Result<DecodeResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (width, height, is_sampled) = match size {
            Size::Pixels(px) if px.width() < self.native_width && px.height() < self.native_height => {
                (px.width(), px.height(), true)
            }
            _ => (self.native_width, self.native_height, false),
        };
        Ok(DecodeResult {
            image: Image::blank(width, height, options.format),
            is_sampled,
        })
    }
}

/// Transformation that returns its input and counts invocations.
#[derive(Debug, Clone)]
pub struct FakeTransformation {
    key: String,
    calls: Arc<AtomicUsize>,
}

impl FakeTransformation {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transformation for FakeTransformation {
    fn key(&self) -> String {
        self.key.clone()
    }

    async fn transform(&self, input: Image) -> Result<Image> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(input)
    }
}

/// A callback observed by [`RecordingTarget`] or [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Start,
    Success(DataSource),
    Error(String),
    Cancel,
}

#[derive(Debug, Default)]
struct Recorder {
    callbacks: Mutex<Vec<Callback>>,
}

impl Recorder {
    fn record(&self, callback: Callback) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }

    fn snapshot(&self) -> Vec<Callback> {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Target that records its callbacks.
#[derive(Debug)]
pub struct RecordingTarget {
    id: TargetId,
    size: Option<Size>,
    recorder: Recorder,
}

impl RecordingTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: TargetId::new(),
            size: None,
            recorder: Recorder::default(),
        })
    }

    pub fn with_size(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            id: TargetId::new(),
            size: Size::pixels(width, height).ok(),
            recorder: Recorder::default(),
        })
    }

    pub fn callbacks(&self) -> Vec<Callback> {
        self.recorder.snapshot()
    }

    pub fn success_count(&self) -> usize {
        count(&self.callbacks(), |c| matches!(c, Callback::Success(_)))
    }

    pub fn error_count(&self) -> usize {
        count(&self.callbacks(), |c| matches!(c, Callback::Error(_)))
    }
}

impl Target for RecordingTarget {
    fn id(&self) -> TargetId {
        self.id
    }

    fn size(&self) -> Option<Size> {
        self.size
    }

    fn on_start(&self) {
        self.recorder.record(Callback::Start);
    }

    fn on_success(&self, result: &ImageResult) {
        self.recorder.record(Callback::Success(result.data_source));
    }

    fn on_error(&self, error: &Error) {
        self.recorder.record(Callback::Error(error.to_string()));
    }
}

/// Listener that records its callbacks.
#[derive(Debug, Default)]
pub struct RecordingListener {
    recorder: Recorder,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn callbacks(&self) -> Vec<Callback> {
        self.recorder.snapshot()
    }

    pub fn cancel_count(&self) -> usize {
        count(&self.callbacks(), |c| *c == Callback::Cancel)
    }
}

impl RequestListener for RecordingListener {
    fn on_start(&self) {
        self.recorder.record(Callback::Start);
    }

    fn on_success(&self, result: &ImageResult) {
        self.recorder.record(Callback::Success(result.data_source));
    }

    fn on_error(&self, error: &Error) {
        self.recorder.record(Callback::Error(error.to_string()));
    }

    fn on_cancel(&self) {
        self.recorder.record(Callback::Cancel);
    }
}

fn count(callbacks: &[Callback], predicate: impl Fn(&Callback) -> bool) -> usize {
    callbacks.iter().filter(|c| predicate(c)).count()
}

/// Build a loader with `fetcher` and a default [`FakeDecoder`].
pub fn loader_with(fetcher: FakeFetcher) -> ImageLoader {
    loader_with_config(fetcher, LoaderConfig::default())
}

pub fn loader_with_config(fetcher: FakeFetcher, config: LoaderConfig) -> ImageLoader {
    ImageLoader::builder(config)
        .with_fetcher(Arc::new(fetcher))
        .with_decoder(Arc::new(FakeDecoder::default()))
        .build()
        .expect("Failed to build test loader")
}

/// URI data for `name`.
pub fn uri(name: &str) -> Data {
    Data::Uri(format!("https://images.test/{}", name))
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
