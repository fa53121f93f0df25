//! The image loader: request execution, job tracking and target events.

use crate::config::LoaderConfig;
use crate::disposable::RequestDisposable;
use crate::fetchers::{BytesFetcher, FileFetcher};
use crate::job::{CancelSignal, Job};
use crate::pipeline::{PipelineStats, RequestPipeline};
use crate::registry::ComponentRegistry;
use crate::target::TargetRequestManager;
use crate::telemetry::request_span;
use pixload_cache::LruMemoryCache;
use pixload_core::events::TargetEvent;
use pixload_core::ports::{Decoder, Fetcher, MemoryCache, RequestListener};
use pixload_core::{
    Data, DefaultRequestOptions, Error, ImageResult, Request, RequestBuilder, Result,
};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};

/// Builder for [`ImageLoader`].
pub struct ImageLoaderBuilder {
    config: LoaderConfig,
    registry: ComponentRegistry,
    memory_cache: Option<Arc<dyn MemoryCache>>,
}

impl ImageLoaderBuilder {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            registry: ComponentRegistry::new(),
            memory_cache: None,
        }
    }

    /// Register a fetcher. Custom fetchers are consulted before the built-in
    /// file and bytes fetchers.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.registry = self.registry.with_fetcher(fetcher);
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.registry = self.registry.with_decoder(decoder);
        self
    }

    /// Replace the default LRU memory cache.
    pub fn with_memory_cache(mut self, cache: Arc<dyn MemoryCache>) -> Self {
        self.memory_cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<ImageLoader> {
        self.config.validate()?;

        let registry = self
            .registry
            .with_fetcher(Arc::new(FileFetcher))
            .with_fetcher(Arc::new(BytesFetcher));
        let memory_cache = self.memory_cache.unwrap_or_else(|| {
            Arc::new(LruMemoryCache::new(self.config.memory_cache_max_bytes))
        });
        let (events, event_rx) = mpsc::channel(self.config.target_event_capacity);
        let (shutdown, _) = watch::channel(false);

        info!(
            fetchers = registry.fetcher_count(),
            decoders = registry.decoder_count(),
            memory_cache_max_bytes = self.config.memory_cache_max_bytes,
            "Image loader created"
        );

        Ok(ImageLoader {
            inner: Arc::new(LoaderInner {
                defaults: self.config.default_request_options(),
                pipeline: Arc::new(RequestPipeline::new(Arc::new(registry), memory_cache)),
                targets: Arc::new(TargetRequestManager::new()),
                one_shots: Mutex::new(Vec::new()),
                events,
                event_rx: Mutex::new(Some(event_rx)),
                shutdown,
                listener: Mutex::new(None),
            }),
        })
    }
}

/// Loads images. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ImageLoader {
    inner: Arc<LoaderInner>,
}

struct LoaderInner {
    defaults: DefaultRequestOptions,
    pipeline: Arc<RequestPipeline>,
    targets: Arc<TargetRequestManager>,
    one_shots: Mutex<Vec<Job>>,
    events: mpsc::Sender<TargetEvent>,
    /// Taken by the listener on [`ImageLoader::start`].
    event_rx: Mutex<Option<mpsc::Receiver<TargetEvent>>>,
    shutdown: watch::Sender<bool>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ImageLoader {
    pub fn builder(config: LoaderConfig) -> ImageLoaderBuilder {
        ImageLoaderBuilder::new(config)
    }

    /// Start a request for `data` with this loader's defaults.
    pub fn new_request(&self, data: Data) -> RequestBuilder {
        Request::builder(data, &self.inner.defaults)
    }

    pub fn defaults(&self) -> &DefaultRequestOptions {
        &self.inner.defaults
    }

    /// Run `request` on the calling task and return its image.
    ///
    /// The request is not tracked, so it is neither cancelled by
    /// [`shutdown`](Self::shutdown) nor registered with its target.
    pub async fn execute(&self, request: Request) -> Result<ImageResult> {
        self.ensure_running()?;
        let span = request_span(&request);
        run_request(&self.inner.pipeline, &request, &CancelSignal::detached())
            .instrument(span)
            .await
    }

    /// Spawn `request` as a job and return a handle to it.
    ///
    /// A request with a target replaces (and cancels) the target's current
    /// request. Must be called within a tokio runtime.
    pub fn enqueue(&self, request: Request) -> Result<RequestDisposable> {
        self.ensure_running()?;

        let request = Arc::new(request);
        let job = self.inner.spawn_job(Arc::clone(&request));
        let disposable = match request.target().map(|target| target.id()) {
            Some(target_id) => {
                self.inner
                    .targets
                    .set_current_request(target_id, Arc::clone(&request), job.clone());
                RequestDisposable::target_bound(
                    Arc::clone(&self.inner.targets),
                    target_id,
                    Arc::clone(&request),
                )
            }
            None => {
                self.inner.track_one_shot(job.clone());
                RequestDisposable::one_shot(job.clone())
            }
        };

        // Shutdown may have drained the trackers while the job was registered.
        if self.is_shut_down() {
            job.cancel();
            return Err(Error::Shutdown);
        }

        debug!(request_id = %request.id(), job_id = %job.id(), "Request enqueued");
        Ok(disposable)
    }

    /// Apply a target lifecycle event immediately.
    pub fn handle_target_event(&self, event: TargetEvent) {
        self.inner.handle_target_event(event);
    }

    /// Queue a target event for the listener started by [`start`](Self::start).
    ///
    /// Events are never dropped. Once `target_event_capacity` events are
    /// queued this waits for the listener to catch up, so events published
    /// before `start` wait until it is called.
    pub async fn publish_target_event(&self, event: TargetEvent) -> Result<()> {
        self.ensure_running()?;
        self.inner
            .events
            .send(event)
            .await
            .map_err(|_| Error::Shutdown)
    }

    pub fn target_events(&self) -> mpsc::Sender<TargetEvent> {
        self.inner.events.clone()
    }

    /// Start listening for published target events. Calling it again is a
    /// no-op.
    pub fn start(&self) -> Result<()> {
        self.ensure_running()?;

        let mut listener = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(events) = self
            .inner
            .event_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return Ok(());
        };

        let shutdown = self.inner.shutdown.subscribe();
        let inner = Arc::downgrade(&self.inner);
        *listener = Some(tokio::spawn(listen_for_target_events(inner, events, shutdown)));
        Ok(())
    }

    /// Reject new requests, cancel every tracked job and stop the event
    /// listener. Idempotent.
    pub async fn shutdown(&self) {
        let first = self.inner.shutdown.send_if_modified(|stopped| {
            if *stopped {
                return false;
            }
            *stopped = true;
            true
        });
        if !first {
            return;
        }

        self.inner.targets.shutdown();
        let one_shots: Vec<Job> = std::mem::take(
            &mut *self
                .inner
                .one_shots
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for job in &one_shots {
            job.cancel();
        }

        let listener = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = listener {
            let _ = handle.await;
        }
        info!(one_shot_jobs = one_shots.len(), "Image loader shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    pub fn memory_cache(&self) -> &Arc<dyn MemoryCache> {
        self.inner.pipeline.memory_cache()
    }

    pub fn targets(&self) -> &Arc<TargetRequestManager> {
        &self.inner.targets
    }

    pub fn stats(&self) -> PipelineStats {
        self.inner.pipeline.stats()
    }

    /// Number of untargeted jobs still running.
    pub fn active_one_shot_count(&self) -> usize {
        let mut jobs = self
            .inner
            .one_shots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        jobs.retain(Job::is_active);
        jobs.len()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::Shutdown);
        }
        Ok(())
    }
}

impl LoaderInner {
    fn spawn_job(&self, request: Arc<Request>) -> Job {
        let pipeline = Arc::clone(&self.pipeline);
        Job::spawn(move |signal| {
            let span = request_span(&request);
            async move {
                run_request(&pipeline, &request, &signal).await?;
                Ok(())
            }
            .instrument(span)
        })
    }

    fn track_one_shot(&self, job: Job) {
        let mut jobs = self.one_shots.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.retain(Job::is_active);
        jobs.push(job);
    }

    fn handle_target_event(&self, event: TargetEvent) {
        debug!(target_id = %event.target_id(), event = event.kind(), "Target event");
        match event {
            TargetEvent::Attached { target_id } => {
                let Some(request) = self.targets.on_attached(target_id) else {
                    return;
                };
                if *self.shutdown.borrow() {
                    return;
                }
                let job = self.spawn_job(Arc::clone(&request));
                if self.targets.restart_request(target_id, &request, job) {
                    debug!(
                        target_id = %target_id,
                        request_id = %request.id(),
                        "Restarted request on attach"
                    );
                }
            }
            TargetEvent::Detached { target_id } => self.targets.on_detached(target_id),
            TargetEvent::Destroyed { target_id } => self.targets.remove_target(target_id),
        }
    }
}

async fn listen_for_target_events(
    inner: Weak<LoaderInner>,
    mut events: mpsc::Receiver<TargetEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Target event listener started");
    loop {
        tokio::select! {
            received = events.recv() => {
                let Some(event) = received else {
                    break;
                };
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.handle_target_event(event);
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("Target event listener stopped");
}

/// Run the pipeline for `request` and deliver the outcome to its target and
/// listener.
async fn run_request(
    pipeline: &RequestPipeline,
    request: &Request,
    signal: &CancelSignal,
) -> Result<ImageResult> {
    let mut cancel_notice = CancelNotice::new(request.listener());
    if let Some(target) = request.target() {
        target.on_start();
    }
    if let Some(listener) = request.listener() {
        listener.on_start();
    }

    let outcome = match pipeline.execute(request, signal).await {
        // A replaced request must not deliver over its successor.
        Ok(result) => signal.ensure_active().map(|()| result),
        Err(e) => Err(e),
    };

    match &outcome {
        Ok(result) => {
            cancel_notice.disarm();
            debug!(data_source = %result.data_source, "Request succeeded");
            if let Some(target) = request.target() {
                target.on_success(result);
            }
            if let Some(listener) = request.listener() {
                listener.on_success(result);
            }
        }
        Err(Error::Cancelled) => debug!("Request cancelled"),
        Err(e) => {
            cancel_notice.disarm();
            warn!(error = %e, "Request failed");
            if let Some(target) = request.target() {
                target.on_error(e);
            }
            if let Some(listener) = request.listener() {
                listener.on_error(e);
            }
        }
    }
    outcome
}

/// Calls the listener's `on_cancel` when dropped while armed, which covers
/// both a cancelled result and a task aborted mid-flight.
struct CancelNotice {
    listener: Option<Arc<dyn RequestListener>>,
}

impl CancelNotice {
    fn new(listener: Option<&Arc<dyn RequestListener>>) -> Self {
        Self {
            listener: listener.cloned(),
        }
    }

    fn disarm(&mut self) {
        self.listener = None;
    }
}

impl Drop for CancelNotice {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.on_cancel();
        }
    }
}
