//! pixload loader
//!
//! Executes image requests: fetch, decode, transform and memory caching,
//! with cancellable jobs, per-target request tracking and disposable handles.

pub mod config;
pub mod disposable;
pub mod fetchers;
pub mod job;
pub mod loader;
pub mod pipeline;
pub mod registry;
pub mod target;
pub mod telemetry;

pub use config::LoaderConfig;
pub use disposable::RequestDisposable;
pub use fetchers::{BytesFetcher, FileFetcher};
pub use job::{CancelSignal, Job, JobState};
pub use loader::{ImageLoader, ImageLoaderBuilder};
pub use pipeline::{PipelineStats, RequestPipeline};
pub use registry::ComponentRegistry;
pub use target::{CurrentRequest, TargetPhase, TargetRequestManager};
pub use telemetry::{LogFormat, TracingConfig, init_tracing};
