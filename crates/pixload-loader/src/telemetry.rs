//! Tracing setup for applications embedding the loader.

use pixload_core::{Error, Request, Result};
use serde::{Deserialize, Serialize};
use tracing::{Span, info_span};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub default_filter: String,
    pub format: LogFormat,
    pub with_target: bool,
    pub with_thread_ids: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            format: LogFormat::Pretty,
            with_target: true,
            with_thread_ids: true,
        }
    }
}

impl TracingConfig {
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Install a global subscriber. Fails if one is already set.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match config.format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(config.with_target)
                    .with_thread_ids(config.with_thread_ids),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(config.with_target)
                    .with_thread_ids(config.with_thread_ids),
            )
            .try_init(),
    };
    installed.map_err(|e| Error::Config(format!("Failed to install subscriber: {}", e)))
}

/// Span covering one execution of `request`.
pub fn request_span(request: &Request) -> Span {
    let target_id = request.target().map(|target| target.id().to_string());
    info_span!(
        "image_request",
        request_id = %request.id(),
        target_id = target_id.as_deref().unwrap_or("-"),
        data = %request.data(),
    )
}
