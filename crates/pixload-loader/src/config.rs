//! Loader configuration.

use pixload_core::{CachePolicy, DefaultRequestOptions, Error, PixelFormat, Precision, Result, Scale};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Image loader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Memory cache capacity in bytes.
    #[serde(default = "default_memory_cache_bytes")]
    pub memory_cache_max_bytes: usize,
    /// Capacity of the target event queue. Publishers wait once it is full;
    /// events are never dropped.
    #[serde(default = "default_event_capacity")]
    pub target_event_capacity: usize,
    #[serde(default)]
    pub scale: Scale,
    #[serde(default)]
    pub precision: Precision,
    #[serde(default)]
    pub format: PixelFormat,
    #[serde(default = "default_true")]
    pub allow_hardware: bool,
    #[serde(default)]
    pub allow_reduced_color: bool,
    #[serde(default)]
    pub memory_cache_policy: CachePolicy,
    #[serde(default)]
    pub disk_cache_policy: CachePolicy,
    #[serde(default)]
    pub network_cache_policy: CachePolicy,
}

fn default_memory_cache_bytes() -> usize {
    pixload_cache::memory::DEFAULT_MAX_SIZE_BYTES
}

fn default_event_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            memory_cache_max_bytes: default_memory_cache_bytes(),
            target_event_capacity: default_event_capacity(),
            scale: Scale::default(),
            precision: Precision::default(),
            format: PixelFormat::default(),
            allow_hardware: true,
            allow_reduced_color: false,
            memory_cache_policy: CachePolicy::Enabled,
            disk_cache_policy: CachePolicy::Enabled,
            network_cache_policy: CachePolicy::Enabled,
        }
    }
}

impl LoaderConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_event_capacity == 0 {
            return Err(Error::Config(
                "target_event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the memory cache capacity.
    pub fn with_memory_cache_bytes(mut self, bytes: usize) -> Self {
        self.memory_cache_max_bytes = bytes;
        self
    }

    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_allow_hardware(mut self, allow: bool) -> Self {
        self.allow_hardware = allow;
        self
    }

    pub fn with_allow_reduced_color(mut self, allow: bool) -> Self {
        self.allow_reduced_color = allow;
        self
    }

    pub fn with_memory_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.memory_cache_policy = policy;
        self
    }

    /// Defaults applied to every request built against this loader.
    pub fn default_request_options(&self) -> DefaultRequestOptions {
        DefaultRequestOptions {
            scale: self.scale,
            precision: self.precision,
            format: self.format,
            allow_hardware: self.allow_hardware,
            allow_reduced_color: self.allow_reduced_color,
            memory_cache_policy: self.memory_cache_policy,
            disk_cache_policy: self.disk_cache_policy,
            network_cache_policy: self.network_cache_policy,
        }
    }
}
