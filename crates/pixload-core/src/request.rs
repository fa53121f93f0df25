//! Image requests and their builder.

use crate::ids::RequestId;
use crate::image::PixelFormat;
use crate::parameters::Parameters;
use crate::ports::{RequestListener, Target, Transformation};
use crate::size::{Precision, Scale, Size};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Source reference for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Data {
    Uri(String),
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Uri(uri) => f.write_str(uri),
            Data::Path(path) => write!(f, "{}", path.display()),
            Data::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// Read/write policy for one cache tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    #[default]
    Enabled,
    ReadOnly,
    WriteOnly,
    Disabled,
}

impl CachePolicy {
    pub fn read_enabled(self) -> bool {
        matches!(self, CachePolicy::Enabled | CachePolicy::ReadOnly)
    }

    pub fn write_enabled(self) -> bool {
        matches!(self, CachePolicy::Enabled | CachePolicy::WriteOnly)
    }
}

/// Loader-wide defaults applied before a request's explicit overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultRequestOptions {
    pub scale: Scale,
    pub precision: Precision,
    pub format: PixelFormat,
    pub allow_hardware: bool,
    pub allow_reduced_color: bool,
    pub memory_cache_policy: CachePolicy,
    pub disk_cache_policy: CachePolicy,
    pub network_cache_policy: CachePolicy,
}

impl Default for DefaultRequestOptions {
    fn default() -> Self {
        Self {
            scale: Scale::Fill,
            precision: Precision::Inexact,
            format: PixelFormat::Argb8888,
            allow_hardware: true,
            allow_reduced_color: false,
            memory_cache_policy: CachePolicy::Enabled,
            disk_cache_policy: CachePolicy::Enabled,
            network_cache_policy: CachePolicy::Enabled,
        }
    }
}

/// Per-request settings handed to fetchers and decoders.
#[derive(Debug, Clone)]
pub struct Options {
    pub format: PixelFormat,
    pub scale: Scale,
    pub allow_reduced_color: bool,
    pub parameters: Parameters,
    pub disk_cache_policy: CachePolicy,
    pub network_cache_policy: CachePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestedSize {
    Resolve,
    Original,
    Pixels(u32, u32),
}

/// An immutable image request.
#[derive(Clone)]
pub struct Request {
    id: RequestId,
    data: Data,
    target: Option<Arc<dyn Target>>,
    size: Option<Size>,
    scale: Scale,
    precision: Precision,
    format: PixelFormat,
    allow_hardware: bool,
    allow_reduced_color: bool,
    memory_cache_policy: CachePolicy,
    disk_cache_policy: CachePolicy,
    network_cache_policy: CachePolicy,
    parameters: Parameters,
    transformations: Vec<Arc<dyn Transformation>>,
    listener: Option<Arc<dyn RequestListener>>,
}

impl Request {
    pub fn builder(data: Data, defaults: &DefaultRequestOptions) -> RequestBuilder {
        RequestBuilder::new(data, defaults)
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn target(&self) -> Option<&Arc<dyn Target>> {
        self.target.as_ref()
    }

    /// Explicit size, or `None` when it should be resolved from the target.
    pub fn size(&self) -> Option<Size> {
        self.size
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Preferred pixel format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn allow_hardware(&self) -> bool {
        self.allow_hardware
    }

    pub fn allow_reduced_color(&self) -> bool {
        self.allow_reduced_color
    }

    pub fn memory_cache_policy(&self) -> CachePolicy {
        self.memory_cache_policy
    }

    pub fn disk_cache_policy(&self) -> CachePolicy {
        self.disk_cache_policy
    }

    pub fn network_cache_policy(&self) -> CachePolicy {
        self.network_cache_policy
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn transformations(&self) -> &[Arc<dyn Transformation>] {
        &self.transformations
    }

    pub fn listener(&self) -> Option<&Arc<dyn RequestListener>> {
        self.listener.as_ref()
    }

    /// A builder pre-filled with this request's values. The built request
    /// gets a fresh id.
    pub fn to_builder(&self) -> RequestBuilder {
        RequestBuilder {
            data: self.data.clone(),
            target: self.target.clone(),
            size: match self.size {
                None => RequestedSize::Resolve,
                Some(Size::Original) => RequestedSize::Original,
                Some(Size::Pixels(p)) => RequestedSize::Pixels(p.width(), p.height()),
            },
            scale: self.scale,
            precision: self.precision,
            format: self.format,
            allow_hardware: self.allow_hardware,
            allow_reduced_color: self.allow_reduced_color,
            memory_cache_policy: self.memory_cache_policy,
            disk_cache_policy: self.disk_cache_policy,
            network_cache_policy: self.network_cache_policy,
            parameters: self.parameters.clone(),
            transformations: self.transformations.clone(),
            listener: self.listener.clone(),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("data", &self.data)
            .field("target", &self.target.as_ref().map(|t| t.id()))
            .field("size", &self.size)
            .field("scale", &self.scale)
            .field("precision", &self.precision)
            .field("format", &self.format)
            .field("allow_hardware", &self.allow_hardware)
            .field("allow_reduced_color", &self.allow_reduced_color)
            .field("memory_cache_policy", &self.memory_cache_policy)
            .field("parameters", &self.parameters)
            .field(
                "transformations",
                &self.transformations.iter().map(|t| t.key()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builds a [`Request`] from loader defaults plus explicit overrides.
pub struct RequestBuilder {
    data: Data,
    target: Option<Arc<dyn Target>>,
    size: RequestedSize,
    scale: Scale,
    precision: Precision,
    format: PixelFormat,
    allow_hardware: bool,
    allow_reduced_color: bool,
    memory_cache_policy: CachePolicy,
    disk_cache_policy: CachePolicy,
    network_cache_policy: CachePolicy,
    parameters: Parameters,
    transformations: Vec<Arc<dyn Transformation>>,
    listener: Option<Arc<dyn RequestListener>>,
}

impl RequestBuilder {
    pub fn new(data: Data, defaults: &DefaultRequestOptions) -> Self {
        Self {
            data,
            target: None,
            size: RequestedSize::Resolve,
            scale: defaults.scale,
            precision: defaults.precision,
            format: defaults.format,
            allow_hardware: defaults.allow_hardware,
            allow_reduced_color: defaults.allow_reduced_color,
            memory_cache_policy: defaults.memory_cache_policy,
            disk_cache_policy: defaults.disk_cache_policy,
            network_cache_policy: defaults.network_cache_policy,
            parameters: Parameters::empty(),
            transformations: Vec::new(),
            listener: None,
        }
    }

    pub fn data(mut self, data: Data) -> Self {
        self.data = data;
        self
    }

    /// Bind the request to a presentation target.
    pub fn target(mut self, target: Arc<dyn Target>) -> Self {
        self.target = Some(target);
        self
    }

    /// Request exact pixel dimensions. Zero dimensions fail at [`build`](Self::build).
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.size = RequestedSize::Pixels(width, height);
        self
    }

    pub fn original_size(mut self) -> Self {
        self.size = RequestedSize::Original;
        self
    }

    pub fn scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    pub fn precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn allow_hardware(mut self, allow: bool) -> Self {
        self.allow_hardware = allow;
        self
    }

    pub fn allow_reduced_color(mut self, allow: bool) -> Self {
        self.allow_reduced_color = allow;
        self
    }

    pub fn memory_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.memory_cache_policy = policy;
        self
    }

    pub fn disk_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.disk_cache_policy = policy;
        self
    }

    pub fn network_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.network_cache_policy = policy;
        self
    }

    /// Set a parameter excluded from the cache key.
    pub fn parameter<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.parameters = self.parameters.to_builder().set(name, value).build();
        self
    }

    /// Set a parameter whose `cache_key` becomes part of the cache key.
    pub fn cached_parameter<T: Any + Send + Sync>(
        mut self,
        name: impl Into<String>,
        value: T,
        cache_key: impl Into<String>,
    ) -> Self {
        self.parameters = self
            .parameters
            .to_builder()
            .set_cached(name, value, cache_key)
            .build();
        self
    }

    /// Merge a parameter set over the current one.
    pub fn parameters(mut self, parameters: &Parameters) -> Self {
        self.parameters = self.parameters.merge(parameters);
        self
    }

    pub fn transformation(mut self, transformation: Arc<dyn Transformation>) -> Self {
        self.transformations.push(transformation);
        self
    }

    /// Replace the transformation chain.
    pub fn transformations(mut self, transformations: Vec<Arc<dyn Transformation>>) -> Self {
        self.transformations = transformations;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn RequestListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn build(self) -> Result<Request> {
        let size = match self.size {
            RequestedSize::Resolve => None,
            RequestedSize::Original => Some(Size::Original),
            RequestedSize::Pixels(width, height) => Some(Size::pixels(width, height)?),
        };

        Ok(Request {
            id: RequestId::new(),
            data: self.data,
            target: self.target,
            size,
            scale: self.scale,
            precision: self.precision,
            format: self.format,
            // Hardware images cannot be handed to transformations.
            allow_hardware: self.allow_hardware && self.transformations.is_empty(),
            allow_reduced_color: self.allow_reduced_color,
            memory_cache_policy: self.memory_cache_policy,
            disk_cache_policy: self.disk_cache_policy,
            network_cache_policy: self.network_cache_policy,
            parameters: self.parameters,
            transformations: self.transformations,
            listener: self.listener,
        })
    }
}
