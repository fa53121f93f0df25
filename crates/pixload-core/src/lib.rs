//! pixload core
//!
//! Domain types, port traits and error handling for pixload.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used by the cache and loader crates.

pub mod error;
pub mod events;
pub mod ids;
pub mod image;
pub mod parameters;
pub mod ports;
pub mod request;
pub mod size;

pub use error::{Error, Result};
pub use ids::*;
pub use image::{CachedImage, DataSource, DecodeResult, Image, ImageResult, PixelFormat, SourceResult};
pub use parameters::{Parameter, Parameters};
pub use request::{CachePolicy, Data, DefaultRequestOptions, Options, Request, RequestBuilder};
pub use size::{PixelSize, Precision, Scale, Size};
