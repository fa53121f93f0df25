//! Test infrastructure for pixload.
//!
//! Provides in-memory fakes for the loader's ports so integration tests can
//! drive the full request lifecycle without real image codecs.
//!
//! # Usage
//!
//! ```ignore
//! use pixload_tests::{FakeFetcher, loader_with};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let fetcher = FakeFetcher::new();
//!     let loader = loader_with(fetcher.clone());
//! }
//! ```

pub mod fixtures;

pub use fixtures::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,pixload_loader=debug")),
        )
        .with_test_writer()
        .try_init();
}
