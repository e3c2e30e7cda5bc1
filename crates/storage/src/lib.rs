//! Storage Pipeline: fetch a generated asset and publish it to durable
//! hosting.
//!
//! Two strategies are available ([`StorageMode`]): download the asset to
//! local storage and upload the file, or hold it in memory and upload the
//! buffer. Every network step runs under [`retry::RetryPolicy`], and a
//! failed buffer publish falls back to the download strategy.

pub mod config;
pub mod error;
pub mod fetch;
pub mod host;
pub mod layout;
pub mod pipeline;
pub mod retry;

pub use config::StorageConfig;
pub use error::StorageError;
pub use fetch::{Fetcher, HttpFetcher};
pub use host::{CatboxHost, MediaHost};
pub use layout::StorageTarget;
pub use pipeline::{StorageMode, StoragePipeline, StorageResult};
pub use retry::RetryPolicy;

/// Browser user agent sent with downloads and uploads. Some CDNs and the
/// hosting service reject unknown clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
