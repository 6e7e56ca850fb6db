//! Loader trait for loading data to destinations

use crate::error::Result;
use crate::record::{LoadPayload, LoadResult, LoadTarget};
use async_trait::async_trait;

/// Loader trait for persisting normalized records
///
/// Each call owns its own store connection from open to release. The
/// connection is released on every exit path, including failures.
///
/// # Example
/// ```no_run
/// use async_trait::async_trait;
/// use etl_pipeline::error::Result;
/// use etl_pipeline::etl::Loader;
/// use etl_pipeline::record::{LoadPayload, LoadResult, LoadTarget};
///
/// struct StdoutLoader;
///
/// #[async_trait]
/// impl Loader for StdoutLoader {
///     async fn load(&self, payload: LoadPayload, target: &LoadTarget) -> Result<LoadResult> {
///         let records = payload.into_records();
///         for record in &records {
///             println!("{}", record.to_json());
///         }
///         Ok(LoadResult { target: target.to_string(), inserted: records.len() })
///     }
/// }
/// ```
#[async_trait]
pub trait Loader: Send + Sync {
    /// Persist `payload` into `target`
    ///
    /// # Errors
    /// Returns a `Load` error if the connection or the write fails.
    async fn load(&self, payload: LoadPayload, target: &LoadTarget) -> Result<LoadResult>;
}
