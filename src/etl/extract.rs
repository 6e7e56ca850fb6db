//! Extractor trait for data extraction from various sources

use crate::config::{DatasetName, SourceKind};
use crate::error::Result;
use crate::record::RawPayload;

/// Extractor trait for pulling a raw payload out of a source
///
/// Implementors resolve the dataset name against their registry first and
/// fail with [`EtlError::Config`](crate::error::EtlError::Config) before any
/// I/O when it is unknown.
///
/// # Example
/// ```no_run
/// use etl_pipeline::config::{DatasetName, SourceKind};
/// use etl_pipeline::error::Result;
/// use etl_pipeline::etl::Extractor;
/// use etl_pipeline::record::RawPayload;
///
/// struct StaticExtractor(serde_json::Value);
///
/// impl Extractor for StaticExtractor {
///     async fn extract(&self, _kind: SourceKind, _dataset: &DatasetName) -> Result<RawPayload> {
///         Ok(RawPayload::Json(self.0.clone()))
///     }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// Extract the raw payload of `dataset` from a source of `kind`
    ///
    /// # Errors
    /// `Config` for an unknown dataset, `Extraction` when the network call or
    /// file read fails.
    fn extract(
        &self,
        kind: SourceKind,
        dataset: &DatasetName,
    ) -> impl std::future::Future<Output = Result<RawPayload>> + Send;
}
