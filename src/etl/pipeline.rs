//! Pipeline orchestration for ETL operations

use super::{Extractor, Loader, Transformer};
use crate::config::{DatasetName, SourceKind};
use crate::error::Result;
use crate::record::{LoadPayload, LoadResult, LoadTarget, NormalizedRecord, RawPayload};

/// ETL Pipeline that runs one Extract, Transform, Load pass
///
/// Stages run strictly in order. A failed extract or transform returns
/// before the loader is touched, so a failed upstream stage never causes a
/// partial write.
///
/// # Type Parameters
/// - `E`: Extractor type
/// - `T`: Transformer from `RawPayload` to normalized records
/// - `L`: Loader type
///
/// # Example
/// ```no_run
/// use etl_pipeline::etl::Pipeline;
/// use etl_pipeline::record::LoadTarget;
/// use etl_pipeline::source::SourceExtractor;
/// use etl_pipeline::storage::NdjsonSink;
/// use etl_pipeline::transform::NestedFlattenTransformer;
/// use etl_pipeline::config::{SourceConfig, SourceKind, DatasetName};
///
/// # async fn example() -> etl_pipeline::error::Result<()> {
/// let config = SourceConfig::load("data_config.json")?;
/// let extractor = SourceExtractor::new(config)?;
/// let transformer = NestedFlattenTransformer::new();
/// let loader = NdjsonSink::new("pollution.ndjson");
///
/// let pipeline = Pipeline::new(&extractor, &transformer, &loader);
/// let result = pipeline
///     .run(SourceKind::Api, &DatasetName::new("pollution"), &LoadTarget::new("air"))
///     .await?;
/// println!("Loaded {} records", result.inserted);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<'a, E: ?Sized, T: ?Sized, L: ?Sized> {
    extractor: &'a E,
    transformer: &'a T,
    loader: &'a L,
}

impl<'a, E, T, L> Pipeline<'a, E, T, L>
where
    E: Extractor + ?Sized,
    T: Transformer<Input = RawPayload, Output = Vec<NormalizedRecord>> + ?Sized,
    L: Loader + ?Sized,
{
    /// Create a new pipeline
    pub fn new(extractor: &'a E, transformer: &'a T, loader: &'a L) -> Self {
        Self {
            extractor,
            transformer,
            loader,
        }
    }

    /// Run the complete ETL pipeline
    ///
    /// Steps:
    /// 1. Extract the raw payload of `dataset`
    /// 2. Transform it into normalized records
    /// 3. Load the records as one batch into `target`
    ///
    /// # Errors
    /// Returns the error of the first stage that fails
    pub async fn run(
        &self,
        kind: SourceKind,
        dataset: &DatasetName,
        target: &LoadTarget,
    ) -> Result<LoadResult> {
        log::info!("Starting ETL pipeline for {}/{}", kind, dataset);

        // Extract
        log::debug!("Extracting from source...");
        let payload = self.extractor.extract(kind, dataset).await?;
        log::info!("Extracted {} payload", payload.shape());

        // Transform
        log::debug!("Transforming payload...");
        let records = self.transformer.transform(payload)?;
        log::info!("Transformed into {} record(s)", records.len());

        if records.is_empty() {
            log::warn!("No records to load, pipeline complete");
            return Ok(LoadResult {
                target: target.to_string(),
                inserted: 0,
            });
        }

        // Load
        log::debug!("Loading to {}...", target);
        let result = self.loader.load(LoadPayload::Batch(records), target).await?;
        log::info!("Loaded {} record(s) into {}", result.inserted, result.target);

        Ok(result)
    }
}
