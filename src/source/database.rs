//! Database source hook

use crate::config::{DatasetName, SourceConfig};
use crate::error::{EtlError, Result};
use crate::record::RawPayload;
use std::sync::Arc;

/// Hook point for relational sources.
///
/// Dataset names are resolved like every other source, then extraction
/// fails with an `Extraction` error because no database driver is wired in.
pub struct DatabaseExtractor {
    config: Arc<SourceConfig>,
}

impl DatabaseExtractor {
    pub fn new(config: Arc<SourceConfig>) -> Self {
        Self { config }
    }

    pub fn query(&self, dataset: &DatasetName) -> Result<RawPayload> {
        let locator = self.config.database(dataset)?;
        log::debug!("Database dataset '{}' resolves to {}", dataset, locator);

        Err(EtlError::extraction(
            dataset.as_str(),
            "database sources are not implemented",
        ))
    }
}
