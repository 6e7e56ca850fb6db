//! Source adapters
//!
//! One extractor per [`SourceKind`], plus [`SourceExtractor`] which routes an
//! `extract(kind, dataset)` call to the right one. Every adapter resolves the
//! dataset name against the shared [`SourceConfig`] before touching the
//! network or the file system.

mod api;
mod database;
mod tabular;

pub use api::ApiExtractor;
pub use database::DatabaseExtractor;
pub use tabular::TabularFileExtractor;

use crate::client::ApiClient;
use crate::config::{DatasetName, SourceConfig, SourceKind};
use crate::error::Result;
use crate::etl::Extractor;
use crate::record::RawPayload;
use std::sync::Arc;

/// Extractor over every source kind, sharing one read-only registry.
pub struct SourceExtractor {
    config: Arc<SourceConfig>,
    api: ApiExtractor,
    tabular: TabularFileExtractor,
    database: DatabaseExtractor,
}

impl SourceExtractor {
    /// Build the extractors for `config`. Tabular files are read with a
    /// header row by default.
    ///
    /// # Errors
    /// Returns a `Config` error if the HTTP client cannot be built
    pub fn new(config: impl Into<Arc<SourceConfig>>) -> Result<Self> {
        let config = config.into();
        Ok(Self {
            api: ApiExtractor::new(config.clone(), ApiClient::try_new()?),
            tabular: TabularFileExtractor::new(config.clone()),
            database: DatabaseExtractor::new(config.clone()),
            config,
        })
    }

    /// Whether tabular files start with a header row to skip
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.tabular = self.tabular.with_header(has_header);
        self
    }

    pub fn config(&self) -> &Arc<SourceConfig> {
        &self.config
    }
}

impl Extractor for SourceExtractor {
    async fn extract(&self, kind: SourceKind, dataset: &DatasetName) -> Result<RawPayload> {
        match kind {
            SourceKind::Api => self.api.fetch(dataset).await,
            SourceKind::Csv => self.tabular.read(dataset),
            SourceKind::Database => self.database.query(dataset),
        }
    }
}
