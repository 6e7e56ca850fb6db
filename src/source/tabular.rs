//! Tabular file extractor

use crate::config::{DatasetName, SourceConfig};
use crate::error::{EtlError, Result};
use crate::record::{RawPayload, RowSequence};
use std::sync::Arc;

/// Extractor for CSV datasets
///
/// Reads every row of the configured file in order. When the header flag is
/// set (the default) the first row is returned separately as the header.
/// Rows may have differing lengths; validating them is the transformer's job.
pub struct TabularFileExtractor {
    config: Arc<SourceConfig>,
    has_header: bool,
}

impl TabularFileExtractor {
    pub fn new(config: Arc<SourceConfig>) -> Self {
        Self {
            config,
            has_header: true,
        }
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Read all rows of the dataset's file
    pub fn read(&self, dataset: &DatasetName) -> Result<RawPayload> {
        let path = self.config.file_path(dataset)?;
        log::info!("Reading csv dataset '{}' from {}", dataset, path.display());

        // The reader owns the file handle, which is closed when it drops on
        // any return below.
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| {
                EtlError::extraction_caused(
                    dataset.as_str(),
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                EtlError::extraction_caused(
                    dataset.as_str(),
                    format!("failed to read row {} of {}", index + 1, path.display()),
                    e,
                )
            })?;
            rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        let header = match self.has_header && !rows.is_empty() {
            true => Some(rows.remove(0)),
            false => None,
        };

        log::debug!("Read {} row(s) from {}", rows.len(), path.display());
        Ok(RawPayload::Rows(RowSequence { header, rows }))
    }
}
