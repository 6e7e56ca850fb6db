//! NDJSON (Newline Delimited JSON) output

use crate::error::{EtlError, Result};
use crate::etl::Loader;
use crate::record::{LoadPayload, LoadResult, LoadTarget, NormalizedRecord};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Loader that writes records to a file, one JSON object per line
///
/// Used for dry runs: the load target is recorded in the result but nothing
/// is sent to a store.
pub struct NdjsonSink {
    path: PathBuf,
    append: bool,
}

impl NdjsonSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            append: false,
        }
    }

    /// Append to an existing file instead of truncating it
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write records as NDJSON
    pub fn write(&self, records: &[NormalizedRecord]) -> Result<()> {
        let target = self.path.display().to_string();

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.append)
            .truncate(!self.append)
            .open(&self.path)
            .map_err(|e| EtlError::load_caused(&target, "failed to open output file", e))?;

        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| EtlError::load_caused(&target, "failed to serialize record", e))?;
            writeln!(file, "{}", line)
                .map_err(|e| EtlError::load_caused(&target, "failed to write output file", e))?;
        }

        Ok(())
    }
}

#[async_trait]
impl Loader for NdjsonSink {
    async fn load(&self, payload: LoadPayload, target: &LoadTarget) -> Result<LoadResult> {
        let records = payload.into_records();
        self.write(&records)?;
        log::info!(
            "Wrote {} record(s) for {} to {}",
            records.len(),
            target,
            self.path.display()
        );
        Ok(LoadResult {
            target: self.path.display().to_string(),
            inserted: records.len(),
        })
    }
}
