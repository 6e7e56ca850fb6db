//! ETL Pipeline
//!
//! Extracts a named dataset from a JSON API or a tabular file, normalizes it
//! with a dataset-specific transform, and loads the records into a document
//! or relational store.

pub mod cli;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod etl;
pub mod record;
pub mod source;
pub mod storage;
pub mod transform;

// Re-exports for convenience
pub use config::{DatasetName, SourceConfig, SourceKind};
pub use dispatch::{DatasetRoute, Dispatcher, RouteTable, SinkKind};
pub use error::{ErrorKind, EtlError, Result};
pub use etl::{Extractor, Loader, Pipeline, Transformer};
pub use record::{LoadPayload, LoadResult, LoadTarget, NormalizedRecord, RawPayload, Scalar};
pub use storage::{DocumentSink, DocumentStoreSettings, NdjsonSink, RelationalSink, TableSchema};
pub use transform::TransformId;
