//! Load sinks
//!
//! - Document store (MongoDB)
//! - Relational store (SQLite)
//! - NDJSON file output for dry runs

mod document;
mod ndjson;
mod relational;

pub use document::{
    DocumentConnection, DocumentConnector, DocumentSink, DocumentStoreSettings, MongoConnector,
};
pub use ndjson::NdjsonSink;
pub use relational::{ColumnDef, RelationalSink, TableSchema};
