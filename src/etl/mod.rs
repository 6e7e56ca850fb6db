//! Core ETL (Extract, Transform, Load) abstractions
//!
//! This module provides the stage traits and the pipeline that runs one
//! extract → transform → load pass over a single dataset.

mod extract;
mod load;
mod pipeline;
mod transform;

pub use extract::Extractor;
pub use load::Loader;
pub use pipeline::Pipeline;
pub use transform::Transformer;
