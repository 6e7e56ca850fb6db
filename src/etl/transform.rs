//! Transformer trait for data transformation

use crate::error::Result;

/// Transformer trait for converting one stage's output into the next
/// stage's input
///
/// Dataset transforms take a [`RawPayload`](crate::record::RawPayload) and
/// produce a `Vec<NormalizedRecord>`.
///
/// # Example
/// ```
/// use etl_pipeline::error::Result;
/// use etl_pipeline::etl::Transformer;
/// use etl_pipeline::record::{NormalizedRecord, RawPayload};
///
/// struct RowCounter;
///
/// impl Transformer for RowCounter {
///     type Input = RawPayload;
///     type Output = Vec<NormalizedRecord>;
///
///     fn transform(&self, input: Self::Input) -> Result<Self::Output> {
///         let count = match input {
///             RawPayload::Rows(rows) => rows.len() as i64,
///             RawPayload::Json(_) => 1,
///         };
///         Ok(vec![NormalizedRecord::new().with("count", count)])
///     }
/// }
/// ```
pub trait Transformer: Send + Sync {
    /// Input item type
    type Input: Send;

    /// Output item type after transformation
    type Output: Send;

    /// Transform the input
    ///
    /// # Errors
    /// Returns a `Transformation` error for missing or malformed fields.
    fn transform(&self, input: Self::Input) -> Result<Self::Output>;
}
