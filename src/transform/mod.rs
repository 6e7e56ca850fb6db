//! Dataset transforms
//!
//! Each transform consumes a [`RawPayload`] and produces normalized records.
//! [`TransformId`] is the closed set of transforms a route can name.

mod currency;
mod flatten;
mod growth;

pub use currency::{ColumnLayout, CurrencyConversionTransformer};
pub use flatten::NestedFlattenTransformer;
pub use growth::GrowthSeriesTransformer;

use crate::error::{EtlError, Result};
use crate::etl::Transformer;
use crate::record::{NormalizedRecord, RawPayload};
use serde_json::Value;

/// Transform a route resolves to.
#[derive(Debug, Clone)]
pub enum TransformId {
    GrowthSeries(GrowthSeriesTransformer),
    NestedFlatten(NestedFlattenTransformer),
    CurrencyConversion(CurrencyConversionTransformer),
}

impl TransformId {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GrowthSeries(_) => "growth-series",
            Self::NestedFlatten(_) => "nested-flatten",
            Self::CurrencyConversion(_) => "currency-conversion",
        }
    }
}

impl Transformer for TransformId {
    type Input = RawPayload;
    type Output = Vec<NormalizedRecord>;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        log::debug!("Applying {} transform", self.name());
        match self {
            Self::GrowthSeries(t) => t.transform(input),
            Self::NestedFlatten(t) => t.transform(input),
            Self::CurrencyConversion(t) => t.transform(input),
        }
    }
}

/// Unwrap a JSON payload, failing for tabular rows
fn json_payload(input: RawPayload, transform: &str) -> Result<Value> {
    match input {
        RawPayload::Json(value) => Ok(value),
        RawPayload::Rows(_) => Err(EtlError::transformation(format!(
            "{} expects a json payload, got tabular rows",
            transform
        ))),
    }
}

/// Text form of a string or number, `None` for anything else
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
