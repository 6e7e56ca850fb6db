//! Growth series transformer
//!
//! Turns a sequence of period records into one normalized record per period
//! and attaches the period-over-period percentage change to every period
//! after the first.

use super::{json_payload, scalar_text};
use crate::error::{EtlError, Result};
use crate::etl::Transformer;
use crate::record::{NormalizedRecord, RawPayload, Scalar};
use serde_json::Value;

/// Transformer that computes period-over-period growth
///
/// Input shape: `{ "<records_field>": [ { "<period_field>": ..., "<magnitude_field>": ... }, ... ] }`.
/// Periods are processed in input order and are never re-sorted.
///
/// Each output record holds the period under `period_field`, the magnitude
/// under `magnitude_label` and, from the second period on, the growth under
/// `<growth_prefix><period>`, rounded to two decimals.
///
/// # Example
/// ```
/// use etl_pipeline::etl::Transformer;
/// use etl_pipeline::record::{RawPayload, Scalar};
/// use etl_pipeline::transform::GrowthSeriesTransformer;
/// use serde_json::json;
///
/// let transformer = GrowthSeriesTransformer::new("year", "gdp");
/// let payload = RawPayload::Json(json!({
///     "records": [{"year": 2018, "gdp": "100"}, {"year": 2019, "gdp": "110"}]
/// }));
///
/// let records = transformer.transform(payload).unwrap();
/// assert!(!records[0].contains_key("growth_2018"));
/// assert_eq!(records[1].get("growth_2019"), Some(&Scalar::Number(10.0)));
/// ```
#[derive(Debug, Clone)]
pub struct GrowthSeriesTransformer {
    records_field: String,
    period_field: String,
    magnitude_field: String,
    magnitude_label: String,
    growth_prefix: String,
}

/// Carry state of one transformation run.
#[derive(Debug, Default)]
struct GrowthState {
    previous_period: Option<String>,
    previous_value: Option<f64>,
}

impl GrowthSeriesTransformer {
    /// Create a transformer reading `period_field` and `magnitude_field` from
    /// each element of `records`
    pub fn new(period_field: impl Into<String>, magnitude_field: impl Into<String>) -> Self {
        let magnitude_field = magnitude_field.into();
        Self {
            records_field: "records".to_string(),
            period_field: period_field.into(),
            magnitude_label: magnitude_field.clone(),
            magnitude_field,
            growth_prefix: "growth_".to_string(),
        }
    }

    /// Indian GDP series at 2004-05 prices, keyed by financial year
    pub fn india_gdp() -> Self {
        Self::new(
            "financial_year",
            "gross_domestic_product_in_rs_cr_at_2004_05_prices",
        )
        .with_labels("GDP_in_rs_cr", "GDP_Growth_")
    }

    /// Field holding the array of period records (default: `records`)
    pub fn with_records_field(mut self, field: impl Into<String>) -> Self {
        self.records_field = field.into();
        self
    }

    /// Output field names for the magnitude and the growth prefix
    pub fn with_labels(
        mut self,
        magnitude_label: impl Into<String>,
        growth_prefix: impl Into<String>,
    ) -> Self {
        self.magnitude_label = magnitude_label.into();
        self.growth_prefix = growth_prefix.into();
        self
    }

    /// Name of the growth field for `period`
    pub fn growth_field(&self, period: &str) -> String {
        format!("{}{}", self.growth_prefix, period)
    }

    fn period_of(&self, index: usize, entry: &Value) -> Result<String> {
        let value = entry.get(&self.period_field).ok_or_else(|| {
            EtlError::transformation(format!(
                "record {} is missing period field '{}'",
                index, self.period_field
            ))
        })?;
        scalar_text(value).ok_or_else(|| {
            EtlError::transformation(format!(
                "record {} has a non-scalar period in '{}'",
                index, self.period_field
            ))
        })
    }

    fn magnitude_of(&self, period: &str, entry: &Value) -> Result<Scalar> {
        let value = entry.get(&self.magnitude_field).ok_or_else(|| {
            EtlError::transformation(format!(
                "period {} is missing magnitude field '{}'",
                period, self.magnitude_field
            ))
        })?;
        parse_magnitude(value).ok_or_else(|| {
            EtlError::transformation(format!(
                "period {} has non-numeric magnitude {}",
                period, value
            ))
        })
    }
}

impl Default for GrowthSeriesTransformer {
    fn default() -> Self {
        Self::india_gdp()
    }
}

impl Transformer for GrowthSeriesTransformer {
    type Input = RawPayload;
    type Output = Vec<NormalizedRecord>;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        let body = json_payload(input, "growth series")?;
        let entries = body
            .get(&self.records_field)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                EtlError::transformation(format!(
                    "payload has no '{}' array",
                    self.records_field
                ))
            })?;

        let mut state = GrowthState::default();
        let mut records = Vec::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            let period = self.period_of(index, entry)?;
            let magnitude = self.magnitude_of(&period, entry)?;
            let current = magnitude.as_f64().unwrap_or_default();

            let mut record = NormalizedRecord::new()
                .with(self.period_field.as_str(), period.as_str())
                .with(self.magnitude_label.as_str(), magnitude);

            if let (Some(previous_period), Some(previous)) =
                (&state.previous_period, state.previous_value)
            {
                let growth = growth_percent(previous, current).ok_or_else(|| {
                    EtlError::transformation(format!(
                        "division by zero: magnitude of period {} is 0, growth for {} is undefined",
                        previous_period, period
                    ))
                })?;
                if !growth.is_finite() {
                    return Err(EtlError::transformation(format!(
                        "growth from {} to {} overflows: {} -> {}",
                        previous_period, period, previous, current
                    )));
                }
                record.insert(self.growth_field(&period), growth);
            }

            state.previous_period = Some(period);
            state.previous_value = Some(current);
            records.push(record);
        }

        log::debug!(
            "Computed growth for {} of {} period(s)",
            records.len().saturating_sub(1),
            records.len()
        );
        Ok(records)
    }
}

/// Signed percentage change from `previous` to `current`, rounded to two
/// decimals with ties to even. `None` when `previous` is zero.
fn growth_percent(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    let growth = (current - previous) / previous * 100.0;
    Some((growth * 100.0).round_ties_even() / 100.0)
}

/// Integers stay integers; anything that is not a finite number is rejected.
fn parse_magnitude(value: &Value) -> Option<Scalar> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Scalar::Integer(i)),
            None => n.as_f64().filter(|f| f.is_finite()).map(Scalar::Number),
        },
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Scalar::Integer(i));
            }
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Scalar::Number)
        }
        _ => None,
    }
}
