//! Nested flatten transformer
//!
//! Expands location groups holding embedded measurement arrays into one
//! record per (location, measurement) pair.

use super::json_payload;
use crate::error::{EtlError, Result};
use crate::etl::Transformer;
use crate::record::{NormalizedRecord, RawPayload, Scalar};
use chrono::DateTime;
use serde_json::Value;

/// Transformer that flattens grouped measurements
///
/// Input shape:
/// ```json
/// { "results": [
///     { "location": "...", "city": "...", "country": "...",
///       "measurements": [ { "parameter": "...", "value": 0, "lastUpdated": "...",
///                           "unit": "...", "sourceName": "..." } ] } ] }
/// ```
///
/// Output order follows input order, outer loop over groups, inner loop over
/// measurements. Duplicate measurements are kept.
#[derive(Debug, Clone)]
pub struct NestedFlattenTransformer {
    groups_field: String,
    items_field: String,
    group_fields: Vec<String>,
    item_fields: Vec<String>,
    timestamp_fields: Vec<String>,
}

impl NestedFlattenTransformer {
    /// Air quality layout: `results[].measurements[]`
    pub fn new() -> Self {
        Self {
            groups_field: "results".to_string(),
            items_field: "measurements".to_string(),
            group_fields: to_strings(&["location", "city", "country"]),
            item_fields: to_strings(&["parameter", "value", "lastUpdated", "unit", "sourceName"]),
            timestamp_fields: to_strings(&["lastUpdated"]),
        }
    }

    /// Override which array holds the groups and which holds the items
    pub fn with_arrays(mut self, groups_field: &str, items_field: &str) -> Self {
        self.groups_field = groups_field.to_string();
        self.items_field = items_field.to_string();
        self
    }

    /// Fields copied from each group into every record
    pub fn with_group_fields(mut self, fields: &[&str]) -> Self {
        self.group_fields = to_strings(fields);
        self
    }

    /// Fields copied from each item
    pub fn with_item_fields(mut self, fields: &[&str]) -> Self {
        self.item_fields = to_strings(fields);
        self
    }

    /// Item fields parsed as RFC 3339 timestamps when possible
    pub fn with_timestamp_fields(mut self, fields: &[&str]) -> Self {
        self.timestamp_fields = to_strings(fields);
        self
    }

    fn copy_fields(
        &self,
        record: &mut NormalizedRecord,
        source: &Value,
        fields: &[String],
        context: &str,
    ) -> Result<()> {
        for field in fields {
            let value = source.get(field).ok_or_else(|| {
                EtlError::transformation(format!("{} is missing field '{}'", context, field))
            })?;
            let scalar = to_scalar(value, self.timestamp_fields.contains(field)).ok_or_else(|| {
                EtlError::transformation(format!(
                    "{} has a non-scalar value in '{}': {}",
                    context, field, value
                ))
            })?;
            record.insert(field.as_str(), scalar);
        }
        Ok(())
    }
}

impl Default for NestedFlattenTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for NestedFlattenTransformer {
    type Input = RawPayload;
    type Output = Vec<NormalizedRecord>;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        let body = json_payload(input, "nested flatten")?;
        let groups = body
            .get(&self.groups_field)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                EtlError::transformation(format!("payload has no '{}' array", self.groups_field))
            })?;

        let mut records = Vec::new();
        for (group_index, group) in groups.iter().enumerate() {
            let items = group
                .get(&self.items_field)
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    EtlError::transformation(format!(
                        "{} {} has no '{}' array",
                        self.groups_field, group_index, self.items_field
                    ))
                })?;

            let mut base = NormalizedRecord::new();
            let group_context = format!("{} {}", self.groups_field, group_index);
            self.copy_fields(&mut base, group, &self.group_fields, &group_context)?;

            for (item_index, item) in items.iter().enumerate() {
                let mut record = base.clone();
                let item_context = format!("{} {} of {}", self.items_field, item_index, group_context);
                self.copy_fields(&mut record, item, &self.item_fields, &item_context)?;
                records.push(record);
            }
        }

        log::debug!(
            "Flattened {} group(s) into {} record(s)",
            groups.len(),
            records.len()
        );
        Ok(records)
    }
}

fn to_strings(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|s| s.to_string()).collect()
}

fn to_scalar(value: &Value, as_timestamp: bool) -> Option<Scalar> {
    match value {
        Value::String(s) if as_timestamp => Some(
            DateTime::parse_from_rfc3339(s)
                .map(Scalar::Timestamp)
                .unwrap_or_else(|_| Scalar::Text(s.clone())),
        ),
        Value::String(s) => Some(Scalar::Text(s.clone())),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Scalar::Integer(i)),
            None => n.as_f64().map(Scalar::Number),
        },
        Value::Bool(b) => Some(Scalar::Text(b.to_string())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
