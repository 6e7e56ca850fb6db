//! Currency conversion transformer
//!
//! Filters crypto market rows to a set of asset codes, converts the price
//! columns at a fixed rate and projects each row to
//! `{name, date, open, high, low, close}`.

use crate::error::{EtlError, Result};
use crate::etl::Transformer;
use crate::record::{NormalizedRecord, RawPayload, RowSequence};
use std::collections::HashSet;

/// Column positions of the fields read from each row.
///
/// The default matches the crypto market export:
/// `slug,symbol,name,date,ranknow,open,high,low,close,...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub code: usize,
    pub name: usize,
    pub date: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub close: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            code: 1,
            name: 2,
            date: 3,
            open: 5,
            high: 6,
            low: 7,
            close: 8,
        }
    }
}

impl ColumnLayout {
    /// Resolve column positions by header name (`symbol`, `name`, `date`,
    /// `open`, `high`, `low`, `close`, case-insensitive).
    pub fn from_header(header: &[String]) -> Result<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    EtlError::transformation(format!("header has no '{}' column", name))
                })
        };
        Ok(Self {
            code: find("symbol")?,
            name: find("name")?,
            date: find("date")?,
            open: find("open")?,
            high: find("high")?,
            low: find("low")?,
            close: find("close")?,
        })
    }

    fn width(&self) -> usize {
        [
            self.code, self.name, self.date, self.open, self.high, self.low, self.close,
        ]
        .into_iter()
        .max()
        .unwrap_or_default()
            + 1
    }
}

/// Transformer for tabular price data
///
/// Rows whose asset code is not in the configured set are dropped. Prices
/// must parse as numbers. The column layout comes from the header row when
/// the extractor kept one, otherwise from [`ColumnLayout::default`].
#[derive(Debug, Clone)]
pub struct CurrencyConversionTransformer {
    asset_codes: HashSet<String>,
    rate: f64,
    layout: Option<ColumnLayout>,
}

impl CurrencyConversionTransformer {
    pub fn new(asset_codes: &[&str], rate: f64) -> Self {
        Self {
            asset_codes: asset_codes.iter().map(|c| c.trim().to_uppercase()).collect(),
            rate,
            layout: None,
        }
    }

    /// BTC, ETH, XRP and LTC prices converted from USD to GBP
    pub fn crypto_gbp() -> Self {
        Self::new(&["BTC", "ETH", "XRP", "LTC"], 0.75)
    }

    /// Use fixed column positions instead of the header
    pub fn with_layout(mut self, layout: ColumnLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    fn resolve_layout(&self, rows: &RowSequence) -> Result<ColumnLayout> {
        match (&self.layout, &rows.header) {
            (Some(layout), _) => Ok(layout.clone()),
            (None, Some(header)) => ColumnLayout::from_header(header),
            (None, None) => Ok(ColumnLayout::default()),
        }
    }

    fn convert(&self, line: usize, column: &str, raw: &str) -> Result<f64> {
        let value: f64 = raw.trim().parse().map_err(|_| {
            EtlError::transformation(format!(
                "row {}: {} '{}' is not a number",
                line, column, raw
            ))
        })?;
        if !value.is_finite() {
            return Err(EtlError::transformation(format!(
                "row {}: {} '{}' is not a finite number",
                line, column, raw
            )));
        }
        Ok(value * self.rate)
    }
}

impl Default for CurrencyConversionTransformer {
    fn default() -> Self {
        Self::crypto_gbp()
    }
}

impl Transformer for CurrencyConversionTransformer {
    type Input = RawPayload;
    type Output = Vec<NormalizedRecord>;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        let RawPayload::Rows(rows) = input else {
            return Err(EtlError::transformation(
                "currency conversion expects tabular rows, got a json payload",
            ));
        };
        let layout = self.resolve_layout(&rows)?;
        let width = layout.width();
        // Data rows are numbered from 1, after any header
        let first_line = if rows.header.is_some() { 2 } else { 1 };

        let mut records = Vec::new();
        for (index, row) in rows.rows.iter().enumerate() {
            let line = first_line + index;
            let Some(code) = row.get(layout.code) else {
                return Err(EtlError::transformation(format!(
                    "row {} has {} column(s), no asset code",
                    line,
                    row.len()
                )));
            };
            // Only kept rows need the full width
            if !self.asset_codes.contains(&code.trim().to_uppercase()) {
                continue;
            }
            if row.len() < width {
                return Err(EtlError::transformation(format!(
                    "row {} has {} column(s), expected at least {}",
                    line,
                    row.len(),
                    width
                )));
            }

            let record = NormalizedRecord::new()
                .with("name", row[layout.name].as_str())
                .with("date", row[layout.date].as_str())
                .with("open", self.convert(line, "open", &row[layout.open])?)
                .with("high", self.convert(line, "high", &row[layout.high])?)
                .with("low", self.convert(line, "low", &row[layout.low])?)
                .with("close", self.convert(line, "close", &row[layout.close])?);
            records.push(record);
        }

        log::debug!(
            "Kept {} of {} row(s) for {} asset code(s)",
            records.len(),
            rows.len(),
            self.asset_codes.len()
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::record::Scalar;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    fn header() -> Vec<String> {
        row(&[
            "slug", "symbol", "name", "date", "ranknow", "open", "high", "low", "close", "volume",
        ])
    }

    fn sample(with_header: bool) -> RawPayload {
        RawPayload::Rows(RowSequence {
            header: with_header.then(header),
            rows: vec![
                row(&["bitcoin", "BTC", "Bitcoin", "2013-04-28", "1", "135.3", "135.98", "132.1", "134.21", "0"]),
                row(&["dogecoin", "DOGE", "Dogecoin", "2013-12-15", "40", "0.000561", "0.000597", "0.00053", "0.000559", "0"]),
                row(&["ethereum", "ETH", "Ethereum", "2015-08-07", "2", "2.83", "3.54", "2.52", "2.77", "164329"]),
            ],
        })
    }

    #[test]
    fn test_filters_and_converts() {
        let records = CurrencyConversionTransformer::crypto_gbp()
            .transform(sample(true))
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("name"), Some(&Scalar::from("Bitcoin")));
        assert_eq!(records[0].get("date"), Some(&Scalar::from("2013-04-28")));

        let open = records[0].get("open").and_then(Scalar::as_f64).unwrap();
        assert!((open - 135.3 * 0.75).abs() < 1e-9);
        let close = records[1].get("close").and_then(Scalar::as_f64).unwrap();
        assert!((close - 2.77 * 0.75).abs() < 1e-9);

        let keys: Vec<&str> = records[1].keys().collect();
        assert_eq!(keys, vec!["name", "date", "open", "high", "low", "close"]);
    }

    #[test]
    fn test_default_layout_without_header() {
        let records = CurrencyConversionTransformer::crypto_gbp()
            .transform(sample(false))
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_header_layout_is_resolved_by_name() {
        let payload = RawPayload::Rows(RowSequence {
            header: Some(row(&["Close", "Open", "Low", "High", "Date", "Name", "Symbol"])),
            rows: vec![row(&["4", "1", "0.5", "5", "2024-01-01", "Litecoin", "ltc"])],
        });

        let records = CurrencyConversionTransformer::new(&["LTC"], 2.0)
            .transform(payload)
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("name"), Some(&Scalar::from("Litecoin")));
        assert_eq!(records[0].get("open"), Some(&Scalar::Number(2.0)));
        assert_eq!(records[0].get("close"), Some(&Scalar::Number(8.0)));
    }

    #[test]
    fn test_header_missing_column() {
        let payload = RawPayload::Rows(RowSequence {
            header: Some(row(&["symbol", "name"])),
            rows: vec![],
        });
        let err = CurrencyConversionTransformer::crypto_gbp()
            .transform(payload)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transformation);
        assert!(err.to_string().contains("'date'"));
    }

    #[test]
    fn test_non_numeric_price_fails() {
        let payload = RawPayload::Rows(RowSequence {
            header: None,
            rows: vec![row(&["bitcoin", "BTC", "Bitcoin", "2013-04-28", "1", "n/a", "1", "1", "1"])],
        });
        let err = CurrencyConversionTransformer::crypto_gbp()
            .transform(payload)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transformation);
        assert!(err.to_string().contains("row 1: open"));
    }

    #[test]
    fn test_short_row_fails() {
        let payload = RawPayload::Rows(RowSequence {
            header: Some(header()),
            rows: vec![row(&["bitcoin", "BTC", "Bitcoin"])],
        });
        let err = CurrencyConversionTransformer::crypto_gbp()
            .transform(payload)
            .unwrap_err();
        assert!(err.to_string().contains("row 2 has 3 column(s)"));
    }

    #[test]
    fn test_short_row_of_dropped_asset_is_skipped() {
        let payload = RawPayload::Rows(RowSequence {
            header: Some(header()),
            rows: vec![
                row(&["dogecoin", "DOGE", "Dogecoin"]),
                row(&["bitcoin", "BTC", "Bitcoin", "2013-04-28", "1", "100", "200", "40", "80", "0"]),
            ],
        });
        let records = CurrencyConversionTransformer::crypto_gbp()
            .transform(payload)
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("name"), Some(&Scalar::from("Bitcoin")));
        assert_eq!(records[0].get("open"), Some(&Scalar::Number(75.0)));
    }

    #[test]
    fn test_row_without_code_column_fails() {
        let payload = RawPayload::Rows(RowSequence {
            header: None,
            rows: vec![row(&["bitcoin"])],
        });
        let err = CurrencyConversionTransformer::crypto_gbp()
            .transform(payload)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transformation);
        assert!(err.to_string().contains("no asset code"));
    }

    #[test]
    fn test_json_payload_is_rejected() {
        let err = CurrencyConversionTransformer::crypto_gbp()
            .transform(RawPayload::Json(serde_json::json!({})))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transformation);
    }
}
