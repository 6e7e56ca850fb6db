//! Dataset dispatch
//!
//! [`RouteTable`] is a finite lookup table from `(source kind, dataset)` to
//! the transform and sink that handle it. [`Dispatcher`] resolves a request
//! against the table, the source registry and the available sinks before any
//! I/O, then runs one [`Pipeline`] pass.

use crate::config::{DatasetName, SourceConfig, SourceKind};
use crate::error::{EtlError, Result};
use crate::etl::{Extractor, Loader, Pipeline};
use crate::record::{LoadResult, LoadTarget};
use crate::source::SourceExtractor;
use crate::transform::{
    CurrencyConversionTransformer, GrowthSeriesTransformer, NestedFlattenTransformer, TransformId,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Store a route loads into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkKind {
    Document,
    Relational,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document store"),
            Self::Relational => f.write_str("relational store"),
        }
    }
}

/// What happens to one dataset after extraction.
#[derive(Clone, Debug)]
pub struct DatasetRoute {
    pub transform: TransformId,
    pub sink: SinkKind,
    pub target: LoadTarget,
}

impl DatasetRoute {
    pub fn new(transform: TransformId, sink: SinkKind, target: LoadTarget) -> Self {
        Self {
            transform,
            sink,
            target,
        }
    }
}

/// Lookup table from `(source kind, dataset)` to [`DatasetRoute`]
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: BTreeMap<(SourceKind, DatasetName), DatasetRoute>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes for the known datasets:
    ///
    /// | Source | Dataset     | Transform           | Target                               |
    /// |--------|-------------|---------------------|--------------------------------------|
    /// | api    | `economy`   | growth series       | document `GDP.India_GDP`             |
    /// | api    | `pollution` | nested flatten      | document `Pollution_Data.Air_Quality_India` |
    /// | csv    | `crypto`    | currency conversion | relational table `Crypto`            |
    pub fn builtin() -> Self {
        let mut table = Self::new();
        let builtin = [
            (
                SourceKind::Api,
                "economy",
                DatasetRoute::new(
                    TransformId::GrowthSeries(GrowthSeriesTransformer::india_gdp()),
                    SinkKind::Document,
                    LoadTarget::in_database("GDP", "India_GDP"),
                ),
            ),
            (
                SourceKind::Api,
                "pollution",
                DatasetRoute::new(
                    TransformId::NestedFlatten(NestedFlattenTransformer::new()),
                    SinkKind::Document,
                    LoadTarget::in_database("Pollution_Data", "Air_Quality_India"),
                ),
            ),
            (
                SourceKind::Csv,
                "crypto",
                DatasetRoute::new(
                    TransformId::CurrencyConversion(CurrencyConversionTransformer::crypto_gbp()),
                    SinkKind::Relational,
                    LoadTarget::new("Crypto"),
                ),
            ),
        ];
        for (kind, name, route) in builtin {
            table
                .routes
                .insert((kind, DatasetName::new(name)), route);
        }
        table
    }

    /// Add a route.
    ///
    /// # Errors
    /// Returns a `Config` error if the dataset already has a route for `kind`,
    /// or if the transform cannot accept the payload `kind` produces.
    pub fn register(mut self, kind: SourceKind, dataset: &str, route: DatasetRoute) -> Result<Self> {
        let name = DatasetName::new(dataset);
        if name.as_str().is_empty() {
            return Err(EtlError::config(format!("Empty dataset name in {} route", kind)));
        }
        check_payload_shape(kind, &name, &route.transform)?;
        if self.routes.contains_key(&(kind, name.clone())) {
            return Err(EtlError::config(format!(
                "Duplicate route for {}/{}",
                kind, name
            )));
        }
        self.routes.insert((kind, name), route);
        Ok(self)
    }

    /// Route registered for `kind`/`dataset`.
    ///
    /// # Errors
    /// Returns a `Config` error if no transform is registered
    pub fn resolve(&self, kind: SourceKind, dataset: &DatasetName) -> Result<&DatasetRoute> {
        self.routes
            .get(&(kind, dataset.clone()))
            .ok_or_else(|| {
                EtlError::config(format!(
                    "No transform registered for {} dataset '{}'",
                    kind, dataset
                ))
            })
    }

    /// Routes in `(kind, dataset)` order
    pub fn iter(&self) -> impl Iterator<Item = (SourceKind, &DatasetName, &DatasetRoute)> {
        self.routes
            .iter()
            .map(|((kind, name), route)| (*kind, name, route))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn check_payload_shape(kind: SourceKind, dataset: &DatasetName, transform: &TransformId) -> Result<()> {
    let accepted = match (kind, transform) {
        (SourceKind::Api, TransformId::CurrencyConversion(_)) => false,
        (SourceKind::Csv, TransformId::GrowthSeries(_) | TransformId::NestedFlatten(_)) => false,
        _ => true,
    };
    if accepted {
        Ok(())
    } else {
        Err(EtlError::config(format!(
            "{} transform cannot handle {} dataset '{}'",
            transform.name(),
            kind,
            dataset
        )))
    }
}

/// Runs datasets through their routes
///
/// Owns the extractor, the route table and one loader per sink kind. An
/// output override replaces every route's sink, e.g. for a dry run into a
/// file.
///
/// # Example
/// ```no_run
/// use etl_pipeline::config::{DatasetName, SourceConfig, SourceKind};
/// use etl_pipeline::dispatch::{Dispatcher, RouteTable};
/// use etl_pipeline::storage::{RelationalSink, TableSchema};
///
/// # async fn example() -> etl_pipeline::error::Result<()> {
/// let config = SourceConfig::load("data_config.json")?;
/// let dispatcher = Dispatcher::from_config(config, RouteTable::builtin())?
///     .with_relational_sink(RelationalSink::new("session.db", TableSchema::crypto_prices()));
///
/// let result = dispatcher.run(SourceKind::Csv, &DatasetName::new("crypto")).await?;
/// println!("{} rows into {}", result.inserted, result.target);
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher<E = SourceExtractor> {
    config: Arc<SourceConfig>,
    extractor: E,
    routes: RouteTable,
    document: Option<Box<dyn Loader>>,
    relational: Option<Box<dyn Loader>>,
    output: Option<Box<dyn Loader>>,
}

impl Dispatcher<SourceExtractor> {
    /// Dispatcher over the standard extractors for `config`
    pub fn from_config(config: SourceConfig, routes: RouteTable) -> Result<Self> {
        let config = Arc::new(config);
        let extractor = SourceExtractor::new(config.clone())?;
        Self::new(config, extractor, routes)
    }
}

impl<E: Extractor> Dispatcher<E> {
    /// Create a dispatcher.
    ///
    /// Configured datasets without a route are reported; they fail with a
    /// `Config` error if run.
    ///
    /// # Errors
    /// Returns a `Config` error if a route is registered for a dataset whose
    /// source kind its transform cannot handle
    pub fn new(config: Arc<SourceConfig>, extractor: E, routes: RouteTable) -> Result<Self> {
        for (kind, name, route) in routes.iter() {
            check_payload_shape(kind, name, &route.transform)?;
        }
        for kind in [SourceKind::Api, SourceKind::Csv, SourceKind::Database] {
            for name in config.datasets(kind) {
                if routes.resolve(kind, name).is_err() {
                    log::warn!("{} dataset '{}' has no route and cannot be run", kind, name);
                }
            }
        }

        Ok(Self {
            config,
            extractor,
            routes,
            document: None,
            relational: None,
            output: None,
        })
    }

    pub fn with_document_sink(mut self, sink: impl Loader + 'static) -> Self {
        self.document = Some(Box::new(sink));
        self
    }

    pub fn with_relational_sink(mut self, sink: impl Loader + 'static) -> Self {
        self.relational = Some(Box::new(sink));
        self
    }

    /// Send every route's records to `sink` instead of its own store
    pub fn with_output(mut self, sink: impl Loader + 'static) -> Self {
        self.output = Some(Box::new(sink));
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Resolve the route and loader for a dataset without touching any source
    /// or store.
    ///
    /// # Errors
    /// Returns a `Config` error if no route exists, the dataset is not in the
    /// source registry, or the route's sink is not configured
    pub fn resolve(&self, kind: SourceKind, dataset: &DatasetName) -> Result<(&DatasetRoute, &dyn Loader)> {
        let route = self.routes.resolve(kind, dataset)?;

        if !self.config.contains(kind, dataset) {
            return Err(EtlError::config(format!(
                "Unknown {} dataset '{}'. Configured: [{}]",
                kind,
                dataset,
                self.config
                    .datasets(kind)
                    .iter()
                    .map(|n| n.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        let loader = match (&self.output, route.sink) {
            (Some(output), _) => output,
            (None, SinkKind::Document) => self.document.as_ref().ok_or_else(|| missing_sink(route))?,
            (None, SinkKind::Relational) => {
                self.relational.as_ref().ok_or_else(|| missing_sink(route))?
            }
        };

        Ok((route, loader.as_ref()))
    }

    /// Run one dataset through extract, transform and load.
    ///
    /// Everything is resolved first; nothing is read or written for a request
    /// that cannot be routed.
    pub async fn run(&self, kind: SourceKind, dataset: &DatasetName) -> Result<LoadResult> {
        let (route, loader) = self.resolve(kind, dataset)?;
        log::debug!(
            "Routing {}/{} through {} into {} {}",
            kind,
            dataset,
            route.transform.name(),
            route.sink,
            route.target
        );

        Pipeline::new(&self.extractor, &route.transform, loader)
            .run(kind, dataset, &route.target)
            .await
    }
}

fn missing_sink(route: &DatasetRoute) -> EtlError {
    EtlError::config(format!(
        "No {} configured for target '{}'",
        route.sink, route.target
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::record::{LoadPayload, RawPayload};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingExtractor {
        calls: AtomicUsize,
        payload: Option<Value>,
    }

    impl Extractor for CountingExtractor {
        async fn extract(&self, _kind: SourceKind, dataset: &DatasetName) -> Result<RawPayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.payload {
                Some(value) => Ok(RawPayload::Json(value.clone())),
                None => Err(EtlError::extraction(dataset.as_str(), "connection refused")),
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingLoader {
        loads: Arc<Mutex<Vec<(String, LoadPayload)>>>,
    }

    #[async_trait]
    impl Loader for RecordingLoader {
        async fn load(&self, payload: LoadPayload, target: &LoadTarget) -> Result<LoadResult> {
            let inserted = payload.len();
            self.loads
                .lock()
                .unwrap()
                .push((target.to_string(), payload));
            Ok(LoadResult {
                target: target.to_string(),
                inserted,
            })
        }
    }

    fn config() -> Arc<SourceConfig> {
        Arc::new(
            SourceConfig::new()
                .with_api("economy", "http://localhost/gdp")
                .unwrap()
                .with_api("pollution", "http://localhost/air")
                .unwrap()
                .with_file("crypto", "crypto-markets.csv")
                .unwrap(),
        )
    }

    fn dispatcher(payload: Option<Value>) -> (Dispatcher<CountingExtractor>, RecordingLoader) {
        let extractor = CountingExtractor {
            payload,
            ..Default::default()
        };
        let loader = RecordingLoader::default();
        let dispatcher = Dispatcher::new(config(), extractor, RouteTable::builtin())
            .unwrap()
            .with_document_sink(loader.clone());
        (dispatcher, loader)
    }

    #[test]
    fn test_builtin_routes() {
        let routes = RouteTable::builtin();
        assert_eq!(routes.len(), 3);

        let economy = routes
            .resolve(SourceKind::Api, &DatasetName::new("Economy"))
            .unwrap();
        assert_eq!(economy.transform.name(), "growth-series");
        assert_eq!(economy.target.to_string(), "GDP.India_GDP");

        let crypto = routes
            .resolve(SourceKind::Csv, &DatasetName::new("crypto"))
            .unwrap();
        assert_eq!(crypto.sink, SinkKind::Relational);

        // Same name under a different kind is a different route
        let err = routes
            .resolve(SourceKind::Csv, &DatasetName::new("economy"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_register_rejects_bad_combinations() {
        let flatten = || {
            DatasetRoute::new(
                TransformId::NestedFlatten(NestedFlattenTransformer::new()),
                SinkKind::Document,
                LoadTarget::new("air"),
            )
        };

        let err = RouteTable::new()
            .register(SourceKind::Csv, "air", flatten())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = RouteTable::builtin()
            .register(SourceKind::Api, "POLLUTION", flatten())
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate route"));

        let table = RouteTable::new()
            .register(SourceKind::Api, "air", flatten())
            .unwrap();
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_dataset_fails_before_extraction() {
        let (dispatcher, loader) = dispatcher(Some(json!({})));

        let err = dispatcher
            .run(SourceKind::Api, &DatasetName::new("weather"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(dispatcher.extractor.calls.load(Ordering::SeqCst), 0);
        assert!(loader.loads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_source_fails_before_extraction() {
        let extractor = CountingExtractor::default();
        let config = Arc::new(SourceConfig::new().with_file("crypto", "c.csv").unwrap());
        let dispatcher = Dispatcher::new(config, extractor, RouteTable::builtin()).unwrap();

        // Routed but not present in the registry
        let err = dispatcher
            .run(SourceKind::Api, &DatasetName::new("economy"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("Unknown api dataset 'economy'"));
        assert_eq!(dispatcher.extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_sink_fails_before_extraction() {
        let (dispatcher, _) = dispatcher(None);

        let err = dispatcher
            .run(SourceKind::Csv, &DatasetName::new("crypto"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("No relational store configured"));
        assert_eq!(dispatcher.extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_growth_route_end_to_end() {
        let payload = json!({"records": [
            {"financial_year": "2018-19", "gross_domestic_product_in_rs_cr_at_2004_05_prices": 100},
            {"financial_year": "2019-20", "gross_domestic_product_in_rs_cr_at_2004_05_prices": 110},
        ]});
        let (dispatcher, loader) = dispatcher(Some(payload));

        let result = dispatcher
            .run(SourceKind::Api, &DatasetName::new(" ECONOMY "))
            .await
            .unwrap();

        assert_eq!(result.inserted, 2);
        assert_eq!(result.target, "GDP.India_GDP");

        let loads = loader.loads.lock().unwrap();
        assert_eq!(loads.len(), 1);
        let records = match &loads[0].1 {
            LoadPayload::Batch(records) => records,
            LoadPayload::Single(_) => panic!("expected a batch"),
        };
        assert_eq!(
            records[1].to_json(),
            json!({"financial_year": "2019-20", "GDP_in_rs_cr": 110, "GDP_Growth_2019-20": 10.0})
        );
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_load() {
        let (dispatcher, loader) = dispatcher(None);

        let err = dispatcher
            .run(SourceKind::Api, &DatasetName::new("pollution"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Extraction);
        assert_eq!(dispatcher.extractor.calls.load(Ordering::SeqCst), 1);
        assert!(loader.loads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transformation_failure_skips_load() {
        let payload = json!({"results": [{"location": "Bandra"}]});
        let (dispatcher, loader) = dispatcher(Some(payload));

        let err = dispatcher
            .run(SourceKind::Api, &DatasetName::new("pollution"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transformation);
        assert!(loader.loads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_output_overrides_route_sink() {
        let payload = json!({"results": [{
            "location": "Bandra", "city": "Mumbai", "country": "IN",
            "measurements": [{
                "parameter": "pm25", "value": 55.5, "lastUpdated": "2019-03-01T10:00:00Z",
                "unit": "µg/m³", "sourceName": "CPCB"
            }]
        }]});
        let (dispatcher, document) = dispatcher(Some(payload));
        let output = RecordingLoader::default();
        let dispatcher = dispatcher.with_output(output.clone());

        let result = dispatcher
            .run(SourceKind::Api, &DatasetName::new("pollution"))
            .await
            .unwrap();

        assert_eq!(result.inserted, 1);
        assert!(document.loads.lock().unwrap().is_empty());
        assert_eq!(output.loads.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_currency_route_needs_tabular_source() {
        // Currency conversion on an api source is rejected up front
        let route = DatasetRoute::new(
            TransformId::CurrencyConversion(CurrencyConversionTransformer::crypto_gbp()),
            SinkKind::Relational,
            LoadTarget::new("Crypto"),
        );
        let err = RouteTable::new()
            .register(SourceKind::Api, "crypto", route)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_database_route_fails_as_extraction() {
        let config = SourceConfig::new()
            .with_database("warehouse", "postgres://localhost/warehouse")
            .unwrap();
        let routes = RouteTable::new()
            .register(
                SourceKind::Database,
                "warehouse",
                DatasetRoute::new(
                    TransformId::GrowthSeries(GrowthSeriesTransformer::new("year", "gdp")),
                    SinkKind::Relational,
                    LoadTarget::new("Warehouse"),
                ),
            )
            .unwrap();
        let loader = RecordingLoader::default();
        let dispatcher = Dispatcher::from_config(config, routes)
            .unwrap()
            .with_relational_sink(loader.clone());

        let err = dispatcher
            .run(SourceKind::Database, &DatasetName::new("warehouse"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Extraction);
        assert!(err.to_string().contains("not implemented"));
        assert!(loader.loads.lock().unwrap().is_empty());
    }
}
