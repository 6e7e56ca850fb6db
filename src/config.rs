//! Source registry
//!
//! Maps dataset names to the locators their extractors read from. The
//! registry is loaded once per run and is read-only afterwards.
//!
//! Example `data_config.json`:
//! ```json
//! {
//!   "data_sources": {
//!     "api": {
//!       "economy": "https://api.example.org/resource/gdp?format=json",
//!       "pollution": "https://api.example.org/v1/latest?country=IN"
//!     },
//!     "csv": {
//!       "crypto": "crypto-markets.csv"
//!     }
//!   }
//! }
//! ```

use crate::error::{EtlError, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// Kind of source a dataset is extracted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum SourceKind {
    /// Remote JSON API
    #[value(alias = "apis")]
    Api,
    /// Local tabular file
    Csv,
    /// Relational database (hook only)
    #[value(alias = "db")]
    Database,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Csv => "csv",
            Self::Database => "database",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = EtlError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "api" | "apis" => Ok(Self::Api),
            "csv" => Ok(Self::Csv),
            "database" | "db" => Ok(Self::Database),
            other => Err(EtlError::config(format!(
                "Unknown source kind '{}'. Expected one of: api, csv, database",
                other
            ))),
        }
    }
}

/// Dataset name, normalized to trimmed lowercase.
///
/// All lookups go through this type, so `Economy`, `economy ` and `ECONOMY`
/// resolve to the same registry entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetName(String);

impl DatasetName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DatasetName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    data_sources: DataSources,
}

#[derive(Deserialize)]
struct DataSources {
    #[serde(default)]
    api: BTreeMap<String, String>,
    #[serde(default)]
    csv: BTreeMap<String, PathBuf>,
    #[serde(default)]
    database: BTreeMap<String, String>,
}

/// Registry of dataset locators, grouped by source kind.
#[derive(Clone, Debug, Default)]
pub struct SourceConfig {
    api_endpoints: BTreeMap<DatasetName, Url>,
    file_paths: BTreeMap<DatasetName, PathBuf>,
    databases: BTreeMap<DatasetName, String>,
}

impl SourceConfig {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the registry from a JSON or YAML file.
    ///
    /// `.yml`/`.yaml` files are parsed as YAML, anything else as JSON.
    /// Relative file paths are resolved against the config file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading source config from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            EtlError::config(format!(
                "Failed to read source config {}: {}",
                path.display(),
                e
            ))
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yml") | Some("yaml")
        );
        let file: ConfigFile = if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| {
                EtlError::config(format!("Invalid YAML in {}: {}", path.display(), e))
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| {
                EtlError::config(format!("Invalid JSON in {}: {}", path.display(), e))
            })?
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_sources(file.data_sources, Some(base_dir))
    }

    /// Parse the registry from a JSON string. Relative paths stay relative.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content)
            .map_err(|e| EtlError::config(format!("Invalid source config JSON: {}", e)))?;
        Self::from_sources(file.data_sources, None)
    }

    fn from_sources(sources: DataSources, base_dir: Option<&Path>) -> Result<Self> {
        let mut config = Self::new();
        for (name, url) in sources.api {
            config = config.with_api(&name, &url)?;
        }
        for (name, path) in sources.csv {
            let path = match base_dir {
                Some(dir) if path.is_relative() => dir.join(path),
                _ => path,
            };
            config = config.with_file(&name, path)?;
        }
        for (name, locator) in sources.database {
            config = config.with_database(&name, locator)?;
        }

        log::debug!(
            "Source config: {} api, {} csv, {} database dataset(s)",
            config.api_endpoints.len(),
            config.file_paths.len(),
            config.databases.len()
        );
        Ok(config)
    }

    /// Register an API endpoint
    pub fn with_api(mut self, name: &str, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| {
            EtlError::config(format!("Invalid URL for api dataset '{}': {}", name, e))
        })?;
        insert_unique(&mut self.api_endpoints, SourceKind::Api, name, url)?;
        Ok(self)
    }

    /// Register a tabular file
    pub fn with_file(mut self, name: &str, path: impl Into<PathBuf>) -> Result<Self> {
        insert_unique(&mut self.file_paths, SourceKind::Csv, name, path.into())?;
        Ok(self)
    }

    /// Register a database locator
    pub fn with_database(mut self, name: &str, locator: impl Into<String>) -> Result<Self> {
        insert_unique(&mut self.databases, SourceKind::Database, name, locator.into())?;
        Ok(self)
    }

    pub fn api_endpoint(&self, dataset: &DatasetName) -> Result<&Url> {
        self.api_endpoints
            .get(dataset)
            .ok_or_else(|| unknown(SourceKind::Api, dataset))
    }

    pub fn file_path(&self, dataset: &DatasetName) -> Result<&Path> {
        self.file_paths
            .get(dataset)
            .map(PathBuf::as_path)
            .ok_or_else(|| unknown(SourceKind::Csv, dataset))
    }

    pub fn database(&self, dataset: &DatasetName) -> Result<&str> {
        self.databases
            .get(dataset)
            .map(String::as_str)
            .ok_or_else(|| unknown(SourceKind::Database, dataset))
    }

    /// Whether `dataset` is registered for `kind`
    pub fn contains(&self, kind: SourceKind, dataset: &DatasetName) -> bool {
        match kind {
            SourceKind::Api => self.api_endpoints.contains_key(dataset),
            SourceKind::Csv => self.file_paths.contains_key(dataset),
            SourceKind::Database => self.databases.contains_key(dataset),
        }
    }

    /// Dataset names registered for `kind`, sorted
    pub fn datasets(&self, kind: SourceKind) -> Vec<&DatasetName> {
        match kind {
            SourceKind::Api => self.api_endpoints.keys().collect(),
            SourceKind::Csv => self.file_paths.keys().collect(),
            SourceKind::Database => self.databases.keys().collect(),
        }
    }
}

fn insert_unique<V>(
    map: &mut BTreeMap<DatasetName, V>,
    kind: SourceKind,
    name: &str,
    value: V,
) -> Result<()> {
    let key = DatasetName::new(name);
    if key.as_str().is_empty() {
        return Err(EtlError::config(format!(
            "Empty dataset name in {} sources",
            kind
        )));
    }
    if map.contains_key(&key) {
        return Err(EtlError::config(format!(
            "Dataset '{}' is registered more than once for {} sources",
            key, kind
        )));
    }
    map.insert(key, value);
    Ok(())
}

fn unknown(kind: SourceKind, dataset: &DatasetName) -> EtlError {
    EtlError::config(format!(
        "Dataset '{}' is not configured for {} sources",
        dataset, kind
    ))
}
