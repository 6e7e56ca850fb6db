//! CLI helper functions

use crate::{
    config::{DatasetName, SourceConfig, SourceKind},
    dispatch::{Dispatcher, RouteTable},
    etl::Extractor,
    record::{LoadResult, NormalizedRecord},
    storage::{DocumentSink, DocumentStoreSettings, NdjsonSink, RelationalSink, TableSchema},
};
use eyre::{Context, Result};
use std::path::{Path, PathBuf};

/// Source variables from a dotenv file. A missing file is not an error.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        log::debug!("No env file at {}, using process environment", path.display());
        return Ok(());
    }
    dotenvy::from_filename(path)
        .with_context(|| format!("Failed to load env file {}", path.display()))?;
    log::debug!("Loaded env file {}", path.display());
    Ok(())
}

/// Load document store settings from environment variables
///
/// Expected environment variables:
/// - MONGO_HOST: Server host (required)
/// - MONGO_USER: Username (required)
/// - MONGO_PASSWORD: Password (required)
/// - MONGO_PORT: Server port (optional, defaults to 27017)
/// - MONGO_AUTH_SOURCE: Authentication database (optional, defaults to admin)
/// - MONGO_DATABASE: Database for targets that name none (optional, defaults to test)
pub fn load_document_settings() -> Result<DocumentStoreSettings> {
    let host = std::env::var("MONGO_HOST").context("MONGO_HOST environment variable not set")?;
    let user = std::env::var("MONGO_USER").context("MONGO_USER environment variable not set")?;
    let password =
        std::env::var("MONGO_PASSWORD").context("MONGO_PASSWORD environment variable not set")?;
    let database = std::env::var("MONGO_DATABASE").unwrap_or_else(|_| "test".to_string());

    let mut settings = DocumentStoreSettings::new(user, password, host, database);
    if let Ok(port) = std::env::var("MONGO_PORT") {
        let port = port
            .parse::<u16>()
            .with_context(|| format!("Invalid MONGO_PORT: {}", port))?;
        settings = settings.with_port(port);
    }
    if let Ok(auth_source) = std::env::var("MONGO_AUTH_SOURCE") {
        settings = settings.with_auth_source(auth_source);
    }

    Ok(settings)
}

/// Path of the SQLite file, from SQLITE_PATH (defaults to session.db)
pub fn sqlite_path() -> PathBuf {
    std::env::var_os("SQLITE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("session.db"))
}

/// Assemble a dispatcher over the built-in routes
///
/// The relational sink is always available. The document sink is added when
/// MONGO_HOST is set. With `output`, every route writes NDJSON to that file
/// instead.
pub fn build_dispatcher(config_path: impl AsRef<Path>, output: Option<&Path>) -> Result<Dispatcher> {
    let config_path = config_path.as_ref();
    let config = SourceConfig::load(config_path)
        .with_context(|| format!("Failed to load source config {}", config_path.display()))?;

    let mut dispatcher = Dispatcher::from_config(config, RouteTable::builtin())
        .context("Failed to set up dispatcher")?
        .with_relational_sink(RelationalSink::new(sqlite_path(), TableSchema::crypto_prices()));

    if std::env::var_os("MONGO_HOST").is_some() {
        let settings = load_document_settings()?;
        log::debug!("Document store at {}:{}", settings.host, settings.port);
        dispatcher = dispatcher.with_document_sink(DocumentSink::mongo(settings));
    } else {
        log::debug!("MONGO_HOST not set, document store routes are unavailable");
    }

    if let Some(path) = output {
        log::info!("Writing records to {} instead of the configured stores", path.display());
        dispatcher = dispatcher.with_output(NdjsonSink::new(path));
    }

    Ok(dispatcher)
}

/// Run one dataset through its route
pub async fn run_dataset(
    config_path: impl AsRef<Path>,
    source: SourceKind,
    dataset: &str,
    output: Option<&Path>,
) -> Result<LoadResult> {
    let dispatcher = build_dispatcher(config_path, output)?;
    let dataset = DatasetName::new(dataset);

    let result = dispatcher
        .run(source, &dataset)
        .await
        .with_context(|| format!("ETL run for {}/{} failed", source, dataset))?;

    log::info!("✓ Loaded {} record(s) into {}", result.inserted, result.target);
    Ok(result)
}

/// One line per route: `kind/dataset  transform -> sink target [status]`
pub fn describe_routes<E: Extractor>(dispatcher: &Dispatcher<E>) -> Vec<String> {
    dispatcher
        .routes()
        .iter()
        .map(|(kind, name, route)| {
            let status = match dispatcher.config().contains(kind, name) {
                true => "configured",
                false => "not configured",
            };
            format!(
                "{}/{}  {} -> {} {} [{}]",
                kind,
                name,
                route.transform.name(),
                route.sink,
                route.target,
                status
            )
        })
        .collect()
}

/// Read back every row of a relational table
pub fn show_table(table: &str) -> Result<Vec<NormalizedRecord>> {
    let path = sqlite_path();
    RelationalSink::new(&path, TableSchema::crypto_prices())
        .fetch_all(table)
        .with_context(|| format!("Failed to read table {} from {}", table, path.display()))
}
