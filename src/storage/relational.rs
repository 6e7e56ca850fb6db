//! Relational store sink (SQLite)
//!
//! Writes a batch of records into one table inside a single transaction.
//! The batch is committed only after every row inserted; on any failure the
//! transaction rolls back and nothing from the batch is visible.

use crate::error::{EtlError, Result};
use crate::etl::Loader;
use crate::record::{LoadPayload, LoadResult, LoadTarget, NormalizedRecord, Scalar};
use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use regex::Regex;
use rusqlite::{Connection, OpenFlags, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static TABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("table name pattern is valid"));

/// Column of a [`TableSchema`].
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    /// Type and constraints, e.g. `REAL DEFAULT 0`
    pub definition: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }
}

/// Table layout: an `id INTEGER PRIMARY KEY` followed by data columns.
///
/// Record fields map to data columns by name. The id is assigned by SQLite.
#[derive(Clone, Debug, PartialEq)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    /// `(id, name, date, open, high, low, close)` price table
    pub fn crypto_prices() -> Self {
        Self::new(vec![
            ColumnDef::new("name", "TEXT NOT NULL"),
            ColumnDef::new("date", "TEXT"),
            ColumnDef::new("open", "REAL DEFAULT 0"),
            ColumnDef::new("high", "REAL DEFAULT 0"),
            ColumnDef::new("low", "REAL DEFAULT 0"),
            ColumnDef::new("close", "REAL DEFAULT 0"),
        ])
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    fn create_sql(&self, table: &str) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("\"{}\" {}", c.name, c.definition))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (id INTEGER PRIMARY KEY, {})",
            table,
            columns.join(", ")
        )
    }

    fn insert_sql(&self, table: &str) -> String {
        let names: Vec<String> = self.columns.iter().map(|c| format!("\"{}\"", c.name)).collect();
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table,
            names.join(", "),
            placeholders
        )
    }

    /// Bind values for `record` in column order
    fn row_values(&self, record: &NormalizedRecord) -> std::result::Result<Vec<SqlValue>, String> {
        if let Some(unknown) = record
            .keys()
            .find(|key| !self.columns.iter().any(|c| c.name == *key))
        {
            return Err(format!("field '{}' has no column", unknown));
        }
        Ok(self
            .columns
            .iter()
            .map(|c| record.get(&c.name).map(to_sql).unwrap_or(SqlValue::Null))
            .collect())
    }
}

/// Loader that writes records into a SQLite table
///
/// The load target's name is the table. With `replace` set (the default) the
/// table is dropped and re-created in the same transaction as the inserts.
pub struct RelationalSink {
    path: PathBuf,
    schema: TableSchema,
    replace: bool,
}

impl RelationalSink {
    pub fn new(path: impl AsRef<Path>, schema: TableSchema) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            schema,
            replace: true,
        }
    }

    /// Keep existing rows and append instead of re-creating the table
    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the database file, creating it only when `create` is set
    fn open(&self, target: &str, create: bool) -> Result<Connection> {
        log::debug!("Opening {}", self.path.display());
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if create {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        Connection::open_with_flags(&self.path, flags).map_err(|e| {
            EtlError::load_caused(
                target,
                format!("failed to open {}", self.path.display()),
                e,
            )
        })
    }

    /// Create the table, dropping any existing one first when `replace` is set
    pub fn define_table(&self, connection: &Connection, table: &str) -> Result<()> {
        check_identifier(table)?;
        let mut sql = String::new();
        if self.replace {
            sql.push_str(&format!("DROP TABLE IF EXISTS \"{}\";\n", table));
        }
        sql.push_str(&self.schema.create_sql(table));
        connection
            .execute_batch(&sql)
            .map_err(|e| EtlError::load_caused(table, "table definition failed", e))
    }

    fn write(&self, connection: &mut Connection, table: &str, records: &[NormalizedRecord]) -> Result<usize> {
        let tx = connection
            .transaction()
            .map_err(|e| EtlError::load_caused(table, "failed to begin transaction", e))?;

        self.define_table(&tx, table)?;

        {
            let mut statement = tx
                .prepare(&self.schema.insert_sql(table))
                .map_err(|e| EtlError::load_caused(table, "failed to prepare insert", e))?;
            for (index, record) in records.iter().enumerate() {
                let values = self
                    .schema
                    .row_values(record)
                    .map_err(|msg| EtlError::load(table, format!("row {}: {}", index + 1, msg)))?;
                statement.execute(params_from_iter(values)).map_err(|e| {
                    EtlError::load_caused(table, format!("row {} insert failed", index + 1), e)
                })?;
            }
        }

        tx.commit()
            .map_err(|e| EtlError::load_caused(table, "commit failed", e))?;
        Ok(records.len())
    }

    /// Read every row of `table`, ordered by id. NULL columns are omitted.
    ///
    /// A missing database file is an error; it is not created.
    pub fn fetch_all(&self, table: &str) -> Result<Vec<NormalizedRecord>> {
        check_identifier(table)?;
        let connection = self.open(table, false)?;

        let records = read_rows(&connection, table);
        release(connection, &self.path);
        records
    }
}

#[async_trait]
impl Loader for RelationalSink {
    async fn load(&self, payload: LoadPayload, target: &LoadTarget) -> Result<LoadResult> {
        let table = target.name.as_str();
        check_identifier(table)?;
        let records = payload.into_records();

        let mut connection = self.open(table, true)?;
        let outcome = self.write(&mut connection, table, &records);
        release(connection, &self.path);

        let inserted = outcome?;
        log::info!(
            "Inserted {} row(s) into {} ({})",
            inserted,
            table,
            self.path.display()
        );
        Ok(LoadResult {
            target: table.to_string(),
            inserted,
        })
    }
}

fn read_rows(connection: &Connection, table: &str) -> Result<Vec<NormalizedRecord>> {
    let read_error = |e: rusqlite::Error| EtlError::load_caused(table, "failed to read table", e);

    let mut statement = connection
        .prepare(&format!("SELECT * FROM \"{}\" ORDER BY id", table))
        .map_err(read_error)?;
    let names: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let rows = statement
        .query_map([], |row| {
            let mut record = NormalizedRecord::new();
            for (index, name) in names.iter().enumerate() {
                if let Some(value) = from_sql(row.get::<_, SqlValue>(index)?) {
                    record.insert(name.as_str(), value);
                }
            }
            Ok(record)
        })
        .map_err(read_error)?;

    let records = rows
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(read_error)?;
    Ok(records)
}

/// Close the connection. On a failed close the returned handle is dropped,
/// which closes it without reporting.
fn release(connection: Connection, path: &Path) {
    match connection.close() {
        Ok(()) => log::debug!("Closed {}", path.display()),
        Err((_, e)) => log::warn!("Failed to close {} cleanly: {}", path.display(), e),
    }
}

fn check_identifier(name: &str) -> Result<()> {
    if !TABLE_NAME.is_match(name) {
        return Err(EtlError::load(
            name,
            "table names may only contain letters, digits and underscores",
        ));
    }
    Ok(())
}

fn to_sql(value: &Scalar) -> SqlValue {
    match value {
        Scalar::Text(s) => SqlValue::Text(s.clone()),
        Scalar::Integer(i) => SqlValue::Integer(*i),
        Scalar::Number(n) => SqlValue::Real(*n),
        Scalar::Timestamp(ts) => SqlValue::Text(ts.to_rfc3339()),
    }
}

fn from_sql(value: SqlValue) -> Option<Scalar> {
    match value {
        SqlValue::Null => None,
        SqlValue::Integer(i) => Some(Scalar::Integer(i)),
        SqlValue::Real(n) => Some(Scalar::Number(n)),
        SqlValue::Text(s) => Some(Scalar::Text(s)),
        SqlValue::Blob(b) => Some(Scalar::Text(String::from_utf8_lossy(&b).into_owned())),
    }
}
