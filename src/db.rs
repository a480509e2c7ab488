//! Database table exports.
//!
//! A [`TableSource`] names qualified tables and fetches their rows; this
//! module handles the local side, writing one CSV file per table under the
//! export directory. Discovery is narrowed by a [`TableFilter`] before any
//! row is fetched, and per-table failures are isolated the same way
//! per-object download failures are. [`PgTableSource`] is the shipped
//! driver, pooled over sqlx.

use crate::config::{DbCredentials, ResolvedConfig};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// All rows of one table, stringly typed at this boundary.
#[derive(Debug, Clone)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Seam for the relational database a deployment extracts from.
///
/// Implementations own connection handling and query execution; table names
/// are qualified (`schema.table`) and become the export file names.
#[async_trait]
pub trait TableSource {
    async fn table_names(&self) -> AppResult<Vec<String>>;
    async fn fetch_table(&self, table: &str) -> AppResult<TableData>;
}

/// Restricts which discovered tables are exported.
///
/// The deployments this replaces pull a fixed set of business schemas and
/// skip the view-backed `v...` tables; both knobs are configuration here.
#[derive(Debug, Clone)]
pub struct TableFilter {
    /// Export only tables in these schemas; empty keeps every schema
    pub schemas: Vec<String>,
    /// Drop tables whose bare name starts with this prefix (case-insensitive)
    pub exclude_prefix: Option<String>,
}

impl Default for TableFilter {
    fn default() -> Self {
        Self {
            schemas: crate::constants::DEFAULT_DB_SCHEMAS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude_prefix: Some(crate::constants::DEFAULT_DB_EXCLUDE_PREFIX.to_string()),
        }
    }
}

impl TableFilter {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            schemas: config.db_schemas.clone(),
            exclude_prefix: config.db_exclude_prefix.clone(),
        }
    }

    pub fn matches(&self, qualified_name: &str) -> bool {
        let (schema, name) = match qualified_name.split_once('.') {
            Some(parts) => parts,
            None => ("", qualified_name),
        };
        if !self.schemas.is_empty() && !self.schemas.iter().any(|s| s == schema) {
            return false;
        }
        if let Some(prefix) = &self.exclude_prefix {
            if name.to_lowercase().starts_with(&prefix.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Outcome of exporting one source's tables.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<(String, String)>,
}

/// Exports every table the source names, after filtering, as
/// `{export_dir}/{table}.csv`.
///
/// A failure fetching or writing one table is logged and recorded without
/// blocking the remaining tables. Failing to enumerate tables at all is a
/// setup error and propagates.
pub async fn export_tables(
    source: &(dyn TableSource + Sync),
    export_dir: &Path,
    filter: &TableFilter,
) -> AppResult<ExportReport> {
    fs::create_dir_all(export_dir)
        .map_err(|e| AppError::IoError(format!("Failed to create export directory: {e}")))?;

    let mut tables = source.table_names().await?;
    let discovered = tables.len();
    tables.retain(|name| filter.matches(name));

    info!(
        discovered = discovered,
        kept = tables.len(),
        "Discovered tables"
    );

    let mut report = ExportReport {
        attempted: tables.len(),
        ..ExportReport::default()
    };

    if tables.is_empty() {
        info!("No tables to export");
        return Ok(report);
    }

    for table in &tables {
        let output = export_dir.join(format!("{table}.csv"));
        let result = match source.fetch_table(table).await {
            Ok(data) => write_csv(&output, &data),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                report.succeeded += 1;
                info!(table = table.as_str(), file = %output.display(), "Exported table");
            }
            Err(e) => {
                warn!(table = table.as_str(), error = %e, "Failed to export table");
                report.failed.push((table.clone(), e.to_string()));
            }
        }
    }

    info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failed.len(),
        "Table export completed"
    );

    Ok(report)
}

/// Pooled relational source.
pub struct PgTableSource {
    pool: PgPool,
}

impl PgTableSource {
    /// Connects with environment-sourced credentials.
    ///
    /// # Errors
    ///
    /// Returns `DbError` when the server is unreachable or rejects the
    /// credentials; the caller treats this as a job setup failure.
    pub async fn connect(credentials: &DbCredentials) -> AppResult<Self> {
        let options = PgConnectOptions::new()
            .host(&credentials.server)
            .database(&credentials.database)
            .username(&credentials.user)
            .password(&credentials.password);

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl TableSource for PgTableSource {
    async fn table_names(&self) -> AppResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT table_schema || '.' || table_name AS name \
             FROM information_schema.tables \
             WHERE table_type = 'BASE TABLE' \
               AND table_schema NOT IN ('pg_catalog', 'information_schema') \
             ORDER BY 1",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(AppError::from))
            .collect()
    }

    async fn fetch_table(&self, table: &str) -> AppResult<TableData> {
        let (schema, name) = table
            .split_once('.')
            .ok_or_else(|| AppError::DbError(format!("Table name '{table}' is not qualified")))?;

        let column_rows = sqlx::query(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 \
             ORDER BY ordinal_position",
        )
        .bind(schema)
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        let columns = column_rows
            .iter()
            .map(|row| row.try_get::<String, _>("column_name").map_err(AppError::from))
            .collect::<AppResult<Vec<String>>>()?;

        if columns.is_empty() {
            return Err(AppError::DbError(format!("Table '{table}' has no columns")));
        }

        // Every column is cast to text server-side so the rows come back
        // uniformly stringly typed.
        let select_list = columns
            .iter()
            .map(|c| format!("{}::text", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {select_list} FROM {}.{}",
            quote_ident(schema),
            quote_ident(name)
        );

        let data_rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let rows = data_rows
            .iter()
            .map(|row| {
                (0..columns.len())
                    .map(|i| {
                        row.try_get::<Option<String>, _>(i)
                            .map(|v| v.unwrap_or_default())
                            .map_err(AppError::from)
                    })
                    .collect::<AppResult<Vec<String>>>()
            })
            .collect::<AppResult<Vec<Vec<String>>>>()?;

        Ok(TableData { columns, rows })
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn write_csv(path: &Path, data: &TableData) -> AppResult<()> {
    let file = fs::File::create(path)
        .map_err(|e| AppError::IoError(format!("Failed to create {}: {e}", path.display())))?;
    let mut writer = BufWriter::new(file);

    write_record(&mut writer, &data.columns)?;
    for row in &data.rows {
        write_record(&mut writer, row)?;
    }

    writer
        .flush()
        .map_err(|e| AppError::IoError(format!("Failed to write {}: {e}", path.display())))?;
    Ok(())
}

fn write_record<W: Write>(writer: &mut W, fields: &[String]) -> AppResult<()> {
    let line = fields
        .iter()
        .map(|field| csv_field(field))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(writer, "{line}").map_err(|e| AppError::IoError(format!("CSV write failed: {e}")))?;
    Ok(())
}

/// Quotes a field when needed, doubling embedded quotes.
fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
