//! SQLite catalog implementation.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{Catalog, CatalogPage, FormatFilter, ResumeCursor, resume_live};
use crate::error::{CatalogError, CatalogResult};
use crate::types::{HarvestQuery, NativeRecord, Payload, RecordHeader, SetSpec};

use super::cursor::SnapshotCursor;
use super::schema;

/// Path value selecting a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// How listings continue across pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorMode {
    /// Materialize the filtered result on the first page and hold it as a
    /// live cursor. Pages are consistent, but a token is usable once and
    /// only within this process.
    #[default]
    Snapshot,
    /// Re-run the query and skip to a row offset. Tokens can be replayed,
    /// but writes between pages may shift results.
    Offset,
}

impl FromStr for CursorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "snapshot" => Ok(CursorMode::Snapshot),
            "offset" => Ok(CursorMode::Offset),
            other => Err(format!("unknown cursor mode '{other}', expected snapshot or offset")),
        }
    }
}

/// Configuration for the SQLite catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteCatalogConfig {
    /// Database file, or `:memory:`.
    pub path: PathBuf,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Pagination strategy.
    #[serde(default)]
    pub cursor_mode: CursorMode,

    /// Create the default tables if missing.
    #[serde(default = "default_true")]
    pub init_schema: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

impl SqliteCatalogConfig {
    /// Creates a configuration for a database path with default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: default_max_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            cursor_mode: CursorMode::default(),
            init_schema: true,
        }
    }

    /// Sets the cursor mode.
    pub fn with_cursor_mode(mut self, cursor_mode: CursorMode) -> Self {
        self.cursor_mode = cursor_mode;
        self
    }
}

/// A catalog backed by a SQLite database.
pub struct SqliteCatalog {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteCatalogConfig,
    is_memory: bool,
}

impl Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalog")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Normalizes a stored datestamp to the width of the query bounds (`?3`).
const DATESTAMP_EXPR: &str = "CASE WHEN length(r.datestamp) = 10 AND ?3 = 20 \
     THEN r.datestamp || 'T00:00:00Z' ELSE substr(r.datestamp, 1, ?3) END";

impl SqliteCatalog {
    /// Creates a catalog over a private in-memory database.
    pub fn in_memory() -> CatalogResult<Self> {
        Self::open(SqliteCatalogConfig::new(MEMORY_PATH))
    }

    /// Opens the configured database, creating the schema if requested.
    pub fn open(config: SqliteCatalogConfig) -> CatalogResult<Self> {
        let is_memory = config.path.as_os_str() == MEMORY_PATH;
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(&config.path)
        };
        let manager = manager.with_init(move |conn| conn.busy_timeout(busy_timeout));

        // A memory database lives exactly as long as its one connection.
        let builder = if is_memory {
            Pool::builder()
                .max_size(1)
                .min_idle(Some(1))
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            Pool::builder().max_size(config.max_connections)
        };
        let pool = builder
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)
            .map_err(|e| CatalogError::Internal {
                backend_name: "sqlite".to_string(),
                message: format!("failed to open {}", config.path.display()),
                source: Some(Box::new(e)),
            })?;

        let catalog = Self {
            pool,
            config,
            is_memory,
        };
        if catalog.config.init_schema {
            catalog.init_schema()?;
        }

        info!(
            path = %catalog.config.path.display(),
            cursor_mode = ?catalog.config.cursor_mode,
            "Opened SQLite catalog"
        );
        Ok(catalog)
    }

    /// Initialize the database schema.
    pub fn init_schema(&self) -> CatalogResult<()> {
        let conn = self.connection()?;
        schema::initialize_schema(&conn)
    }

    /// Get a connection from the pool.
    pub fn connection(&self) -> CatalogResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the database path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Returns the catalog configuration.
    pub fn config(&self) -> &SqliteCatalogConfig {
        &self.config
    }

    /// Scans rows from `offset` in rowid order.
    ///
    /// Mirrors the in-memory index scan: one accepted row past the page is
    /// probed, and its offset becomes the cursor position.
    fn scan_offset(
        &self,
        query: &HarvestQuery,
        offset: usize,
        filter: &FormatFilter<'_>,
        page_size: usize,
        count_total: bool,
    ) -> CatalogResult<CatalogPage> {
        let conn = self.connection()?;
        let mut items = Vec::with_capacity(page_size);
        let mut next = None;
        let mut matched = 0usize;

        for_each_row(&conn, query, offset, |position, record| {
            if !filter.accepts(&record) {
                return Ok(true);
            }
            matched += 1;
            if items.len() < page_size {
                items.push(record);
            } else if next.is_none() {
                next = Some(position);
                return Ok(count_total);
            }
            Ok(true)
        })?;

        for record in &mut items {
            record.header.set_specs = load_sets(&conn, record.identifier())?;
        }

        Ok(CatalogPage {
            items,
            resume: next.map(|position| ResumeCursor::Replay {
                query: query.clone(),
                position,
            }),
            total: count_total.then_some(matched),
        })
    }

    /// Materializes the whole filtered result and serves the first page.
    fn scan_snapshot(
        &self,
        query: &HarvestQuery,
        filter: &FormatFilter<'_>,
        page_size: usize,
    ) -> CatalogResult<CatalogPage> {
        let conn = self.connection()?;
        let mut rows = Vec::new();
        for_each_row(&conn, query, 0, |_, record| {
            if filter.accepts(&record) {
                rows.push(record);
            }
            Ok(true)
        })?;
        for record in &mut rows {
            record.header.set_specs = load_sets(&conn, record.identifier())?;
        }

        let total = rows.len();
        let rest = rows.split_off(page_size.min(total));
        debug!(total, held = rest.len(), "Materialized SQLite snapshot");
        let resume = (!rest.is_empty()).then(|| ResumeCursor::Live {
            query: query.clone(),
            cursor: Box::new(SnapshotCursor::new(rest, page_size)),
        });

        Ok(CatalogPage {
            items: rows,
            resume,
            total: Some(total),
        })
    }
}

/// Runs the filtered listing query from `offset`, calling `visit` with each
/// row's absolute position until it returns `false`.
fn for_each_row(
    conn: &Connection,
    query: &HarvestQuery,
    offset: usize,
    mut visit: impl FnMut(usize, NativeRecord) -> CatalogResult<bool>,
) -> CatalogResult<()> {
    let sql = format!(
        "SELECT r.* FROM records r
         WHERE {DATESTAMP_EXPR} BETWEEN ?1 AND ?2
           AND (?4 IS NULL OR EXISTS (
                SELECT 1 FROM record_sets rs
                WHERE rs.local_id = r.local_id AND rs.set_spec = ?4))
         ORDER BY r.rowid
         LIMIT -1 OFFSET ?5"
    );
    let width = i64::try_from(query.from.len()).unwrap_or(i64::MAX);
    let offset_param = i64::try_from(offset).unwrap_or(i64::MAX);

    let mut stmt = conn.prepare(&sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params![
        query.from,
        query.until,
        width,
        query.set,
        offset_param
    ])?;

    let mut position = offset;
    while let Some(row) = rows.next()? {
        let record = row_to_record(row, &columns)?;
        if !visit(position, record)? {
            break;
        }
        position += 1;
    }
    Ok(())
}

fn row_to_record(row: &rusqlite::Row<'_>, columns: &[String]) -> CatalogResult<NativeRecord> {
    let mut values = BTreeMap::new();
    for (i, name) in columns.iter().enumerate() {
        let value = match row.get_ref(i)? {
            ValueRef::Null => None,
            ValueRef::Integer(n) => Some(n.to_string()),
            ValueRef::Real(f) => Some(f.to_string()),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Some(String::from_utf8_lossy(bytes).into_owned())
            }
        };
        values.insert(name.clone(), value);
    }

    let required = |name: &str| -> CatalogResult<String> {
        values.get(name).cloned().flatten().ok_or_else(|| CatalogError::InvalidRecord {
            identifier: values
                .get("local_id")
                .cloned()
                .flatten()
                .unwrap_or_default(),
            message: format!("missing {name}"),
        })
    };
    let identifier = required("local_id")?;
    let datestamp = required("datestamp")?;
    let deleted = values
        .get("deleted")
        .cloned()
        .flatten()
        .is_some_and(|v| v != "0");

    let header = RecordHeader::new(identifier, datestamp).with_deleted(deleted);
    Ok(NativeRecord::new(header, Payload::Row(values)))
}

fn load_sets(conn: &Connection, identifier: &str) -> CatalogResult<Vec<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT set_spec FROM record_sets WHERE local_id = ?1 ORDER BY rowid")?;
    let sets = stmt
        .query_map([identifier], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sets)
}

impl Catalog for SqliteCatalog {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn supports_replay(&self) -> bool {
        self.config.cursor_mode == CursorMode::Offset
    }

    fn query_range(
        &self,
        query: &HarvestQuery,
        filter: &FormatFilter<'_>,
        page_size: usize,
    ) -> CatalogResult<CatalogPage> {
        match self.config.cursor_mode {
            CursorMode::Snapshot => self.scan_snapshot(query, filter, page_size),
            CursorMode::Offset => self.scan_offset(query, 0, filter, page_size, true),
        }
    }

    fn query_resume(
        &self,
        cursor: ResumeCursor,
        filter: &FormatFilter<'_>,
        page_size: usize,
    ) -> CatalogResult<CatalogPage> {
        match cursor {
            ResumeCursor::Replay { query, position } => {
                self.scan_offset(&query, position, filter, page_size, false)
            }
            ResumeCursor::Live { query, cursor } => resume_live(query, cursor, page_size),
        }
    }

    fn get_by_identifier(&self, identifier: &str) -> CatalogResult<Option<NativeRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare_cached("SELECT * FROM records WHERE local_id = ?1")?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let record = stmt
            .query_row([identifier], |row| Ok(row_to_record(row, &columns)))
            .optional()?
            .transpose()?;

        match record {
            Some(mut record) => {
                record.header.set_specs = load_sets(&conn, identifier)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn list_sets(&self) -> CatalogResult<Option<Vec<SetSpec>>> {
        let conn = self.connection()?;
        let mut stmt =
            conn.prepare("SELECT set_spec, set_name, description FROM sets ORDER BY set_spec")?;
        let mut sets = stmt
            .query_map([], |row| {
                Ok(SetSpec {
                    spec: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if sets.is_empty() {
            let mut stmt =
                conn.prepare("SELECT DISTINCT set_spec FROM record_sets ORDER BY set_spec")?;
            sets = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .map(|spec| spec.map(SetSpec::new))
                .collect::<Result<Vec<_>, _>>()?;
        }

        Ok((!sets.is_empty()).then_some(sets))
    }

    fn earliest_datestamp(&self) -> CatalogResult<Option<String>> {
        let conn = self.connection()?;
        let earliest = conn.query_row("SELECT MIN(datestamp) FROM records", [], |row| {
            row.get::<_, Option<String>>(0)
        })?;
        Ok(earliest)
    }
}
