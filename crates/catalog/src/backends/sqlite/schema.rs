//! SQLite schema definitions.
//!
//! ```text
//! records      (local_id PK, datestamp, deleted, metadata, ...extra format columns)
//! sets         (set_spec PK, set_name, description)
//! record_sets  (local_id, set_spec)  -- membership, in insertion order
//! ```
//!
//! Extra columns added to `records` are exposed to crosswalks as row columns,
//! so a deployment can keep one column per metadata format.

use rusqlite::Connection;

use crate::error::{CatalogError, CatalogResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> CatalogResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(CatalogError::internal(
            "sqlite",
            format!(
                "database schema version {current_version} is newer than supported version {SCHEMA_VERSION}"
            ),
        ));
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> CatalogResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| schema_error("Failed to create schema_version table", e))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> CatalogResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| schema_error("Failed to clear schema_version", e))?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )
    .map_err(|e| schema_error("Failed to set schema_version", e))?;
    Ok(())
}

fn create_schema_v1(conn: &Connection) -> CatalogResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS records (
            local_id TEXT NOT NULL PRIMARY KEY,
            datestamp TEXT NOT NULL,
            deleted INTEGER NOT NULL DEFAULT 0,
            metadata TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_records_datestamp ON records (datestamp);

        CREATE TABLE IF NOT EXISTS sets (
            set_spec TEXT NOT NULL PRIMARY KEY,
            set_name TEXT NOT NULL,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS record_sets (
            local_id TEXT NOT NULL,
            set_spec TEXT NOT NULL,
            PRIMARY KEY (local_id, set_spec)
        );

        CREATE INDEX IF NOT EXISTS idx_record_sets_spec ON record_sets (set_spec, local_id);",
    )
    .map_err(|e| schema_error("Failed to create tables", e))
}

fn schema_error(context: &str, e: rusqlite::Error) -> CatalogError {
    CatalogError::Internal {
        backend_name: "sqlite".to_string(),
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}
