//! SQLite catalog implementation.
//!
//! Records live in a `records` table, one row per record, with set
//! memberships in `record_sets`. Every column of a row reaches the crosswalks,
//! so a deployment can add one column per metadata format.
//!
//! Two pagination modes are available, see [`CursorMode`]:
//!
//! - `snapshot` materializes the filtered result on the first page and holds
//!   the remainder behind a single-use token
//! - `offset` re-runs the query from a row offset, so tokens can be replayed
//!
//! # Example
//!
//! ```no_run
//! use oaiserve_catalog::backends::sqlite::{CursorMode, SqliteCatalog, SqliteCatalogConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SqliteCatalogConfig::new("./data/records.db").with_cursor_mode(CursorMode::Offset);
//! let catalog = SqliteCatalog::open(config)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE records (
//!     local_id TEXT NOT NULL PRIMARY KEY,
//!     datestamp TEXT NOT NULL,
//!     deleted INTEGER NOT NULL DEFAULT 0,
//!     metadata TEXT
//! );
//!
//! CREATE TABLE sets (
//!     set_spec TEXT NOT NULL PRIMARY KEY,
//!     set_name TEXT NOT NULL,
//!     description TEXT
//! );
//!
//! CREATE TABLE record_sets (
//!     local_id TEXT NOT NULL,
//!     set_spec TEXT NOT NULL,
//!     PRIMARY KEY (local_id, set_spec)
//! );
//! ```

mod backend;
mod cursor;
pub(crate) mod schema;

pub use backend::{CursorMode, MEMORY_PATH, SqliteCatalog, SqliteCatalogConfig};
pub use cursor::SnapshotCursor;
