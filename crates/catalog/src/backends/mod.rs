//! Catalog backend implementations.
//!
//! | Backend | Feature | Pagination |
//! |---------|---------|------------|
//! | Filesystem | always | replayable positions |
//! | XML | always | replayable positions |
//! | SQLite | `sqlite` | snapshot (live) or offset (replayable) |

pub mod filesystem;
pub(crate) mod index;
pub mod xml;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use filesystem::{FilesystemCatalog, FilesystemCatalogConfig, HeaderSource};
pub use xml::{XmlCatalog, XmlCatalogConfig};
