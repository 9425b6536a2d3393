//! Backend identification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies the kind of catalog backend.
///
/// Used to select a backend from configuration and in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// A directory tree of record files.
    Filesystem,
    /// A single XML document indexed in memory.
    Xml,
    /// A SQLite database.
    Sqlite,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Filesystem => write!(f, "filesystem"),
            BackendKind::Xml => write!(f, "xml"),
            BackendKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "filesystem" | "fs" => Ok(BackendKind::Filesystem),
            "xml" => Ok(BackendKind::Xml),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(format!(
                "unknown backend '{other}', expected filesystem, xml or sqlite"
            )),
        }
    }
}
