//! Directory-tree catalog.
//!
//! The tree under `home_dir` is walked once at startup, directories in
//! name order, and every regular file becomes a record. Hidden entries and
//! `CVS` directories are skipped.
//!
//! Headers come from one of two places:
//!
//! - [`HeaderSource::Mtime`]: the identifier is the path relative to
//!   `home_dir` and the datestamp is the file's modification time. The file
//!   content is the metadata and is read only when a record is rendered.
//! - [`HeaderSource::Embedded`]: each file is an OAI `<record>` document and
//!   its `<header>` supplies identifier, datestamp, sets and deletion status.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::{Catalog, CatalogPage, FormatFilter, ResumeCursor};
use crate::error::{CatalogError, CatalogResult};
use crate::types::{Granularity, HarvestQuery, NativeRecord, Payload, RecordHeader, SetSpec};

use super::index::RecordIndex;
use super::xml::parse_records;

/// Where record headers are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderSource {
    /// Relative path and modification time.
    #[default]
    Mtime,
    /// The `<header>` of an OAI record document.
    Embedded,
}

impl FromStr for HeaderSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mtime" => Ok(HeaderSource::Mtime),
            "embedded" => Ok(HeaderSource::Embedded),
            other => Err(format!("unknown header source '{other}', expected mtime or embedded")),
        }
    }
}

/// Configuration for the filesystem catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemCatalogConfig {
    /// Root of the record tree.
    pub home_dir: PathBuf,

    /// Strip a trailing `.xml` from path-derived identifiers.
    #[serde(default)]
    pub hide_extension: bool,

    /// Where headers come from.
    #[serde(default)]
    pub headers: HeaderSource,

    /// Granularity of path-derived datestamps.
    #[serde(default)]
    pub granularity: Granularity,
}

impl FilesystemCatalogConfig {
    /// Creates a configuration rooted at `home_dir`.
    pub fn new(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
            hide_extension: false,
            headers: HeaderSource::default(),
            granularity: Granularity::default(),
        }
    }
}

/// A catalog over a directory tree.
#[derive(Debug)]
pub struct FilesystemCatalog {
    config: FilesystemCatalogConfig,
    index: RecordIndex,
}

impl FilesystemCatalog {
    /// Walks `home_dir` and builds the index.
    pub fn open(config: FilesystemCatalogConfig) -> CatalogResult<Self> {
        if !config.home_dir.is_dir() {
            return Err(CatalogError::internal(
                "filesystem",
                format!("home directory {} does not exist", config.home_dir.display()),
            ));
        }

        let mut files = Vec::new();
        walk(&config.home_dir, &mut files)?;

        let mut index = RecordIndex::new();
        for path in files {
            let Some(record) = load(&config, &path)? else {
                continue;
            };
            let identifier = record.identifier().to_string();
            if !index.push(record) {
                warn!(identifier = %identifier, path = %path.display(), "Duplicate identifier in filesystem catalog; lookups use the first");
            }
        }

        info!(
            records = index.len(),
            home_dir = %config.home_dir.display(),
            headers = ?config.headers,
            "Indexed filesystem catalog"
        );
        Ok(Self { config, index })
    }

    /// The indexed root directory.
    pub fn home_dir(&self) -> &Path {
        &self.config.home_dir
    }

    fn scan(
        &self,
        query: &HarvestQuery,
        start: usize,
        filter: &FormatFilter<'_>,
        page_size: usize,
        count_total: bool,
    ) -> CatalogPage {
        self.index
            .scan(query, start, page_size, count_total, |record| filter.accepts(record))
    }
}

fn io_error(source: std::io::Error) -> CatalogError {
    CatalogError::Io {
        backend_name: "filesystem".to_string(),
        source,
    }
}

/// Collects regular files below `dir`, depth first, in name order.
fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> CatalogResult<()> {
    let mut entries = std::fs::read_dir(dir)
        .map_err(io_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        let file_type = entry.file_type().map_err(io_error)?;
        if file_type.is_dir() {
            if name == "CVS" {
                continue;
            }
            walk(&entry.path(), files)?;
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    Ok(())
}

fn load(config: &FilesystemCatalogConfig, path: &Path) -> CatalogResult<Option<NativeRecord>> {
    match config.headers {
        HeaderSource::Mtime => {
            let modified = std::fs::metadata(path)
                .and_then(|m| m.modified())
                .map_err(io_error)?;
            let datestamp = config.granularity.format(&DateTime::<Utc>::from(modified));
            let header = RecordHeader::new(relative_identifier(config, path), datestamp);
            Ok(Some(NativeRecord::new(header, Payload::File(path.to_path_buf()))))
        }
        HeaderSource::Embedded => {
            let xml = std::fs::read_to_string(path).map_err(io_error)?;
            let location = path.display().to_string();
            let mut records = parse_records(&xml, &location)?;
            if records.len() > 1 {
                warn!(path = %location, count = records.len(), "File holds several records; indexing the first");
            }
            if records.is_empty() {
                debug!(path = %location, "Skipping file without a record");
                return Ok(None);
            }
            Ok(Some(records.swap_remove(0)))
        }
    }
}

fn relative_identifier(config: &FilesystemCatalogConfig, path: &Path) -> String {
    let relative = path.strip_prefix(&config.home_dir).unwrap_or(path);
    let identifier = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if config.hide_extension {
        if let Some(stem) = identifier.strip_suffix(".xml") {
            return stem.to_string();
        }
    }
    identifier
}

impl Catalog for FilesystemCatalog {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn supports_replay(&self) -> bool {
        true
    }

    fn query_range(
        &self,
        query: &HarvestQuery,
        filter: &FormatFilter<'_>,
        page_size: usize,
    ) -> CatalogResult<CatalogPage> {
        Ok(self.scan(query, 0, filter, page_size, true))
    }

    fn query_resume(
        &self,
        cursor: ResumeCursor,
        filter: &FormatFilter<'_>,
        page_size: usize,
    ) -> CatalogResult<CatalogPage> {
        match cursor {
            ResumeCursor::Replay { query, position } => {
                Ok(self.scan(&query, position, filter, page_size, false))
            }
            ResumeCursor::Live { .. } => Err(CatalogError::internal(
                "filesystem",
                "live cursors are not issued by this catalog",
            )),
        }
    }

    fn get_by_identifier(&self, identifier: &str) -> CatalogResult<Option<NativeRecord>> {
        Ok(self.index.get(identifier).cloned())
    }

    fn list_sets(&self) -> CatalogResult<Option<Vec<SetSpec>>> {
        let sets = self.index.set_specs();
        Ok((!sets.is_empty()).then_some(sets))
    }

    fn earliest_datestamp(&self) -> CatalogResult<Option<String>> {
        Ok(self.index.earliest_datestamp())
    }
}
