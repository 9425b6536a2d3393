//! Metadata crosswalks.
//!
//! A crosswalk turns a native record into metadata of one format. The
//! registry is keyed by `metadataPrefix` and keeps configuration order.

use std::fmt::Debug;

use crate::error::{CatalogError, CatalogResult};
use crate::types::{MetadataFormat, NativeRecord, Payload};

/// Converts native records into one metadata format.
pub trait Crosswalk: Send + Sync + Debug {
    /// The format this crosswalk produces.
    fn format(&self) -> &MetadataFormat;

    /// Returns true if `record` can be rendered in this format.
    fn is_available_for(&self, record: &NativeRecord) -> bool;

    /// Renders the metadata fragment for a live record.
    fn create_metadata(&self, record: &NativeRecord) -> CatalogResult<String>;
}

/// Emits the stored content unchanged.
///
/// Files are read as UTF-8 text, rows yield the configured column, and
/// parsed XML records yield their `<metadata>` content when its declared
/// schema (if any) matches this format.
#[derive(Debug, Clone)]
pub struct PassThroughCrosswalk {
    format: MetadataFormat,
    column: String,
}

impl PassThroughCrosswalk {
    /// Default row column holding metadata.
    pub const DEFAULT_COLUMN: &'static str = "metadata";

    /// Creates a pass-through crosswalk reading rows from the default column.
    pub fn new(format: MetadataFormat) -> Self {
        Self {
            format,
            column: Self::DEFAULT_COLUMN.to_string(),
        }
    }

    /// Sets the row column to emit.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }
}

impl Crosswalk for PassThroughCrosswalk {
    fn format(&self) -> &MetadataFormat {
        &self.format
    }

    fn is_available_for(&self, record: &NativeRecord) -> bool {
        match &record.payload {
            Payload::File(_) => true,
            Payload::Row(columns) => columns.get(&self.column).is_some_and(Option::is_some),
            Payload::Xml(xml) => {
                xml.metadata.is_some()
                    && xml
                        .schema_location
                        .as_deref()
                        .is_none_or(|schema| schema == self.format.schema)
            }
        }
    }

    fn create_metadata(&self, record: &NativeRecord) -> CatalogResult<String> {
        match &record.payload {
            Payload::File(path) => {
                std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                    backend_name: "filesystem".to_string(),
                    source,
                })
            }
            Payload::Row(columns) => columns
                .get(&self.column)
                .cloned()
                .flatten()
                .ok_or_else(|| CatalogError::InvalidRecord {
                    identifier: record.identifier().to_string(),
                    message: format!("column '{}' is empty", self.column),
                }),
            Payload::Xml(xml) => xml.metadata.clone().ok_or_else(|| CatalogError::InvalidRecord {
                identifier: record.identifier().to_string(),
                message: "record has no metadata".to_string(),
            }),
        }
    }
}

/// The crosswalks a repository disseminates through, keyed by prefix.
#[derive(Debug, Default)]
pub struct Crosswalks {
    entries: Vec<Box<dyn Crosswalk>>,
}

impl Crosswalks {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a crosswalk, replacing any with the same prefix.
    pub fn register(&mut self, crosswalk: Box<dyn Crosswalk>) {
        let prefix = crosswalk.format().metadata_prefix.clone();
        match self.position(&prefix) {
            Some(index) => self.entries[index] = crosswalk,
            None => self.entries.push(crosswalk),
        }
    }

    /// Builder form of [`Crosswalks::register`].
    pub fn with(mut self, crosswalk: impl Crosswalk + 'static) -> Self {
        self.register(Box::new(crosswalk));
        self
    }

    /// Looks up the crosswalk for a prefix.
    pub fn get(&self, metadata_prefix: &str) -> Option<&dyn Crosswalk> {
        self.position(metadata_prefix)
            .map(|index| self.entries[index].as_ref())
    }

    /// Iterates in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Crosswalk> {
        self.entries.iter().map(|c| c.as_ref())
    }

    /// Number of registered formats.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no formats are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, metadata_prefix: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|c| c.format().metadata_prefix == metadata_prefix)
    }
}
