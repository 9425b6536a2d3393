//! In-memory XML catalog.
//!
//! One XML document holding many `<record>` elements is parsed at startup
//! into an ordered [`RecordIndex`]; queries never touch the file again.

pub mod parser;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{Catalog, CatalogPage, FormatFilter, ResumeCursor};
use crate::error::{CatalogError, CatalogResult};
use crate::types::{HarvestQuery, NativeRecord, Payload, SetSpec};

use super::index::RecordIndex;

pub use parser::parse_records;

/// Configuration for the XML catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlCatalogConfig {
    /// The document to load.
    pub source_file: PathBuf,

    /// Each record carries exactly one format, identified by the schema
    /// location of its metadata; format filtering compares schemas directly.
    /// One identifier may then appear once per format.
    #[serde(default)]
    pub schema_location_indexed: bool,
}

impl XmlCatalogConfig {
    /// Creates a configuration for a source document.
    pub fn new(source_file: impl Into<PathBuf>) -> Self {
        Self {
            source_file: source_file.into(),
            schema_location_indexed: false,
        }
    }
}

/// A catalog over a parsed XML document.
#[derive(Debug)]
pub struct XmlCatalog {
    config: XmlCatalogConfig,
    index: RecordIndex,
}

impl XmlCatalog {
    /// Loads and indexes the configured document.
    pub fn open(config: XmlCatalogConfig) -> CatalogResult<Self> {
        let xml = std::fs::read_to_string(&config.source_file).map_err(|source| CatalogError::Io {
            backend_name: "xml".to_string(),
            source,
        })?;
        Self::from_document(&xml, config)
    }

    /// Indexes an in-memory document.
    pub fn from_document(xml: &str, config: XmlCatalogConfig) -> CatalogResult<Self> {
        let location = config.source_file.display().to_string();
        let mut index = RecordIndex::new().case_insensitive();
        for record in parse_records(xml, &location)? {
            let identifier = record.identifier().to_string();
            let duplicate = if config.schema_location_indexed {
                index
                    .variants(&identifier)
                    .any(|v| schema_of(v) == schema_of(&record))
            } else {
                index.get(&identifier).is_some()
            };
            index.push(record);
            if duplicate {
                warn!(identifier = %identifier, source = %location, "Duplicate identifier in XML catalog; lookups use the first");
            }
        }
        info!(records = index.len(), source = %location, "Loaded XML catalog");
        Ok(Self { config, index })
    }

    /// The source document path.
    pub fn source_file(&self) -> &Path {
        &self.config.source_file
    }

    fn scan(
        &self,
        query: &HarvestQuery,
        start: usize,
        filter: &FormatFilter<'_>,
        page_size: usize,
        count_total: bool,
    ) -> CatalogPage {
        if self.config.schema_location_indexed {
            self.index.scan(query, start, page_size, count_total, |record| {
                record.is_deleted() || schema_of(record) == Some(filter.schema())
            })
        } else {
            self.index
                .scan(query, start, page_size, count_total, |record| filter.accepts(record))
        }
    }
}

fn schema_of(record: &NativeRecord) -> Option<&str> {
    match &record.payload {
        Payload::Xml(xml) => xml.schema_location.as_deref(),
        _ => None,
    }
}

impl Catalog for XmlCatalog {
    fn name(&self) -> &str {
        "xml"
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
                "xml",
                "live cursors are not issued by this catalog",
            )),
        }
    }

    fn get_by_identifier(&self, identifier: &str) -> CatalogResult<Option<NativeRecord>> {
        Ok(self.index.get(identifier).cloned())
    }

    fn get_variants(&self, identifier: &str) -> CatalogResult<Vec<NativeRecord>> {
        if self.config.schema_location_indexed {
            Ok(self.index.variants(identifier).cloned().collect())
        } else {
            Ok(self.index.get(identifier).cloned().into_iter().collect())
        }
    }

    fn list_sets(&self) -> CatalogResult<Option<Vec<SetSpec>>> {
        let sets = self.index.set_specs();
        Ok((!sets.is_empty()).then_some(sets))
    }

    fn earliest_datestamp(&self) -> CatalogResult<Option<String>> {
        Ok(self.index.earliest_datestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Granularity;

    fn document() -> String {
        let mut xml = String::from("<records>");
        for (id, schema, set) in [
            ("A-1", "dc.xsd", "books"),
            ("A-2", "marc.xsd", "books"),
            ("A-3", "dc.xsd", "maps"),
        ] {
            xml.push_str(&format!(
                r#"<record><header><identifier>{id}</identifier><datestamp>2021-06-01</datestamp><setSpec>{set}</setSpec></header>
                <metadata><dc xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="ns {schema}"/></metadata></record>"#
            ));
        }
        xml.push_str("</records>");
        xml
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = XmlCatalog::from_document(&document(), XmlCatalogConfig::new("mem.xml")).unwrap();
        assert!(catalog.get_by_identifier("a-2").unwrap().is_some());
        assert!(catalog.get_by_identifier("B-1").unwrap().is_none());
    }

    #[test]
    fn test_schema_indexed_filtering() {
        let mut config = XmlCatalogConfig::new("mem.xml");
        config.schema_location_indexed = true;
        let catalog = XmlCatalog::from_document(&document(), config).unwrap();
        let query = HarvestQuery::unbounded(Granularity::Day, "marc21");
        let filter = FormatFilter::new("marc21", "marc.xsd", |_| true);

        let page = catalog.query_range(&query, &filter, 10).unwrap();
        let ids: Vec<_> = page.items.iter().map(|r| r.identifier()).collect();
        assert_eq!(ids, vec!["A-2"]);
        assert_eq!(page.total, Some(1));
    }

    #[test]
    fn test_schema_indexed_variants() {
        let xml = document().replace("<identifier>A-2</identifier>", "<identifier>a-1</identifier>");
        let mut config = XmlCatalogConfig::new("mem.xml");
        config.schema_location_indexed = true;
        let catalog = XmlCatalog::from_document(&xml, config).unwrap();

        let variants = catalog.get_variants("A-1").unwrap();
        let schemas: Vec<_> = variants.iter().filter_map(schema_of).collect();
        assert_eq!(schemas, vec!["dc.xsd", "marc.xsd"]);
        assert!(catalog.get_variants("A-2").unwrap().is_empty());

        let plain = XmlCatalog::from_document(&xml, XmlCatalogConfig::new("mem.xml")).unwrap();
        assert_eq!(plain.get_variants("A-1").unwrap().len(), 1);
    }

    #[test]
    fn test_sets_from_headers() {
        let catalog = XmlCatalog::from_document(&document(), XmlCatalogConfig::new("mem.xml")).unwrap();
        let sets = catalog.list_sets().unwrap().unwrap();
        let specs: Vec<_> = sets.iter().map(|s| s.spec.as_str()).collect();
        assert_eq!(specs, vec!["books", "maps"]);
    }
}
