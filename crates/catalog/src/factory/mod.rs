//! Record factory: headers, format feasibility and rendering.
//!
//! The factory is the only place that maps local identifiers to public
//! `oai:` identifiers and the only caller of crosswalks. Deleted records
//! never reach a crosswalk.

pub mod crosswalk;

pub use crosswalk::{Crosswalk, Crosswalks, PassThroughCrosswalk};

use crate::core::FormatFilter;
use crate::error::{OaiError, OaiResult};
use crate::types::{Granularity, MetadataFormat, NativeRecord, Payload, Record, RecordHeader};

/// Builds harvester-facing headers and records from native records.
#[derive(Debug)]
pub struct RecordFactory {
    repository_identifier: Option<String>,
    granularity: Granularity,
    crosswalks: Crosswalks,
}

impl RecordFactory {
    /// Creates a factory over a crosswalk registry.
    pub fn new(crosswalks: Crosswalks, granularity: Granularity) -> Self {
        Self {
            repository_identifier: None,
            granularity,
            crosswalks,
        }
    }

    /// Publishes identifiers as `oai:{repository_identifier}:{local}`.
    pub fn with_repository_identifier(mut self, repository_identifier: impl Into<String>) -> Self {
        self.repository_identifier = Some(repository_identifier.into());
        self
    }

    /// The crosswalk registry.
    pub fn crosswalks(&self) -> &Crosswalks {
        &self.crosswalks
    }

    /// Maps a local identifier to its public form.
    pub fn to_oai_identifier(&self, local: &str) -> String {
        match &self.repository_identifier {
            Some(repo) => format!("oai:{repo}:{local}"),
            None => local.to_string(),
        }
    }

    /// Maps a public identifier back to a local one.
    ///
    /// Returns `None` if the identifier does not belong to this repository.
    pub fn to_local_identifier<'a>(&self, oai_identifier: &'a str) -> Option<&'a str> {
        match &self.repository_identifier {
            Some(repo) => oai_identifier
                .strip_prefix("oai:")
                .and_then(|rest| rest.strip_prefix(repo.as_str()))
                .and_then(|rest| rest.strip_prefix(':'))
                .filter(|local| !local.is_empty()),
            None => Some(oai_identifier),
        }
    }

    /// Builds the public header of a native record.
    pub fn header(&self, record: &NativeRecord) -> RecordHeader {
        let header = &record.header;
        RecordHeader {
            identifier: self.to_oai_identifier(&header.identifier),
            datestamp: self
                .granularity
                .normalize_datestamp(&header.datestamp)
                .into_owned(),
            set_specs: header.set_specs.clone(),
            deleted: header.deleted,
        }
    }

    /// Returns true if `record` can be disseminated as `metadata_prefix`.
    pub fn supports_format(&self, record: &NativeRecord, metadata_prefix: &str) -> bool {
        self.crosswalks
            .get(metadata_prefix)
            .is_some_and(|c| c.is_available_for(record))
    }

    /// Returns the formats the variants of one item can be disseminated in,
    /// in registry order.
    ///
    /// Deleted variants contribute none.
    pub fn formats_for(&self, identifier: &str, variants: &[NativeRecord]) -> OaiResult<Vec<MetadataFormat>> {
        let formats: Vec<MetadataFormat> = self
            .crosswalks
            .iter()
            .filter(|c| {
                variants
                    .iter()
                    .any(|record| !record.is_deleted() && c.is_available_for(record))
            })
            .map(|c| c.format().clone())
            .collect();
        if formats.is_empty() {
            return Err(OaiError::NoMetadataFormats {
                identifier: self.to_oai_identifier(identifier),
            });
        }
        Ok(formats)
    }

    /// Picks the variant to disseminate as `metadata_prefix`: a live variant
    /// that supports the format, else a deleted one, else the first.
    pub fn select_variant<'r>(
        &self,
        variants: &'r [NativeRecord],
        metadata_prefix: &str,
    ) -> Option<&'r NativeRecord> {
        variants
            .iter()
            .find(|r| !r.is_deleted() && self.supports_format(r, metadata_prefix))
            .or_else(|| variants.iter().find(|r| r.is_deleted()))
            .or_else(|| variants.first())
    }

    /// Builds the catalog-side format filter for a listing.
    pub fn format_filter<'a>(&'a self, metadata_prefix: &'a str) -> OaiResult<FormatFilter<'a>> {
        let crosswalk = self.crosswalks.get(metadata_prefix).ok_or_else(|| {
            OaiError::CannotDisseminateFormat {
                metadata_prefix: metadata_prefix.to_string(),
            }
        })?;
        Ok(FormatFilter::new(
            metadata_prefix,
            &crosswalk.format().schema,
            move |record| crosswalk.is_available_for(record),
        ))
    }

    /// Renders a record in the requested format.
    ///
    /// Deleted records yield their header only.
    pub fn render(&self, record: &NativeRecord, metadata_prefix: &str) -> OaiResult<Record> {
        let header = self.header(record);
        if record.is_deleted() {
            return Ok(Record {
                header,
                metadata: None,
                about: Vec::new(),
            });
        }

        let crosswalk = self
            .crosswalks
            .get(metadata_prefix)
            .filter(|c| c.is_available_for(record))
            .ok_or_else(|| OaiError::CannotDisseminateFormat {
                metadata_prefix: metadata_prefix.to_string(),
            })?;
        let metadata = crosswalk.create_metadata(record)?;
        let about = match &record.payload {
            Payload::Xml(xml) => xml.about.clone(),
            _ => Vec::new(),
        };

        Ok(Record {
            header,
            metadata: Some(metadata),
            about,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogResult;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct CountingCrosswalk {
        format: MetadataFormat,
        calls: Arc<AtomicUsize>,
    }

    impl Crosswalk for CountingCrosswalk {
        fn format(&self) -> &MetadataFormat {
            &self.format
        }

        fn is_available_for(&self, _record: &NativeRecord) -> bool {
            true
        }

        fn create_metadata(&self, record: &NativeRecord) -> CatalogResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("<dc>{}</dc>", record.identifier()))
        }
    }

    fn factory(calls: Arc<AtomicUsize>) -> RecordFactory {
        let crosswalks = Crosswalks::new().with(CountingCrosswalk {
            format: MetadataFormat::oai_dc(),
            calls,
        });
        RecordFactory::new(crosswalks, Granularity::Day).with_repository_identifier("example.org")
    }

    fn record(id: &str, deleted: bool) -> NativeRecord {
        NativeRecord::new(
            RecordHeader::new(id, "2021-06-01T08:30:00Z")
                .with_set("math")
                .with_deleted(deleted),
            Payload::Row(BTreeMap::new()),
        )
    }

    #[test]
    fn test_identifier_mapping() {
        let factory = factory(Arc::default());
        assert_eq!(factory.to_oai_identifier("rec-1"), "oai:example.org:rec-1");
        assert_eq!(
            factory.to_local_identifier("oai:example.org:rec-1"),
            Some("rec-1")
        );
        assert_eq!(factory.to_local_identifier("oai:other.org:rec-1"), None);
        assert_eq!(factory.to_local_identifier("rec-1"), None);
        assert_eq!(factory.to_local_identifier("oai:example.org:"), None);
    }

    #[test]
    fn test_header_is_normalized() {
        let factory = factory(Arc::default());
        let header = factory.header(&record("rec-1", false));
        assert_eq!(header.identifier, "oai:example.org:rec-1");
        assert_eq!(header.datestamp, "2021-06-01");
        assert_eq!(header.set_specs, vec!["math".to_string()]);
    }

    #[test]
    fn test_render_live_record() {
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = factory(calls.clone());
        let rendered = factory.render(&record("rec-1", false), "oai_dc").unwrap();
        assert_eq!(rendered.metadata.as_deref(), Some("<dc>rec-1</dc>"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deleted_record_is_never_rendered() {
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = factory(calls.clone());
        let rendered = factory.render(&record("gone", true), "oai_dc").unwrap();
        assert!(rendered.header.deleted);
        assert!(rendered.metadata.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_prefix_cannot_disseminate() {
        let factory = factory(Arc::default());
        let err = factory.render(&record("rec-1", false), "marc21").unwrap_err();
        assert_eq!(err.code(), "cannotDisseminateFormat");
        assert!(factory.format_filter("marc21").is_err());
    }

    #[test]
    fn test_deleted_record_has_no_formats() {
        let factory = factory(Arc::default());
        let live = [record("rec-1", false)];
        assert_eq!(factory.formats_for("rec-1", &live).unwrap().len(), 1);
        let err = factory.formats_for("gone", &[record("gone", true)]).unwrap_err();
        assert_eq!(err.code(), "noMetadataFormats");
        assert!(matches!(err, OaiError::NoMetadataFormats { ref identifier } if identifier == "oai:example.org:gone"));
    }

    fn xml_variant(id: &str, schema: &str) -> NativeRecord {
        NativeRecord::new(
            RecordHeader::new(id, "2021-06-01"),
            Payload::Xml(crate::types::XmlPayload {
                metadata: Some(format!("<m schema=\"{schema}\"/>")),
                schema_location: Some(schema.to_string()),
                ..Default::default()
            }),
        )
    }

    fn two_format_factory() -> RecordFactory {
        let dc = MetadataFormat {
            schema: "dc.xsd".to_string(),
            ..MetadataFormat::oai_dc()
        };
        let marc = MetadataFormat {
            metadata_prefix: "marc21".to_string(),
            schema: "marc.xsd".to_string(),
            metadata_namespace: "http://www.loc.gov/MARC21/slim".to_string(),
        };
        let crosswalks = Crosswalks::new()
            .with(PassThroughCrosswalk::new(dc))
            .with(PassThroughCrosswalk::new(marc));
        RecordFactory::new(crosswalks, Granularity::Day)
    }

    #[test]
    fn test_formats_gathered_across_variants() {
        let factory = two_format_factory();
        let variants = [xml_variant("item", "marc.xsd"), xml_variant("item", "dc.xsd")];
        let prefixes: Vec<_> = factory
            .formats_for("item", &variants)
            .unwrap()
            .into_iter()
            .map(|f| f.metadata_prefix)
            .collect();
        assert_eq!(prefixes, vec!["oai_dc", "marc21"]);
    }

    #[test]
    fn test_select_variant_by_format() {
        let factory = two_format_factory();
        let variants = [xml_variant("item", "dc.xsd"), xml_variant("item", "marc.xsd")];
        let chosen = factory.select_variant(&variants, "marc21").unwrap();
        let rendered = factory.render(chosen, "marc21").unwrap();
        assert_eq!(rendered.metadata.as_deref(), Some("<m schema=\"marc.xsd\"/>"));
        assert!(factory.select_variant(&[], "marc21").is_none());
    }
}
