//! Native records and their headers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Header metadata shared by every record, regardless of backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    /// Stable, unique identifier.
    pub identifier: String,

    /// ISO-8601 date or date-time.
    pub datestamp: String,

    /// Set memberships, in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_specs: Vec<String>,

    /// Whether the record has been withdrawn.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

impl RecordHeader {
    /// Creates a live header with no set memberships.
    pub fn new(identifier: impl Into<String>, datestamp: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            datestamp: datestamp.into(),
            set_specs: Vec::new(),
            deleted: false,
        }
    }

    /// Adds a set membership.
    pub fn with_set(mut self, set_spec: impl Into<String>) -> Self {
        self.set_specs.push(set_spec.into());
        self
    }

    /// Marks the header as deleted.
    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    /// Returns true if the record belongs to the given set.
    pub fn in_set(&self, set_spec: &str) -> bool {
        self.set_specs.iter().any(|s| s == set_spec)
    }
}

/// A record parsed from an XML source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlPayload {
    /// Raw inner XML of the `<metadata>` element.
    pub metadata: Option<String>,
    /// Schema URL declared on the metadata root element.
    pub schema_location: Option<String>,
    /// Raw inner XML of each `<about>` element.
    pub about: Vec<String>,
}

/// Backend-specific record content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A file on disk; read when the record is rendered.
    File(PathBuf),
    /// Columns of a SQL row, keyed by column name.
    Row(BTreeMap<String, Option<String>>),
    /// A parsed XML record.
    Xml(XmlPayload),
}

/// A record as the catalog stores it, before any formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeRecord {
    /// Header metadata.
    pub header: RecordHeader,
    /// Opaque content.
    pub payload: Payload,
}

impl NativeRecord {
    /// Creates a native record.
    pub fn new(header: RecordHeader, payload: Payload) -> Self {
        Self { header, payload }
    }

    /// Returns the local identifier.
    pub fn identifier(&self) -> &str {
        &self.header.identifier
    }

    /// Returns true if the record is deleted.
    pub fn is_deleted(&self) -> bool {
        self.header.deleted
    }
}

/// A set in the repository's set hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSpec {
    /// Colon-separated set path.
    pub spec: String,
    /// Human-readable name.
    pub name: String,
    /// Optional description fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SetSpec {
    /// Creates a set whose name equals its spec.
    pub fn new(spec: impl Into<String>) -> Self {
        let spec = spec.into();
        Self {
            name: spec.clone(),
            spec,
            description: None,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// A metadata format the repository can disseminate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFormat {
    /// The `metadataPrefix` harvesters request it by.
    pub metadata_prefix: String,
    /// XML schema URL.
    pub schema: String,
    /// XML namespace.
    pub metadata_namespace: String,
}

impl MetadataFormat {
    /// The Dublin Core format every repository is expected to support.
    pub fn oai_dc() -> Self {
        Self {
            metadata_prefix: "oai_dc".to_string(),
            schema: "http://www.openarchives.org/OAI/2.0/oai_dc.xsd".to_string(),
            metadata_namespace: "http://www.openarchives.org/OAI/2.0/oai_dc/".to_string(),
        }
    }
}

/// A record rendered for a harvester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Header with the public identifier.
    pub header: RecordHeader,
    /// Formatted metadata; absent for deleted records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    /// About fragments carried through from the source.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub about: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_builder() {
        let header = RecordHeader::new("rec-1", "2021-06-01")
            .with_set("math")
            .with_set("math:algebra");
        assert!(header.in_set("math"));
        assert!(header.in_set("math:algebra"));
        assert!(!header.in_set("physics"));
        assert!(!header.deleted);
    }

    #[test]
    fn test_header_serialization_skips_defaults() {
        let header = RecordHeader::new("rec-1", "2021-06-01");
        let json = serde_json::to_value(&header).unwrap();
        assert!(json.get("set_specs").is_none());
        assert!(json.get("deleted").is_none());

        let json = serde_json::to_value(header.with_deleted(true)).unwrap();
        assert_eq!(json["deleted"], true);
    }

    #[test]
    fn test_set_spec_defaults_name() {
        let set = SetSpec::new("math");
        assert_eq!(set.name, "math");
        assert_eq!(set.with_name("Mathematics").name, "Mathematics");
    }
}
