//! Record fixtures shared by all backends.

use std::fmt::Write as _;
use std::path::Path;

/// A record to load into a test catalog.
#[derive(Debug, Clone)]
pub struct RecordFixture {
    /// Local identifier.
    pub id: String,
    /// Stored datestamp.
    pub datestamp: String,
    /// Set memberships.
    pub sets: Vec<String>,
    /// Deletion flag.
    pub deleted: bool,
}

impl RecordFixture {
    /// Creates a live record.
    pub fn new(id: impl Into<String>, datestamp: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            datestamp: datestamp.into(),
            sets: vec![],
            deleted: false,
        }
    }

    /// Adds a set membership.
    pub fn in_set(mut self, set: impl Into<String>) -> Self {
        self.sets.push(set.into());
        self
    }

    /// Marks the record deleted.
    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// The stored metadata of a live record.
    pub fn metadata(&self) -> Option<String> {
        (!self.deleted).then(|| format!("<dc><title>{}</title></dc>", self.id))
    }

    /// The record as an OAI `<record>` element.
    pub fn to_xml(&self) -> String {
        let status = if self.deleted { r#" status="deleted""# } else { "" };
        let mut xml = format!(
            "<record><header{status}><identifier>{}</identifier><datestamp>{}</datestamp>",
            self.id, self.datestamp
        );
        for set in &self.sets {
            let _ = write!(xml, "<setSpec>{set}</setSpec>");
        }
        xml.push_str("</header>");
        if let Some(metadata) = self.metadata() {
            let _ = write!(xml, "<metadata>{metadata}</metadata>");
        }
        xml.push_str("</record>");
        xml
    }
}

/// `rec-00`, `rec-01`, ... all stamped `2021-06-01`.
pub fn scenario_records(count: usize) -> Vec<RecordFixture> {
    (0..count)
        .map(|i| RecordFixture::new(format!("rec-{i:02}"), "2021-06-01"))
        .collect()
}

/// A mixed catalog: dates spread over June 2021, two sets, some deletions.
pub fn mixed_records(count: usize) -> Vec<RecordFixture> {
    (0..count)
        .map(|i| {
            let mut record =
                RecordFixture::new(format!("rec-{i:02}"), format!("2021-06-{:02}", i % 28 + 1));
            record = record.in_set(if i % 2 == 0 { "even" } else { "odd" });
            if i % 3 == 0 {
                record = record.in_set("three");
            }
            if i % 7 == 6 {
                record = record.deleted();
            }
            record
        })
        .collect()
}

/// All fixtures as one XML document.
pub fn xml_document(records: &[RecordFixture]) -> String {
    let mut xml = String::from("<records>");
    for record in records {
        xml.push_str(&record.to_xml());
    }
    xml.push_str("</records>");
    xml
}

/// Writes one `<record>` file per fixture, named after its identifier.
pub fn write_record_files(dir: &Path, records: &[RecordFixture]) {
    for record in records {
        std::fs::write(dir.join(format!("{}.xml", record.id)), record.to_xml())
            .expect("Failed to write record file");
    }
}

/// Inserts fixtures into a SQLite catalog.
#[cfg(feature = "sqlite")]
pub fn seed_sqlite(
    catalog: &oaiserve_catalog::backends::sqlite::SqliteCatalog,
    records: &[RecordFixture],
) {
    let conn = catalog.connection().expect("Failed to get connection");
    for record in records {
        conn.execute(
            "INSERT INTO records (local_id, datestamp, deleted, metadata) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![record.id, record.datestamp, record.deleted, record.metadata()],
        )
        .expect("Failed to insert record");
        for set in &record.sets {
            conn.execute(
                "INSERT INTO record_sets (local_id, set_spec) VALUES (?1, ?2)",
                rusqlite::params![record.id, set],
            )
            .expect("Failed to insert set membership");
        }
    }
}
