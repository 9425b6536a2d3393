//! In-memory record index shared by the file-based backends.
//!
//! Entries keep the order they were added in. A set index maps each set to
//! the ascending positions of its members, so set-filtered scans only visit
//! members. Positions are global, which lets a replayed cursor resume a
//! set-filtered listing at the same place as an unfiltered one would.

use std::collections::{BTreeMap, HashMap};

use crate::core::{CatalogPage, ResumeCursor};
use crate::types::{HarvestQuery, NativeRecord, SetSpec};

/// An ordered, immutable record index.
#[derive(Debug, Default)]
pub struct RecordIndex {
    entries: Vec<NativeRecord>,
    by_identifier: HashMap<String, Vec<usize>>,
    sets: BTreeMap<String, Vec<usize>>,
    case_insensitive: bool,
}

impl RecordIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes identifier lookup ignore ASCII case.
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Appends a record. A duplicate identifier keeps the first occurrence
    /// for [`get`](Self::get) and returns false.
    pub fn push(&mut self, record: NativeRecord) -> bool {
        let position = self.entries.len();
        for set in &record.header.set_specs {
            let members = self.sets.entry(set.clone()).or_default();
            if members.last() != Some(&position) {
                members.push(position);
            }
        }
        let key = self.key(record.identifier());
        let positions = self.by_identifier.entry(key).or_default();
        let fresh = positions.is_empty();
        positions.push(position);
        self.entries.push(record);
        fresh
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a record by identifier.
    pub fn get(&self, identifier: &str) -> Option<&NativeRecord> {
        self.variants(identifier).next()
    }

    /// Every record stored under an identifier, in insertion order.
    pub fn variants<'a>(&'a self, identifier: &str) -> impl Iterator<Item = &'a NativeRecord> + 'a {
        self.by_identifier
            .get(&self.key(identifier))
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|&position| &self.entries[position])
    }

    /// The distinct sets records belong to, in spec order.
    pub fn set_specs(&self) -> Vec<SetSpec> {
        self.sets.keys().map(SetSpec::new).collect()
    }

    /// The smallest datestamp in the index.
    pub fn earliest_datestamp(&self) -> Option<String> {
        self.entries
            .iter()
            .map(|r| r.header.datestamp.as_str())
            .min()
            .map(str::to_string)
    }

    /// Scans from `start`, returning up to `page_size` accepted records.
    ///
    /// One accepted record beyond the page is probed to decide whether a
    /// cursor is returned; its position becomes the cursor position. When
    /// `count_total` is set the whole remainder is scanned to report an
    /// exact total.
    pub fn scan(
        &self,
        query: &HarvestQuery,
        start: usize,
        page_size: usize,
        count_total: bool,
        accept: impl Fn(&NativeRecord) -> bool,
    ) -> CatalogPage {
        let mut items = Vec::with_capacity(page_size.min(self.entries.len()));
        let mut next = None;
        let mut matched = 0usize;

        for position in self.candidates(query, start) {
            let record = &self.entries[position];
            if !query.contains(&record.header.datestamp) || !accept(record) {
                continue;
            }
            matched += 1;
            if items.len() < page_size {
                items.push(record.clone());
            } else if next.is_none() {
                next = Some(position);
                if !count_total {
                    break;
                }
            }
        }

        CatalogPage {
            items,
            resume: next.map(|position| ResumeCursor::Replay {
                query: query.clone(),
                position,
            }),
            total: count_total.then_some(matched),
        }
    }

    fn candidates<'a>(
        &'a self,
        query: &HarvestQuery,
        start: usize,
    ) -> Box<dyn Iterator<Item = usize> + 'a> {
        match &query.set {
            Some(set) => {
                let members = self.sets.get(set).map(Vec::as_slice).unwrap_or(&[]);
                let from = members.partition_point(|&p| p < start);
                Box::new(members[from..].iter().copied())
            }
            None => Box::new(start.min(self.entries.len())..self.entries.len()),
        }
    }

    fn key(&self, identifier: &str) -> String {
        if self.case_insensitive {
            identifier.to_ascii_lowercase()
        } else {
            identifier.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Granularity, Payload, RecordHeader, XmlPayload};

    fn index(n: usize) -> RecordIndex {
        let mut index = RecordIndex::new();
        for i in 0..n {
            let mut header = RecordHeader::new(format!("rec-{i:02}"), format!("2021-06-{:02}", i % 28 + 1));
            if i % 3 == 0 {
                header = header.with_set("three");
            }
            index.push(NativeRecord::new(header, Payload::Xml(XmlPayload::default())));
        }
        index
    }

    fn ids(page: &CatalogPage) -> Vec<&str> {
        page.items.iter().map(|r| r.identifier()).collect()
    }

    #[test]
    fn test_scan_pages_with_probe() {
        let index = index(12);
        let query = HarvestQuery::unbounded(Granularity::Day, "oai_dc");
        let page = index.scan(&query, 0, 5, true, |_| true);
        assert_eq!(ids(&page), vec!["rec-00", "rec-01", "rec-02", "rec-03", "rec-04"]);
        assert_eq!(page.total, Some(12));
        assert_eq!(page.resume.as_ref().unwrap().position(), 5);

        let page = index.scan(&query, 10, 5, false, |_| true);
        assert_eq!(ids(&page), vec!["rec-10", "rec-11"]);
        assert!(page.resume.is_none());
        assert_eq!(page.total, None);
    }

    #[test]
    fn test_scan_exact_fit_has_no_cursor() {
        let index = index(10);
        let query = HarvestQuery::unbounded(Granularity::Day, "oai_dc");
        let page = index.scan(&query, 0, 10, true, |_| true);
        assert_eq!(page.items.len(), 10);
        assert!(page.resume.is_none());
    }

    #[test]
    fn test_scan_by_set_uses_global_positions() {
        let index = index(12);
        let query = HarvestQuery::unbounded(Granularity::Day, "oai_dc").with_set("three");
        let page = index.scan(&query, 0, 2, true, |_| true);
        assert_eq!(ids(&page), vec!["rec-00", "rec-03"]);
        assert_eq!(page.total, Some(4));
        let position = page.resume.unwrap().position();
        assert_eq!(position, 6);

        let page = index.scan(&query, position, 2, false, |_| true);
        assert_eq!(ids(&page), vec!["rec-06", "rec-09"]);
        assert!(page.resume.is_none());
    }

    #[test]
    fn test_scan_applies_date_and_format_filters() {
        let index = index(12);
        let query = HarvestQuery::unbounded(Granularity::Day, "oai_dc")
            .with_range("2021-06-03", "2021-06-06");
        let page = index.scan(&query, 0, 10, true, |r| r.identifier() != "rec-04");
        assert_eq!(ids(&page), vec!["rec-02", "rec-03", "rec-05"]);
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let mut index = RecordIndex::new().case_insensitive();
        assert!(index.push(NativeRecord::new(
            RecordHeader::new("Rec-A", "2021-06-01"),
            Payload::Xml(XmlPayload::default()),
        )));
        assert!(index.get("rec-a").is_some());
        assert!(!index.push(NativeRecord::new(
            RecordHeader::new("REC-A", "2021-06-02"),
            Payload::Xml(XmlPayload::default()),
        )));
        assert_eq!(index.get("REC-a").unwrap().header.datestamp, "2021-06-01");

        let dates: Vec<_> = index
            .variants("rec-A")
            .map(|r| r.header.datestamp.as_str())
            .collect();
        assert_eq!(dates, vec!["2021-06-01", "2021-06-02"]);
        assert_eq!(index.variants("rec-b").count(), 0);
    }
}
