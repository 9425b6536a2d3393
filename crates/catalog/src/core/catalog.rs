//! The catalog contract every backend implements.
//!
//! A catalog owns a record store and answers filtered, ordered, paginated
//! queries over it. Pagination state crosses requests as a [`ResumeCursor`],
//! which is either a replayable position or a live server-side handle.

use std::fmt::{self, Debug};

use crate::error::CatalogResult;
use crate::types::{HarvestQuery, NativeRecord, SetSpec};

/// Decides whether a record can be disseminated in the requested format.
///
/// Deleted records always pass: they are listed as headers regardless of
/// which formats their content could have produced.
pub struct FormatFilter<'a> {
    metadata_prefix: &'a str,
    schema: &'a str,
    check: Box<dyn Fn(&NativeRecord) -> bool + 'a>,
}

impl<'a> FormatFilter<'a> {
    /// Creates a filter from a per-item feasibility check.
    pub fn new(
        metadata_prefix: &'a str,
        schema: &'a str,
        check: impl Fn(&NativeRecord) -> bool + 'a,
    ) -> Self {
        Self {
            metadata_prefix,
            schema,
            check: Box::new(check),
        }
    }

    /// A filter that accepts every record.
    pub fn accept_all(metadata_prefix: &'a str) -> Self {
        Self::new(metadata_prefix, "", |_| true)
    }

    /// The requested metadata prefix.
    pub fn metadata_prefix(&self) -> &str {
        self.metadata_prefix
    }

    /// The schema URL of the requested format.
    pub fn schema(&self) -> &str {
        self.schema
    }

    /// Returns true if the record passes.
    pub fn accepts(&self, record: &NativeRecord) -> bool {
        record.is_deleted() || (self.check)(record)
    }
}

impl Debug for FormatFilter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatFilter")
            .field("metadata_prefix", &self.metadata_prefix)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// A server-side cursor that cannot be rebuilt from token parameters.
///
/// Owned by exactly one token table entry; resolving the token moves it out.
pub trait LiveCursor: Send + Debug {
    /// Takes the next `page_size` records at most.
    fn next_page(&mut self, page_size: usize) -> CatalogResult<Vec<NativeRecord>>;

    /// Returns true if records remain after the last page taken.
    fn has_more(&self) -> bool;

    /// Number of records consumed so far.
    fn position(&self) -> usize;
}

/// Where a paginated listing continues from.
#[derive(Debug)]
pub enum ResumeCursor {
    /// Re-run `query` and continue at `position` in the catalog's natural order.
    Replay {
        /// The original query.
        query: HarvestQuery,
        /// Index of the next candidate entry to examine.
        position: usize,
    },
    /// A held cursor; valid for this process only and only once.
    Live {
        /// The original query, kept for token encoding.
        query: HarvestQuery,
        /// The handle.
        cursor: Box<dyn LiveCursor>,
    },
}

impl ResumeCursor {
    /// The query this cursor continues.
    pub fn query(&self) -> &HarvestQuery {
        match self {
            ResumeCursor::Replay { query, .. } | ResumeCursor::Live { query, .. } => query,
        }
    }

    /// The position encoded into tokens.
    pub fn position(&self) -> usize {
        match self {
            ResumeCursor::Replay { position, .. } => *position,
            ResumeCursor::Live { cursor, .. } => cursor.position(),
        }
    }

    /// Returns true if this cursor can be rebuilt from its query and position.
    pub fn is_replayable(&self) -> bool {
        matches!(self, ResumeCursor::Replay { .. })
    }
}

/// One page of catalog results.
#[derive(Debug)]
pub struct CatalogPage {
    /// Records on this page, at most the requested page size.
    pub items: Vec<NativeRecord>,

    /// Continuation when more records remain.
    pub resume: Option<ResumeCursor>,

    /// Exact size of the complete filtered list, when the backend knows it.
    pub total: Option<usize>,
}

impl CatalogPage {
    /// Returns true if more records remain.
    pub fn more_available(&self) -> bool {
        self.resume.is_some()
    }
}

/// A record store that answers OAI-PMH queries.
///
/// Enumeration order must be stable across calls so that a replayed
/// position lands on the same records. Implementations look one entry past
/// the page to decide whether more are available.
pub trait Catalog: Send + Sync + Debug {
    /// A short backend name for logs.
    fn name(&self) -> &str;

    /// Returns true if [`ResumeCursor::Replay`] cursors can be rebuilt from tokens.
    fn supports_replay(&self) -> bool;

    /// Starts a filtered listing.
    fn query_range(
        &self,
        query: &HarvestQuery,
        filter: &FormatFilter<'_>,
        page_size: usize,
    ) -> CatalogResult<CatalogPage>;

    /// Continues a listing from a cursor returned by an earlier page.
    fn query_resume(
        &self,
        cursor: ResumeCursor,
        filter: &FormatFilter<'_>,
        page_size: usize,
    ) -> CatalogResult<CatalogPage>;

    /// Looks up a record by its local identifier.
    fn get_by_identifier(&self, identifier: &str) -> CatalogResult<Option<NativeRecord>>;

    /// Looks up every stored variant of a record.
    ///
    /// Catalogs that keep one entry per format under a shared identifier
    /// return all of them; others return the single record.
    fn get_variants(&self, identifier: &str) -> CatalogResult<Vec<NativeRecord>> {
        Ok(self.get_by_identifier(identifier)?.into_iter().collect())
    }

    /// Returns the set hierarchy, or `None` if the catalog has none.
    fn list_sets(&self) -> CatalogResult<Option<Vec<SetSpec>>>;

    /// Returns the smallest datestamp in the catalog.
    fn earliest_datestamp(&self) -> CatalogResult<Option<String>>;
}

/// Continues a live cursor; shared by backends that issue live handles.
pub(crate) fn resume_live(
    query: HarvestQuery,
    mut cursor: Box<dyn LiveCursor>,
    page_size: usize,
) -> CatalogResult<CatalogPage> {
    let items = cursor.next_page(page_size)?;
    let resume = cursor
        .has_more()
        .then(|| ResumeCursor::Live { query, cursor });
    Ok(CatalogPage {
        items,
        resume,
        total: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Granularity, Payload, RecordHeader};

    fn record(id: &str, deleted: bool) -> NativeRecord {
        NativeRecord::new(
            RecordHeader::new(id, "2021-06-01").with_deleted(deleted),
            Payload::Row(Default::default()),
        )
    }

    #[test]
    fn test_format_filter_passes_deleted() {
        let filter = FormatFilter::new("marc21", "marc.xsd", |_| false);
        assert!(!filter.accepts(&record("a", false)));
        assert!(filter.accepts(&record("b", true)));
        assert_eq!(filter.metadata_prefix(), "marc21");
    }

    #[test]
    fn test_replay_cursor_accessors() {
        let query = HarvestQuery::unbounded(Granularity::Day, "oai_dc");
        let cursor = ResumeCursor::Replay {
            query: query.clone(),
            position: 11,
        };
        assert!(cursor.is_replayable());
        assert_eq!(cursor.position(), 11);
        assert_eq!(cursor.query(), &query);
    }
}
