//! Snapshot cursors held across requests.

use std::collections::VecDeque;

use crate::core::LiveCursor;
use crate::error::CatalogResult;
use crate::types::NativeRecord;

/// The remainder of a result set materialized when the listing started.
///
/// Later pages come from the snapshot, never from the database, so they are
/// unaffected by writes made after the first page. The snapshot lives only
/// in the token table and cannot be rebuilt once the token is consumed.
#[derive(Debug)]
pub struct SnapshotCursor {
    rows: VecDeque<NativeRecord>,
    consumed: usize,
}

impl SnapshotCursor {
    /// Wraps rows not yet returned; `consumed` counts those already returned.
    pub fn new(rows: impl Into<VecDeque<NativeRecord>>, consumed: usize) -> Self {
        Self {
            rows: rows.into(),
            consumed,
        }
    }
}

impl LiveCursor for SnapshotCursor {
    fn next_page(&mut self, page_size: usize) -> CatalogResult<Vec<NativeRecord>> {
        let take = page_size.min(self.rows.len());
        self.consumed += take;
        Ok(self.rows.drain(..take).collect())
    }

    fn has_more(&self) -> bool {
        !self.rows.is_empty()
    }

    fn position(&self) -> usize {
        self.consumed
    }
}
