//! Harvest query parameters.

use serde::{Deserialize, Serialize};

use super::granularity::Granularity;

/// The selective-harvesting arguments of a list request.
///
/// `from` and `until` are always normalized to the repository granularity,
/// so [`HarvestQuery::contains`] can compare datestamps as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestQuery {
    /// Inclusive lower datestamp bound.
    pub from: String,
    /// Inclusive upper datestamp bound.
    pub until: String,
    /// Set filter; `None` means all sets.
    pub set: Option<String>,
    /// Requested metadata format.
    pub metadata_prefix: String,
}

impl HarvestQuery {
    /// Creates a query spanning all dates at the given granularity.
    pub fn unbounded(granularity: Granularity, metadata_prefix: impl Into<String>) -> Self {
        Self {
            from: granularity.earliest().to_string(),
            until: granularity.latest().to_string(),
            set: None,
            metadata_prefix: metadata_prefix.into(),
        }
    }

    /// Sets the date range.
    pub fn with_range(mut self, from: impl Into<String>, until: impl Into<String>) -> Self {
        self.from = from.into();
        self.until = until.into();
        self
    }

    /// Sets the set filter.
    pub fn with_set(mut self, set: impl Into<String>) -> Self {
        self.set = Some(set.into());
        self
    }

    /// The granularity the bounds were normalized to.
    pub fn granularity(&self) -> Granularity {
        Granularity::of(&self.from)
    }

    /// Inclusive lexical range check of a stored datestamp.
    pub fn contains(&self, datestamp: &str) -> bool {
        let datestamp = self.granularity().normalize_datestamp(datestamp);
        self.from.as_str() <= datestamp.as_ref() && datestamp.as_ref() <= self.until.as_str()
    }

    /// Returns true if a record with these set memberships passes the set filter.
    pub fn accepts_sets(&self, set_specs: &[String]) -> bool {
        match &self.set {
            Some(set) => set_specs.iter().any(|s| s == set),
            None => true,
        }
    }
}
