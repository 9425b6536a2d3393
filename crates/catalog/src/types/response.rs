//! Abstract verb responses.
//!
//! These are the values handed back to a dispatcher; serializing them into
//! the OAI-PMH XML envelope is the dispatcher's concern.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::record::{MetadataFormat, Record, RecordHeader, SetSpec};

/// Continuation attributes attached to a partial or resumed list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumptionInfo {
    /// Token for the next page; absent on the last page of a resumed list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Total number of items in the complete list, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete_list_size: Option<usize>,

    /// Number of items returned before this page.
    pub cursor: usize,

    /// When the token stops being held server side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
}

/// One page of a list verb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListResponse<T> {
    /// Items on this page, in catalog order.
    pub items: Vec<T>,

    /// Present when the list is partial or was resumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumption: Option<ResumptionInfo>,
}

impl<T> ListResponse<T> {
    /// Returns the token for the next page, if any.
    pub fn next_token(&self) -> Option<&str> {
        self.resumption.as_ref().and_then(|r| r.token.as_deref())
    }

    /// Returns true if more pages remain.
    pub fn has_more(&self) -> bool {
        self.next_token().is_some()
    }

    /// Transforms the items while keeping the resumption attributes.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListResponse<U> {
        ListResponse {
            items: self.items.into_iter().map(f).collect(),
            resumption: self.resumption,
        }
    }
}

/// How a repository reports deleted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletedRecordPolicy {
    /// Deletions are never reported.
    No,
    /// Deletions are reported without time limit.
    Persistent,
    /// Deletions may be forgotten.
    #[default]
    Transient,
}

impl std::str::FromStr for DeletedRecordPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no" => Ok(DeletedRecordPolicy::No),
            "persistent" => Ok(DeletedRecordPolicy::Persistent),
            "transient" => Ok(DeletedRecordPolicy::Transient),
            _ => Err(format!("unknown deletedRecord policy: {s}")),
        }
    }
}

/// Repository description returned by Identify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Human-readable repository name.
    pub repository_name: String,
    /// Base URL harvesters send requests to.
    pub base_url: String,
    /// Always `2.0`.
    pub protocol_version: &'static str,
    /// Administrator contact addresses.
    pub admin_emails: Vec<String>,
    /// Lower bound on all datestamps in the repository.
    pub earliest_datestamp: String,
    /// How deletions are reported.
    pub deleted_record: DeletedRecordPolicy,
    /// Finest supported datestamp granularity.
    pub granularity: String,
    /// Namespace used in `oai:` identifiers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_identifier: Option<String>,
}

/// The result of a verb invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verb", content = "result")]
#[allow(missing_docs)]
pub enum VerbResponse {
    Identify(Identity),
    ListMetadataFormats(Vec<MetadataFormat>),
    ListSets(ListResponse<SetSpec>),
    ListIdentifiers(ListResponse<RecordHeader>),
    ListRecords(ListResponse<Record>),
    GetRecord(Record),
}

impl VerbResponse {
    /// Returns the verb name this response answers.
    pub fn verb(&self) -> &'static str {
        match self {
            VerbResponse::Identify(_) => "Identify",
            VerbResponse::ListMetadataFormats(_) => "ListMetadataFormats",
            VerbResponse::ListSets(_) => "ListSets",
            VerbResponse::ListIdentifiers(_) => "ListIdentifiers",
            VerbResponse::ListRecords(_) => "ListRecords",
            VerbResponse::GetRecord(_) => "GetRecord",
        }
    }

    /// Returns the resumption token carried by a list response, if any.
    pub fn next_token(&self) -> Option<&str> {
        match self {
            VerbResponse::ListSets(list) => list.next_token(),
            VerbResponse::ListIdentifiers(list) => list.next_token(),
            VerbResponse::ListRecords(list) => list.next_token(),
            _ => None,
        }
    }
}
