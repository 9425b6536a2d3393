//! Core types for records, queries and verb responses.

pub mod granularity;
pub mod query;
pub mod record;
pub mod response;

pub use granularity::Granularity;
pub use query::HarvestQuery;
pub use record::{MetadataFormat, NativeRecord, Payload, Record, RecordHeader, SetSpec, XmlPayload};
pub use response::{DeletedRecordPolicy, Identity, ListResponse, ResumptionInfo, VerbResponse};
