//! Record-level verbs.

use crate::error::OaiResult;
use crate::repository::{HarvestArgs, ListRequest, Repository};
use crate::types::VerbResponse;

use super::{RESUMPTION_TOKEN, VerbArgs, VerbHandler};

const LIST_REQUIRED: &[&str] = &["metadataPrefix"];
const LIST_OPTIONAL: &[&str] = &["from", "until", "set"];

fn list_request(args: &VerbArgs) -> OaiResult<ListRequest> {
    if let Some(token) = args.get(RESUMPTION_TOKEN) {
        return Ok(ListRequest::Resume(token.to_string()));
    }
    Ok(ListRequest::Query(HarvestArgs {
        from: args.get("from").map(String::from),
        until: args.get("until").map(String::from),
        set: args.get("set").map(String::from),
        metadata_prefix: args.require("metadataPrefix")?.to_string(),
    }))
}

/// `ListIdentifiers`: headers matching a selective harvest.
#[derive(Debug, Default)]
pub struct ListIdentifiersHandler;

impl VerbHandler for ListIdentifiersHandler {
    fn name(&self) -> &'static str {
        "ListIdentifiers"
    }

    fn required(&self) -> &'static [&'static str] {
        LIST_REQUIRED
    }

    fn optional(&self) -> &'static [&'static str] {
        LIST_OPTIONAL
    }

    fn exclusive(&self) -> Option<&'static str> {
        Some(RESUMPTION_TOKEN)
    }

    fn handle(&self, repo: &Repository, args: &VerbArgs) -> OaiResult<VerbResponse> {
        repo.list_identifiers(list_request(args)?)
            .map(VerbResponse::ListIdentifiers)
    }
}

/// `ListRecords`: records matching a selective harvest.
#[derive(Debug, Default)]
pub struct ListRecordsHandler;

impl VerbHandler for ListRecordsHandler {
    fn name(&self) -> &'static str {
        "ListRecords"
    }

    fn required(&self) -> &'static [&'static str] {
        LIST_REQUIRED
    }

    fn optional(&self) -> &'static [&'static str] {
        LIST_OPTIONAL
    }

    fn exclusive(&self) -> Option<&'static str> {
        Some(RESUMPTION_TOKEN)
    }

    fn handle(&self, repo: &Repository, args: &VerbArgs) -> OaiResult<VerbResponse> {
        repo.list_records(list_request(args)?)
            .map(VerbResponse::ListRecords)
    }
}

/// `GetRecord`: one record in one format.
#[derive(Debug, Default)]
pub struct GetRecordHandler;

impl VerbHandler for GetRecordHandler {
    fn name(&self) -> &'static str {
        "GetRecord"
    }

    fn required(&self) -> &'static [&'static str] {
        &["identifier", "metadataPrefix"]
    }

    fn handle(&self, repo: &Repository, args: &VerbArgs) -> OaiResult<VerbResponse> {
        repo.get_record(args.require("identifier")?, args.require("metadataPrefix")?)
            .map(VerbResponse::GetRecord)
    }
}
