use crate::error::OaiResult;
use crate::repository::Repository;
use crate::types::VerbResponse;

use super::{VerbArgs, VerbHandler};

/// `ListMetadataFormats`: all formats, or those of one item.
#[derive(Debug, Default)]
pub struct ListMetadataFormatsHandler;

impl VerbHandler for ListMetadataFormatsHandler {
    fn name(&self) -> &'static str {
        "ListMetadataFormats"
    }

    fn optional(&self) -> &'static [&'static str] {
        &["identifier"]
    }

    fn handle(&self, repo: &Repository, args: &VerbArgs) -> OaiResult<VerbResponse> {
        repo.list_metadata_formats(args.get("identifier"))
            .map(VerbResponse::ListMetadataFormats)
    }
}
