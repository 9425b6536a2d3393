use crate::error::OaiResult;
use crate::repository::Repository;
use crate::types::VerbResponse;

use super::{RESUMPTION_TOKEN, VerbArgs, VerbHandler};

/// `ListSets`: the set hierarchy, paginated.
#[derive(Debug, Default)]
pub struct ListSetsHandler;

impl VerbHandler for ListSetsHandler {
    fn name(&self) -> &'static str {
        "ListSets"
    }

    fn exclusive(&self) -> Option<&'static str> {
        Some(RESUMPTION_TOKEN)
    }

    fn handle(&self, repo: &Repository, args: &VerbArgs) -> OaiResult<VerbResponse> {
        repo.list_sets(args.get(RESUMPTION_TOKEN))
            .map(VerbResponse::ListSets)
    }
}
