use crate::error::OaiResult;
use crate::repository::Repository;
use crate::types::VerbResponse;

use super::{VerbArgs, VerbHandler};

/// `Identify`: describes the repository.
#[derive(Debug, Default)]
pub struct IdentifyHandler;

impl VerbHandler for IdentifyHandler {
    fn name(&self) -> &'static str {
        "Identify"
    }

    fn handle(&self, repo: &Repository, _args: &VerbArgs) -> OaiResult<VerbResponse> {
        repo.identify().map(VerbResponse::Identify)
    }
}
