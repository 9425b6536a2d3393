//! OAI-PMH verb dispatch.
//!
//! Each verb is a [`VerbHandler`] registered by name in a [`VerbRegistry`].
//! The registry validates request arguments against the handler's declared
//! argument lists before calling it.
//!
//! # Example
//!
//! ```no_run
//! use oaiserve_catalog::config::{Properties, RepositoryConfig};
//! use oaiserve_catalog::repository::Repository;
//! use oaiserve_catalog::verbs::VerbRegistry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let props = Properties::from_file("oaiserve.properties")?;
//! let repo = Repository::from_config(&RepositoryConfig::from_properties(&props)?)?;
//! let registry = VerbRegistry::standard();
//!
//! let args = vec![("metadataPrefix".to_string(), "oai_dc".to_string())];
//! let response = registry.dispatch(&repo, "ListIdentifiers", &args)?;
//! println!("{}", response.verb());
//! # Ok(())
//! # }
//! ```

mod args;
mod formats;
mod identify;
mod records;
mod registry;
mod sets;

pub use args::VerbArgs;
pub use formats::ListMetadataFormatsHandler;
pub use identify::IdentifyHandler;
pub use records::{GetRecordHandler, ListIdentifiersHandler, ListRecordsHandler};
pub use registry::VerbRegistry;
pub use sets::ListSetsHandler;

use crate::error::OaiResult;
use crate::repository::Repository;
use crate::types::VerbResponse;

/// Name of the argument that continues a listing.
pub const RESUMPTION_TOKEN: &str = "resumptionToken";

/// A single OAI-PMH verb.
pub trait VerbHandler: Send + Sync {
    /// The verb name, e.g. `ListRecords`.
    fn name(&self) -> &'static str;

    /// Arguments that must be present unless the exclusive argument is used.
    fn required(&self) -> &'static [&'static str] {
        &[]
    }

    /// Arguments that may be present.
    fn optional(&self) -> &'static [&'static str] {
        &[]
    }

    /// An argument that must appear alone when present.
    fn exclusive(&self) -> Option<&'static str> {
        None
    }

    /// Runs the verb with validated arguments.
    fn handle(&self, repo: &Repository, args: &VerbArgs) -> OaiResult<VerbResponse>;
}
