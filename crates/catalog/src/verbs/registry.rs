//! Verb name to handler mapping.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{OaiError, OaiResult};
use crate::repository::Repository;
use crate::types::VerbResponse;

use super::{
    GetRecordHandler, IdentifyHandler, ListIdentifiersHandler, ListMetadataFormatsHandler,
    ListRecordsHandler, ListSetsHandler, VerbArgs, VerbHandler,
};

/// Dispatches verb requests to registered handlers.
#[derive(Default)]
pub struct VerbRegistry {
    handlers: HashMap<&'static str, Box<dyn VerbHandler>>,
}

impl std::fmt::Debug for VerbRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerbRegistry")
            .field("verbs", &self.names())
            .finish()
    }
}

impl VerbRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the six OAI-PMH verbs.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(IdentifyHandler);
        registry.register(ListMetadataFormatsHandler);
        registry.register(ListSetsHandler);
        registry.register(ListIdentifiersHandler);
        registry.register(ListRecordsHandler);
        registry.register(GetRecordHandler);
        registry
    }

    /// Adds a handler, replacing any with the same name.
    pub fn register(&mut self, handler: impl VerbHandler + 'static) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    /// Registered verb names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Validates `args` and runs `verb`.
    pub fn dispatch(
        &self,
        repo: &Repository,
        verb: &str,
        args: &[(String, String)],
    ) -> OaiResult<VerbResponse> {
        let handler = self.handlers.get(verb).ok_or_else(|| OaiError::BadVerb {
            verb: verb.to_string(),
        })?;
        let args = VerbArgs::validate(handler.as_ref(), args)?;
        debug!(verb, args = args.len(), "Dispatching verb");
        handler.handle(repo, &args)
    }
}
