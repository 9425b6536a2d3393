//! Request argument validation.

use std::collections::BTreeMap;

use crate::error::{OaiError, OaiResult};

use super::VerbHandler;

/// Validated arguments of one verb request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerbArgs {
    values: BTreeMap<String, String>,
}

impl VerbArgs {
    /// Checks `pairs` against what `handler` accepts.
    ///
    /// Repeated, unknown and missing arguments are `badArgument`, as is any
    /// argument next to the handler's exclusive one.
    pub fn validate(handler: &dyn VerbHandler, pairs: &[(String, String)]) -> OaiResult<Self> {
        let mut values = BTreeMap::new();
        for (key, value) in pairs {
            let known = handler
                .required()
                .iter()
                .chain(handler.optional())
                .chain(handler.exclusive().iter())
                .any(|name| *name == key.as_str());
            if !known {
                return Err(OaiError::bad_argument(format!(
                    "illegal argument {key} for {}",
                    handler.name()
                )));
            }
            if values.insert(key.clone(), value.clone()).is_some() {
                return Err(OaiError::bad_argument(format!("repeated argument {key}")));
            }
        }

        if let Some(exclusive) = handler.exclusive() {
            if values.contains_key(exclusive) {
                if values.len() > 1 {
                    return Err(OaiError::bad_argument(format!(
                        "{exclusive} is an exclusive argument"
                    )));
                }
                return Ok(Self { values });
            }
        }

        if let Some(missing) = handler
            .required()
            .iter()
            .find(|name| !values.contains_key(**name))
        {
            return Err(OaiError::bad_argument(format!(
                "missing required argument {missing}"
            )));
        }

        Ok(Self { values })
    }

    /// Returns an argument value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Returns an argument that validation guaranteed to be present.
    pub fn require(&self, name: &str) -> OaiResult<&str> {
        self.get(name)
            .ok_or_else(|| OaiError::bad_argument(format!("missing required argument {name}")))
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
