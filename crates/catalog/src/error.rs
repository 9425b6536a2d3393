//! Error types for the repository core.
//!
//! Errors are split into three layers: [`OaiError`] is the protocol-level
//! taxonomy reported to harvesters, [`CatalogError`] covers backend failures
//! (file I/O, SQL, XML parsing), and [`ConfigError`] covers startup failures.
//! Catalog errors surface to callers only as [`OaiError::Internal`].

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The protocol error kinds a verb invocation can end with.
#[derive(Error, Debug)]
pub enum OaiError {
    /// A request argument is illegal, missing, repeated or malformed.
    #[error("bad argument: {message}")]
    BadArgument { message: String },

    /// The verb is not one the repository implements.
    #[error("bad verb: {verb}")]
    BadVerb { verb: String },

    /// The repository or the item cannot produce the requested format.
    #[error("cannot disseminate format: {metadata_prefix}")]
    CannotDisseminateFormat { metadata_prefix: String },

    /// The identifier is unknown to the repository.
    #[error("identifier does not exist: {identifier}")]
    IdDoesNotExist { identifier: String },

    /// A fresh query matched zero records.
    #[error("no records match the request")]
    NoItemsMatch,

    /// The repository does not organise its records into sets.
    #[error("repository does not support sets")]
    NoSetHierarchy,

    /// No metadata formats are available for the item.
    #[error("no metadata formats available for: {identifier}")]
    NoMetadataFormats { identifier: String },

    /// The token is malformed, expired, reused or cannot be replayed.
    #[error("bad resumption token: {reason}")]
    BadResumptionToken { reason: String },

    /// A backend failure.
    #[error(transparent)]
    Internal(#[from] CatalogError),
}

impl OaiError {
    /// Creates a [`OaiError::BadArgument`].
    pub fn bad_argument(message: impl Into<String>) -> Self {
        OaiError::BadArgument {
            message: message.into(),
        }
    }

    /// Creates a [`OaiError::BadResumptionToken`].
    pub fn bad_token(reason: impl Into<String>) -> Self {
        OaiError::BadResumptionToken {
            reason: reason.into(),
        }
    }

    /// Returns the OAI-PMH error code for this error.
    ///
    /// Internal failures have no protocol code of their own; they report
    /// `internalError`, which dispatchers map to a server failure.
    pub fn code(&self) -> &'static str {
        match self {
            OaiError::BadArgument { .. } => "badArgument",
            OaiError::BadVerb { .. } => "badVerb",
            OaiError::CannotDisseminateFormat { .. } => "cannotDisseminateFormat",
            OaiError::IdDoesNotExist { .. } => "idDoesNotExist",
            OaiError::NoItemsMatch => "noRecordsMatch",
            OaiError::NoSetHierarchy => "noSetHierarchy",
            OaiError::NoMetadataFormats { .. } => "noMetadataFormats",
            OaiError::BadResumptionToken { .. } => "badResumptionToken",
            OaiError::Internal(_) => "internalError",
        }
    }

    /// Returns the HTTP status a dispatcher should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            OaiError::IdDoesNotExist { .. } => 404,
            OaiError::Internal(_) => 500,
            _ => 400,
        }
    }

    /// Returns a message safe to show to harvesters.
    ///
    /// Backend details (paths, SQL text) are never included for internal errors.
    pub fn public_message(&self) -> String {
        match self {
            OaiError::Internal(_) => "internal repository error".to_string(),
            other => other.to_string(),
        }
    }

    /// Returns true if this error is an internal failure.
    pub fn is_internal(&self) -> bool {
        matches!(self, OaiError::Internal(_))
    }
}

/// Errors raised by catalog backends.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// File system access failed.
    #[error("i/o error in {backend_name}: {source}")]
    Io {
        backend_name: String,
        #[source]
        source: std::io::Error,
    },

    /// A SQL statement failed.
    #[cfg(feature = "sqlite")]
    #[error("sql error: {source}")]
    Sql {
        #[source]
        source: rusqlite::Error,
    },

    /// No pooled connection could be obtained.
    #[cfg(feature = "sqlite")]
    #[error("connection pool error: {source}")]
    Pool {
        #[source]
        source: r2d2::Error,
    },

    /// An XML document could not be parsed.
    #[error("xml error in {location}: {message}")]
    Xml { location: String, message: String },

    /// A stored record is structurally invalid.
    #[error("invalid record {identifier}: {message}")]
    InvalidRecord { identifier: String, message: String },

    /// Any other internal failure.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl CatalogError {
    /// Creates an [`CatalogError::Internal`] without a source.
    pub fn internal(backend_name: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::Internal {
            backend_name: backend_name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an [`CatalogError::Xml`].
    pub fn xml(location: impl Into<String>, message: impl ToString) -> Self {
        CatalogError::Xml {
            location: location.into(),
            message: message.to_string(),
        }
    }
}

/// Errors raised while building a repository from configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key is absent.
    #[error("missing required configuration key: {key}")]
    MissingKey { key: String },

    /// A key holds a value that cannot be used.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// The configuration failed validation.
    #[error("invalid configuration: {}", errors.join("; "))]
    Invalid { errors: Vec<String> },

    /// The configured backend could not be constructed.
    #[error("failed to initialize {backend_name} catalog: {source}")]
    Backend {
        backend_name: String,
        #[source]
        source: CatalogError,
    },

    /// The configuration source could not be read.
    #[error("failed to read configuration from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Creates a [`ConfigError::InvalidValue`].
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for verb operations.
pub type OaiResult<T> = Result<T, OaiError>;

/// Result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result type alias for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

// Implement conversions from common error types

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::Sql { source: err }
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for CatalogError {
    fn from(err: r2d2::Error) -> Self {
        CatalogError::Pool { source: err }
    }
}
