//! OAI-PMH Repository Catalog Core
//!
//! This crate answers OAI-PMH harvester requests over interchangeable record
//! stores. It owns the resumption-token pagination protocol, the catalog
//! abstraction that maps verb semantics onto a backing store, and the record
//! factory that turns stored records into harvester-facing headers and
//! records. Responses are abstract values; rendering the XML envelope is left
//! to the dispatcher.
//!
//! # Features
//!
//! - **Three Backends**: directory trees, a single XML document, SQLite
//! - **Resumable Pagination**: single-use, TTL-aware tokens with replay for
//!   backends that support it
//! - **Selective Harvesting**: inclusive date ranges at day or seconds
//!   granularity, set filtering, per-item format availability
//!
//! # Backend Features
//!
//! - `sqlite` (default) - SQLite catalog over an `r2d2` connection pool
//!
//! # Architecture
//!
//! - [`types`] - Records, queries and verb responses
//! - [`error`] - Protocol, catalog and configuration errors
//! - [`core`] - The [`Catalog`](core::Catalog) contract
//! - [`backends`] - Catalog implementations
//! - [`token`] - Resumption token codec and token table
//! - [`factory`] - Headers, format checks and crosswalks
//! - [`repository`] - The pagination engine
//! - [`verbs`] - Verb handlers and argument validation
//! - [`config`] - Properties and repository configuration
//!
//! # Quick Start
//!
//! ```
//! use oaiserve_catalog::backends::{XmlCatalog, XmlCatalogConfig};
//! use oaiserve_catalog::config::{BackendConfig, RepositoryConfig};
//! use oaiserve_catalog::repository::{HarvestArgs, ListRequest, Repository};
//!
//! let xml = r#"<records>
//!   <record>
//!     <header><identifier>item-1</identifier><datestamp>2021-06-01</datestamp></header>
//!     <metadata><dc>First</dc></metadata>
//!   </record>
//! </records>"#;
//!
//! let source = XmlCatalogConfig::new("records.xml");
//! let catalog = XmlCatalog::from_document(xml, source.clone()).unwrap();
//! let config = RepositoryConfig::for_testing(BackendConfig::Xml(source));
//! let repo = Repository::new(Box::new(catalog), &config);
//!
//! let page = repo
//!     .list_identifiers(ListRequest::Query(HarvestArgs::new("oai_dc")))
//!     .unwrap();
//! assert_eq!(page.items[0].identifier, "item-1");
//! assert!(page.resumption.is_none());
//! ```
//!
//! # Verb Dispatch
//!
//! ```
//! use oaiserve_catalog::OaiError;
//! use oaiserve_catalog::verbs::VerbRegistry;
//! # use oaiserve_catalog::backends::{XmlCatalog, XmlCatalogConfig};
//! # use oaiserve_catalog::config::{BackendConfig, RepositoryConfig};
//! # use oaiserve_catalog::repository::Repository;
//! # let source = XmlCatalogConfig::new("records.xml");
//! # let catalog = XmlCatalog::from_document("<records/>", source.clone()).unwrap();
//! # let repo = Repository::new(Box::new(catalog), &RepositoryConfig::for_testing(BackendConfig::Xml(source)));
//!
//! let registry = VerbRegistry::standard();
//! let err = registry.dispatch(&repo, "ListEverything", &[]).unwrap_err();
//! assert!(matches!(err, OaiError::BadVerb { .. }));
//! assert_eq!(err.code(), "badVerb");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod core;
pub mod error;
pub mod factory;
pub mod repository;
pub mod token;
pub mod types;
pub mod verbs;

// Re-export commonly used types at crate root
pub use error::{CatalogError, CatalogResult, ConfigError, ConfigResult, OaiError, OaiResult};
pub use repository::{HarvestArgs, ListRequest, Repository};
pub use types::{Granularity, HarvestQuery, NativeRecord, Record, RecordHeader, VerbResponse};

// Re-export core traits
pub use core::{BackendKind, Catalog, FormatFilter, LiveCursor, ResumeCursor};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
