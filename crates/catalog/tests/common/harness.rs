//! Backend-independent test harness.

use std::ops::Deref;
use std::time::Duration;

use oaiserve_catalog::backends::{
    FilesystemCatalog, FilesystemCatalogConfig, HeaderSource, XmlCatalog, XmlCatalogConfig,
};
#[cfg(feature = "sqlite")]
use oaiserve_catalog::backends::sqlite::{CursorMode, SqliteCatalog, SqliteCatalogConfig};
use oaiserve_catalog::config::{BackendConfig, RepositoryConfig};
use oaiserve_catalog::core::Catalog;
use oaiserve_catalog::repository::{HarvestArgs, ListRequest, Repository};
use oaiserve_catalog::types::SetSpec;
use tempfile::TempDir;

use super::fixtures::{RecordFixture, write_record_files, xml_document};

/// The backends every behavioural test runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestBackend {
    /// Embedded-header record files.
    Filesystem,
    /// One XML document.
    Xml,
    /// SQLite with held snapshots.
    #[cfg(feature = "sqlite")]
    SqliteSnapshot,
    /// SQLite with replayable offsets.
    #[cfg(feature = "sqlite")]
    SqliteOffset,
}

impl TestBackend {
    /// Every backend.
    pub fn all() -> Vec<TestBackend> {
        let mut backends = vec![TestBackend::Filesystem, TestBackend::Xml];
        #[cfg(feature = "sqlite")]
        backends.extend([TestBackend::SqliteSnapshot, TestBackend::SqliteOffset]);
        backends
    }

    /// Backends whose tokens can be rebuilt from their parameters.
    pub fn replayable() -> Vec<TestBackend> {
        Self::all()
            .into_iter()
            .filter(|b| b.is_replayable())
            .collect()
    }

    /// Returns true if tokens of this backend can be replayed.
    pub fn is_replayable(self) -> bool {
        match self {
            #[cfg(feature = "sqlite")]
            TestBackend::SqliteSnapshot => false,
            _ => true,
        }
    }
}

/// Options for building a test repository.
#[derive(Debug, Clone)]
pub struct TestOptions {
    /// Page size.
    pub page_size: usize,
    /// Token lifetime.
    pub token_ttl: Option<Duration>,
    /// Namespace for `oai:` identifiers.
    pub repository_identifier: Option<String>,
    /// Static set list.
    pub sets: Vec<SetSpec>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            page_size: 10,
            token_ttl: None,
            repository_identifier: None,
            sets: vec![],
        }
    }
}

/// A repository plus whatever keeps its backing store alive.
pub struct TestRepository {
    /// The backend under test.
    pub backend: TestBackend,
    repo: Repository,
    _dir: Option<TempDir>,
}

impl Deref for TestRepository {
    type Target = Repository;

    fn deref(&self) -> &Repository {
        &self.repo
    }
}

/// Loads `records` into `backend` with default options.
pub fn build(backend: TestBackend, records: &[RecordFixture]) -> TestRepository {
    build_with(backend, records, TestOptions::default())
}

/// Loads `records` into `backend`.
pub fn build_with(
    backend: TestBackend,
    records: &[RecordFixture],
    options: TestOptions,
) -> TestRepository {
    let (catalog, backend_config, dir): (Box<dyn Catalog>, BackendConfig, Option<TempDir>) =
        match backend {
            TestBackend::Filesystem => {
                let dir = tempfile::tempdir().expect("Failed to create temp dir");
                write_record_files(dir.path(), records);
                let mut config = FilesystemCatalogConfig::new(dir.path());
                config.headers = HeaderSource::Embedded;
                let catalog = FilesystemCatalog::open(config.clone())
                    .expect("Failed to open filesystem catalog");
                (Box::new(catalog), BackendConfig::Filesystem(config), Some(dir))
            }
            TestBackend::Xml => {
                let config = XmlCatalogConfig::new("fixtures.xml");
                let catalog = XmlCatalog::from_document(&xml_document(records), config.clone())
                    .expect("Failed to parse XML fixtures");
                (Box::new(catalog), BackendConfig::Xml(config), None)
            }
            #[cfg(feature = "sqlite")]
            TestBackend::SqliteSnapshot | TestBackend::SqliteOffset => {
                let mode = if backend == TestBackend::SqliteOffset {
                    CursorMode::Offset
                } else {
                    CursorMode::Snapshot
                };
                let config = SqliteCatalogConfig::new(":memory:").with_cursor_mode(mode);
                let catalog =
                    SqliteCatalog::open(config.clone()).expect("Failed to open SQLite catalog");
                super::fixtures::seed_sqlite(&catalog, records);
                (Box::new(catalog), BackendConfig::Sqlite(config), None)
            }
        };

    let mut config = RepositoryConfig::for_testing(backend_config);
    config.max_list_size = options.page_size;
    config.token_ttl = options.token_ttl;
    config.identify.repository_identifier = options.repository_identifier;
    config.sets = options.sets;

    TestRepository {
        backend,
        repo: Repository::new(catalog, &config),
        _dir: dir,
    }
}

/// Follows tokens until the listing ends; returns identifiers and page sizes.
pub fn harvest_identifiers(repo: &Repository, args: HarvestArgs) -> (Vec<String>, Vec<usize>) {
    let mut ids = Vec::new();
    let mut pages = Vec::new();
    let mut request = ListRequest::Query(args);
    loop {
        let page = repo
            .list_identifiers(request)
            .expect("Listing failed while harvesting");
        pages.push(page.items.len());
        ids.extend(page.items.iter().map(|h| h.identifier.clone()));
        match page.next_token() {
            Some(token) => request = ListRequest::Resume(token.to_string()),
            None => break,
        }
    }
    (ids, pages)
}

/// Identifiers of fixtures passing a filter, in fixture order.
pub fn expected_ids(
    records: &[RecordFixture],
    filter: impl Fn(&RecordFixture) -> bool,
) -> Vec<String> {
    records
        .iter()
        .filter(|r| filter(r))
        .map(|r| r.id.clone())
        .collect()
}
