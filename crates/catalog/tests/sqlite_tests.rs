//! SQLite-specific behaviour: files on disk, extra format columns, named sets,
//! seconds granularity and property-driven construction.

#![cfg(feature = "sqlite")]

mod common;

use common::*;
use oaiserve_catalog::backends::sqlite::{CursorMode, SqliteCatalog, SqliteCatalogConfig};
use oaiserve_catalog::config::{BackendConfig, FormatConfig, Properties, RepositoryConfig};
use oaiserve_catalog::core::Catalog;
use oaiserve_catalog::repository::{HarvestArgs, ListRequest, Repository};
use oaiserve_catalog::types::{Granularity, MetadataFormat};
use oaiserve_catalog::{ConfigError, OaiError};
use rusqlite::params;
use tempfile::TempDir;

fn file_catalog(dir: &TempDir, mode: CursorMode) -> (SqliteCatalog, SqliteCatalogConfig) {
    let config = SqliteCatalogConfig::new(dir.path().join("catalog.db")).with_cursor_mode(mode);
    let catalog = SqliteCatalog::open(config.clone()).expect("Failed to open SQLite file");
    (catalog, config)
}

fn marc21() -> MetadataFormat {
    MetadataFormat {
        metadata_prefix: "marc21".to_string(),
        schema: "http://www.loc.gov/standards/marcxml/schema/MARC21slim.xsd".to_string(),
        metadata_namespace: "http://www.loc.gov/MARC21/slim".to_string(),
    }
}

// ============================================================================
// Database Files
// ============================================================================

/// Test that records survive closing and reopening a database file.
#[test]
fn test_file_database_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (catalog, _) = file_catalog(&dir, CursorMode::Offset);
        assert!(!catalog.is_memory());
        seed_sqlite(&catalog, &mixed_records(12));
    }

    let (catalog, config) = file_catalog(&dir, CursorMode::Offset);
    assert_eq!(catalog.path(), dir.path().join("catalog.db"));
    assert!(catalog.get_by_identifier("rec-11").unwrap().is_some());

    let repo = Repository::new(
        Box::new(catalog),
        &RepositoryConfig::for_testing(BackendConfig::Sqlite(config)),
    );
    let (ids, pages) = harvest_identifiers(&repo, HarvestArgs::new("oai_dc"));
    assert_eq!(ids.len(), 12);
    assert_eq!(pages, vec![10, 2]);
}

/// Test that a pooled file database serves a harvest across many connections.
#[test]
fn test_file_database_pool_harvest() {
    let dir = tempfile::tempdir().unwrap();
    let records = mixed_records(35);
    let (catalog, config) = file_catalog(&dir, CursorMode::Snapshot);
    seed_sqlite(&catalog, &records);

    let repo = Repository::new(
        Box::new(catalog),
        &RepositoryConfig::for_testing(BackendConfig::Sqlite(config)),
    );
    let (ids, _) = harvest_identifiers(&repo, HarvestArgs::new("oai_dc").with_set("three"));
    assert_eq!(ids, expected_ids(&records, |r| r.sets.iter().any(|s| s == "three")));
}

// ============================================================================
// Formats From Columns
// ============================================================================

/// Test that an extra records column disseminates its own format.
#[test]
fn test_extra_column_format() {
    let catalog = SqliteCatalog::in_memory().unwrap();
    seed_sqlite(&catalog, &scenario_records(6));
    {
        let conn = catalog.connection().unwrap();
        conn.execute("ALTER TABLE records ADD COLUMN marc_xml TEXT", [])
            .unwrap();
        for id in ["rec-01", "rec-04"] {
            conn.execute(
                "UPDATE records SET marc_xml = ?1 WHERE local_id = ?2",
                params![format!("<record>{id}</record>"), id],
            )
            .unwrap();
        }
    }

    let mut config =
        RepositoryConfig::for_testing(BackendConfig::Sqlite(SqliteCatalogConfig::new(":memory:")));
    config.formats.push(FormatConfig {
        format: marc21(),
        column: "marc_xml".to_string(),
    });
    let repo = Repository::new(Box::new(catalog), &config);

    let page = repo
        .list_records(ListRequest::Query(HarvestArgs::new("marc21")))
        .unwrap();
    let ids: Vec<_> = page.items.iter().map(|r| r.header.identifier.as_str()).collect();
    assert_eq!(ids, vec!["rec-01", "rec-04"]);
    assert_eq!(page.items[1].metadata.as_deref(), Some("<record>rec-04</record>"));

    let formats = repo.list_metadata_formats(Some("rec-04")).unwrap();
    let prefixes: Vec<_> = formats.iter().map(|f| f.metadata_prefix.as_str()).collect();
    assert_eq!(prefixes, vec!["oai_dc", "marc21"]);

    let formats = repo.list_metadata_formats(Some("rec-02")).unwrap();
    assert_eq!(formats, vec![MetadataFormat::oai_dc()]);

    let err = repo.get_record("rec-02", "marc21").unwrap_err();
    assert!(matches!(err, OaiError::CannotDisseminateFormat { .. }));
}

// ============================================================================
// Sets Table
// ============================================================================

/// Test that the sets table supplies names and descriptions.
#[test]
fn test_named_sets() {
    let catalog = SqliteCatalog::in_memory().unwrap();
    seed_sqlite(&catalog, &mixed_records(4));
    {
        let conn = catalog.connection().unwrap();
        conn.execute(
            "INSERT INTO sets (set_spec, set_name, description) VALUES (?1, ?2, ?3)",
            params!["math", "Mathematics", "<dc>Numbers</dc>"],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO sets (set_spec, set_name, description) VALUES (?1, ?2, NULL)",
            params!["math:algebra", "Algebra"],
        )
        .unwrap();
    }

    let sets = catalog.list_sets().unwrap().unwrap();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].spec, "math");
    assert_eq!(sets[0].name, "Mathematics");
    assert_eq!(sets[0].description.as_deref(), Some("<dc>Numbers</dc>"));
    assert_eq!(sets[1].spec, "math:algebra");
    assert!(sets[1].description.is_none());
}

// ============================================================================
// Seconds Granularity
// ============================================================================

/// Test that a seconds repository compares day-only rows as midnight.
#[test]
fn test_seconds_granularity() {
    let catalog = SqliteCatalog::in_memory().unwrap();
    seed_sqlite(
        &catalog,
        &[
            RecordFixture::new("a", "2021-06-01T10:00:00Z"),
            RecordFixture::new("b", "2021-06-01T12:30:00Z"),
            RecordFixture::new("c", "2021-06-02"),
            RecordFixture::new("d", "2021-06-02T00:00:01Z"),
        ],
    );
    let mut config =
        RepositoryConfig::for_testing(BackendConfig::Sqlite(SqliteCatalogConfig::new(":memory:")));
    config.granularity = Granularity::Seconds;
    let repo = Repository::new(Box::new(catalog), &config);

    let identity = repo.identify().unwrap();
    assert_eq!(identity.granularity, "YYYY-MM-DDThh:mm:ssZ");
    assert_eq!(identity.earliest_datestamp, "2021-06-01T10:00:00Z");

    let page = repo
        .list_identifiers(ListRequest::Query(
            HarvestArgs::new("oai_dc").with_range("2021-06-01T11:00:00Z", "2021-06-02T00:00:00Z"),
        ))
        .unwrap();
    let ids: Vec<_> = page.items.iter().map(|h| h.identifier.as_str()).collect();
    assert_eq!(ids, vec!["b", "c"]);
    assert_eq!(page.items[1].datestamp, "2021-06-02T00:00:00Z");

    // day-only bounds widen to the whole day
    let page = repo
        .list_identifiers(ListRequest::Query(
            HarvestArgs::new("oai_dc").with_range("2021-06-02", "2021-06-02"),
        ))
        .unwrap();
    assert_eq!(page.items.len(), 2);

    let err = repo
        .list_identifiers(ListRequest::Query(
            HarvestArgs::new("oai_dc").with_range("2021-06-01", "2021-06-02T00:00:00Z"),
        ))
        .unwrap_err();
    assert!(matches!(err, OaiError::BadArgument { .. }));
}

// ============================================================================
// Configuration
// ============================================================================

fn properties(db: &std::path::Path) -> Properties {
    let mut props = Properties::new();
    props.set("catalog.backend", "sqlite");
    props.set("catalog.maxListSize", "4");
    props.set("identify.repositoryName", "SQLite Repository");
    props.set("identify.baseUrl", "http://localhost/oai");
    props.set("identify.adminEmail", "admin@example.org");
    props.set("sqlite.path", db.display().to_string());
    props
}

/// Test building a SQLite repository from properties.
#[test]
fn test_repository_from_properties() {
    let dir = tempfile::tempdir().unwrap();
    let (catalog, _) = file_catalog(&dir, CursorMode::Offset);
    seed_sqlite(&catalog, &scenario_records(9));
    drop(catalog);

    let mut props = properties(&dir.path().join("catalog.db"));
    props.set("sqlite.cursorMode", "offset");
    let config = RepositoryConfig::from_properties(&props).unwrap();
    let repo = Repository::from_config(&config).unwrap();

    assert!(repo.catalog().supports_replay());
    assert_eq!(repo.page_size(), 4);
    let (ids, pages) = harvest_identifiers(&repo, HarvestArgs::new("oai_dc"));
    assert_eq!(ids.len(), 9);
    assert_eq!(pages, vec![4, 4, 1]);
}

/// Test that bad SQLite settings are configuration errors.
#[test]
fn test_bad_sqlite_properties() {
    let dir = tempfile::tempdir().unwrap();
    let mut props = properties(&dir.path().join("catalog.db"));
    props.set("sqlite.cursorMode", "sideways");
    let err = RepositoryConfig::from_properties(&props).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }), "{err}");

    let mut props = properties(&dir.path().join("catalog.db"));
    props.set("sqlite.path", "");
    let err = RepositoryConfig::from_properties(&props).unwrap_err();
    assert!(matches!(err, ConfigError::MissingKey { .. }), "{err}");
}

/// Test that an unopenable database surfaces as a backend error.
#[test]
fn test_unopenable_database() {
    let dir = tempfile::tempdir().unwrap();
    let mut sqlite = SqliteCatalogConfig::new(dir.path().join("missing").join("catalog.db"));
    sqlite.connection_timeout_ms = 200;
    let config = RepositoryConfig::for_testing(BackendConfig::Sqlite(sqlite));
    let err = Repository::from_config(&config).unwrap_err();
    assert!(matches!(err, ConfigError::Backend { .. }), "{err}");
}
