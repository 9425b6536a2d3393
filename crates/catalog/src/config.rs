//! Repository configuration.
//!
//! Configuration arrives as flat `key=value` properties and is parsed into a
//! typed [`RepositoryConfig`].
//!
//! # Keys
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `catalog.backend` | required | `filesystem`, `xml` or `sqlite` |
//! | `catalog.maxListSize` | required | Page size of list verbs |
//! | `catalog.tokenTtl` | unlimited | Milliseconds (negative = unlimited) or a duration such as `10m` |
//! | `catalog.granularity` | `YYYY-MM-DD` | Finest datestamp granularity |
//! | `identify.repositoryName` | required | Repository name |
//! | `identify.baseUrl` | required | Base URL |
//! | `identify.adminEmail` | required | Comma-separated addresses |
//! | `identify.repositoryIdentifier` | none | Namespace of `oai:` identifiers |
//! | `identify.deletedRecord` | `transient` | `no`, `persistent` or `transient` |
//! | `formats.<prefix>.schema` | | Schema URL of a format |
//! | `formats.<prefix>.namespace` | | Namespace of a format |
//! | `formats.<prefix>.column` | `metadata` | Row column holding the format |
//! | `sets.<key>` | | `spec` or `spec\|name`, listed in key order |
//! | `filesystem.homeDir` | required | Record tree root |
//! | `filesystem.hideExtension` | false | Strip `.xml` from identifiers |
//! | `filesystem.headers` | `mtime` | `mtime` or `embedded` |
//! | `xml.sourceFile` | required | Record document |
//! | `xml.schemaLocationIndexed` | false | Filter formats by schema location |
//! | `sqlite.path` | required | Database file or `:memory:` |
//! | `sqlite.maxConnections` | 10 | Pool size |
//! | `sqlite.busyTimeoutMs` | 5000 | SQLite busy timeout |
//! | `sqlite.cursorMode` | `snapshot` | `snapshot` or `offset` |
//! | `sqlite.initSchema` | true | Create tables when missing |
//!
//! # Example
//!
//! ```
//! use oaiserve_catalog::config::{Properties, RepositoryConfig};
//!
//! let props = Properties::parse(
//!     "catalog.backend = xml\n\
//!      catalog.maxListSize = 50\n\
//!      identify.repositoryName = Demo\n\
//!      identify.baseUrl = http://localhost/oai\n\
//!      identify.adminEmail = admin@example.org\n\
//!      xml.sourceFile = records.xml\n",
//! )
//! .unwrap();
//! let config = RepositoryConfig::from_properties(&props).unwrap();
//! assert_eq!(config.max_list_size, 50);
//! assert!(config.validate().is_ok());
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::backends::{
    FilesystemCatalog, FilesystemCatalogConfig, HeaderSource, XmlCatalog, XmlCatalogConfig,
};
#[cfg(feature = "sqlite")]
use crate::backends::sqlite::{CursorMode, SqliteCatalog, SqliteCatalogConfig};
use crate::core::{BackendKind, Catalog};
use crate::error::{CatalogResult, ConfigError, ConfigResult};
use crate::factory::{Crosswalks, PassThroughCrosswalk};
use crate::types::{DeletedRecordPolicy, Granularity, MetadataFormat, SetSpec};

/// An ordered map of configuration properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    /// Creates an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key=value` lines. Blank lines and lines starting with `#` or
    /// `!` are ignored; keys and values are trimmed.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let mut props = Self::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ConfigError::invalid(format!("line {}", number + 1), "expected key=value")
            })?;
            props.set(key, value);
        }
        Ok(props)
    }

    /// Reads and parses a properties file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Sets a property, replacing any earlier value.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        self.values
            .insert(key.as_ref().trim().to_string(), value.as_ref().trim().to_string());
    }

    /// Returns a property; empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Returns a property or [`ConfigError::MissingKey`].
    pub fn require(&self, key: &str) -> ConfigResult<&str> {
        self.get(key).ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
        })
    }

    /// Parses a property with [`FromStr`].
    pub fn get_parse<T>(&self, key: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|v| v.parse::<T>().map_err(|e| ConfigError::invalid(key, e.to_string())))
            .transpose()
    }

    /// Iterates `(rest, value)` for keys starting with `prefix`.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.values
            .iter()
            .filter_map(move |(k, v)| k.strip_prefix(prefix).map(|rest| (rest, v.as_str())))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no properties are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Identify response settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifyConfig {
    /// Human-readable repository name.
    pub repository_name: String,
    /// Base URL of the endpoint.
    pub base_url: String,
    /// Administrator addresses.
    pub admin_emails: Vec<String>,
    /// Namespace used for `oai:` identifiers.
    pub repository_identifier: Option<String>,
    /// Deleted record support.
    pub deleted_record: DeletedRecordPolicy,
}

/// A metadata format served through a pass-through crosswalk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatConfig {
    /// The format description.
    pub format: MetadataFormat,
    /// Row column read by SQL-backed catalogs.
    pub column: String,
}

impl FormatConfig {
    /// Builds the crosswalk for this format.
    pub fn crosswalk(&self) -> PassThroughCrosswalk {
        PassThroughCrosswalk::new(self.format.clone()).with_column(self.column.clone())
    }
}

/// Backend-specific settings.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Directory tree.
    Filesystem(FilesystemCatalogConfig),
    /// Single XML document.
    Xml(XmlCatalogConfig),
    /// SQLite database.
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteCatalogConfig),
}

impl BackendConfig {
    /// The backend this configures.
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Filesystem(_) => BackendKind::Filesystem,
            BackendConfig::Xml(_) => BackendKind::Xml,
            #[cfg(feature = "sqlite")]
            BackendConfig::Sqlite(_) => BackendKind::Sqlite,
        }
    }

    /// Opens the configured catalog.
    pub fn open(&self) -> CatalogResult<Box<dyn Catalog>> {
        Ok(match self {
            BackendConfig::Filesystem(config) => Box::new(FilesystemCatalog::open(config.clone())?),
            BackendConfig::Xml(config) => Box::new(XmlCatalog::open(config.clone())?),
            #[cfg(feature = "sqlite")]
            BackendConfig::Sqlite(config) => Box::new(SqliteCatalog::open(config.clone())?),
        })
    }
}

/// Complete repository configuration.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// The catalog backend and its settings.
    pub backend: BackendConfig,
    /// Page size of list verbs.
    pub max_list_size: usize,
    /// Resumption token lifetime; `None` is unlimited.
    pub token_ttl: Option<Duration>,
    /// Finest datestamp granularity.
    pub granularity: Granularity,
    /// Identify settings.
    pub identify: IdentifyConfig,
    /// Disseminated formats, in registration order.
    pub formats: Vec<FormatConfig>,
    /// Static set list used when the catalog has no sets of its own.
    pub sets: Vec<SetSpec>,
}

impl RepositoryConfig {
    /// Parses a configuration from properties.
    pub fn from_properties(props: &Properties) -> ConfigResult<Self> {
        let granularity = match props.get("catalog.granularity") {
            Some(value) => value.parse().unwrap_or_else(|e| {
                warn!(error = %e, "Invalid catalog.granularity; using YYYY-MM-DD");
                Granularity::Day
            }),
            None => Granularity::Day,
        };

        let kind: BackendKind = props
            .get_parse("catalog.backend")?
            .ok_or_else(|| ConfigError::MissingKey {
                key: "catalog.backend".to_string(),
            })?;
        let max_list_size: usize = props
            .get_parse("catalog.maxListSize")?
            .ok_or_else(|| ConfigError::MissingKey {
                key: "catalog.maxListSize".to_string(),
            })?;
        let token_ttl = match props.get("catalog.tokenTtl") {
            Some(value) => parse_ttl("catalog.tokenTtl", value)?,
            None => None,
        };

        Ok(Self {
            backend: backend_config(kind, props, granularity)?,
            max_list_size,
            token_ttl,
            granularity,
            identify: identify_config(props)?,
            formats: format_configs(props)?,
            sets: static_sets(props),
        })
    }

    /// Builds the crosswalk registry for the configured formats.
    pub fn crosswalks(&self) -> Crosswalks {
        let mut crosswalks = Crosswalks::new();
        for format in &self.formats {
            crosswalks.register(Box::new(format.crosswalk()));
        }
        crosswalks
    }

    /// Validates the configuration and returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.max_list_size == 0 {
            errors.push("catalog.maxListSize must be greater than 0".to_string());
        }

        if self.token_ttl == Some(Duration::ZERO) {
            errors.push("catalog.tokenTtl of zero expires every token at once".to_string());
        }

        if self.identify.repository_name.is_empty() {
            errors.push("identify.repositoryName is required".to_string());
        }

        if self.identify.base_url.is_empty() {
            errors.push("identify.baseUrl is required".to_string());
        }

        if self.identify.admin_emails.is_empty() {
            errors.push("identify.adminEmail is required".to_string());
        }

        if let Some(id) = &self.identify.repository_identifier {
            if id.contains(':') {
                errors.push("identify.repositoryIdentifier cannot contain ':'".to_string());
            }
        }

        if self.formats.is_empty() {
            errors.push("at least one metadata format is required".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    pub fn for_testing(backend: BackendConfig) -> Self {
        Self {
            backend,
            max_list_size: 10,
            token_ttl: None,
            granularity: Granularity::Day,
            identify: IdentifyConfig {
                repository_name: "Test Repository".to_string(),
                base_url: "http://localhost/oai".to_string(),
                admin_emails: vec!["admin@example.org".to_string()],
                repository_identifier: None,
                deleted_record: DeletedRecordPolicy::Transient,
            },
            formats: vec![FormatConfig {
                format: MetadataFormat::oai_dc(),
                column: PassThroughCrosswalk::DEFAULT_COLUMN.to_string(),
            }],
            sets: Vec::new(),
        }
    }
}

/// Parses a token lifetime: integer milliseconds, negative for unlimited, or
/// a human-readable duration.
fn parse_ttl(key: &str, value: &str) -> ConfigResult<Option<Duration>> {
    if let Ok(ms) = value.parse::<i64>() {
        return Ok((ms >= 0).then(|| Duration::from_millis(ms.unsigned_abs())));
    }
    humantime::parse_duration(value)
        .map(Some)
        .map_err(|e| ConfigError::invalid(key, e.to_string()))
}

fn backend_config(
    kind: BackendKind,
    props: &Properties,
    granularity: Granularity,
) -> ConfigResult<BackendConfig> {
    match kind {
        BackendKind::Filesystem => {
            let mut config = FilesystemCatalogConfig::new(props.require("filesystem.homeDir")?);
            config.hide_extension = props.get_parse("filesystem.hideExtension")?.unwrap_or(false);
            config.headers = props
                .get_parse::<HeaderSource>("filesystem.headers")?
                .unwrap_or_default();
            config.granularity = granularity;
            Ok(BackendConfig::Filesystem(config))
        }
        BackendKind::Xml => {
            let mut config = XmlCatalogConfig::new(props.require("xml.sourceFile")?);
            config.schema_location_indexed =
                props.get_parse("xml.schemaLocationIndexed")?.unwrap_or(false);
            Ok(BackendConfig::Xml(config))
        }
        #[cfg(feature = "sqlite")]
        BackendKind::Sqlite => {
            let mut config = SqliteCatalogConfig::new(props.require("sqlite.path")?);
            if let Some(max) = props.get_parse("sqlite.maxConnections")? {
                config.max_connections = max;
            }
            if let Some(ms) = props.get_parse("sqlite.busyTimeoutMs")? {
                config.busy_timeout_ms = ms;
            }
            config.cursor_mode = props
                .get_parse::<CursorMode>("sqlite.cursorMode")?
                .unwrap_or_default();
            config.init_schema = props.get_parse("sqlite.initSchema")?.unwrap_or(true);
            Ok(BackendConfig::Sqlite(config))
        }
        #[cfg(not(feature = "sqlite"))]
        BackendKind::Sqlite => Err(ConfigError::invalid(
            "catalog.backend",
            "sqlite support is not compiled in",
        )),
    }
}

fn identify_config(props: &Properties) -> ConfigResult<IdentifyConfig> {
    Ok(IdentifyConfig {
        repository_name: props
            .get("identify.repositoryName")
            .unwrap_or_default()
            .to_string(),
        base_url: props.get("identify.baseUrl").unwrap_or_default().to_string(),
        admin_emails: props
            .get("identify.adminEmail")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        repository_identifier: props.get("identify.repositoryIdentifier").map(String::from),
        deleted_record: props
            .get_parse("identify.deletedRecord")?
            .unwrap_or_default(),
    })
}

/// Collects `formats.<prefix>.<field>` keys; defaults to `oai_dc` alone.
fn format_configs(props: &Properties) -> ConfigResult<Vec<FormatConfig>> {
    let mut fields: BTreeMap<&str, BTreeMap<&str, &str>> = BTreeMap::new();
    for (rest, value) in props.with_prefix("formats.") {
        let (prefix, field) = rest
            .rsplit_once('.')
            .ok_or_else(|| ConfigError::invalid(format!("formats.{rest}"), "expected formats.<prefix>.<field>"))?;
        fields.entry(prefix).or_default().insert(field, value);
    }

    if fields.is_empty() {
        return Ok(vec![FormatConfig {
            format: MetadataFormat::oai_dc(),
            column: PassThroughCrosswalk::DEFAULT_COLUMN.to_string(),
        }]);
    }

    let mut formats = Vec::with_capacity(fields.len());
    for (prefix, fields) in fields {
        let known = (prefix == "oai_dc").then(MetadataFormat::oai_dc);
        let field = |name: &str, fallback: Option<&String>| -> ConfigResult<String> {
            fields
                .get(name)
                .map(|v| v.to_string())
                .or_else(|| fallback.cloned())
                .ok_or_else(|| ConfigError::MissingKey {
                    key: format!("formats.{prefix}.{name}"),
                })
        };
        formats.push(FormatConfig {
            format: MetadataFormat {
                metadata_prefix: prefix.to_string(),
                schema: field("schema", known.as_ref().map(|f| &f.schema))?,
                metadata_namespace: field(
                    "namespace",
                    known.as_ref().map(|f| &f.metadata_namespace),
                )?,
            },
            column: fields
                .get("column")
                .map_or(PassThroughCrosswalk::DEFAULT_COLUMN, |v| *v)
                .to_string(),
        });
    }
    Ok(formats)
}

fn static_sets(props: &Properties) -> Vec<SetSpec> {
    props
        .with_prefix("sets.")
        .map(|(_, value)| match value.split_once('|') {
            Some((spec, name)) => SetSpec::new(spec.trim()).with_name(name.trim()),
            None => SetSpec::new(value),
        })
        .collect()
}
