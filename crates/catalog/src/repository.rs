//! The pagination engine.
//!
//! [`Repository`] drives any [`Catalog`] through the OAI-PMH list state
//! machine. A fresh query goes to [`Catalog::query_range`]; when more records
//! remain, the cursor is stored in the [`TokenStore`] and a token is handed to
//! the harvester. A resumption resolves the token and continues through
//! [`Catalog::query_resume`]. Backends never see tokens.
//!
//! Token policy is uniform across backends: a token that is no longer held
//! (used, expired or purged) is rebuilt from its embedded query when the
//! catalog supports replay, and rejected with `badResumptionToken` otherwise.

use std::time::Instant;

use tracing::{debug, error};

use crate::config::{IdentifyConfig, RepositoryConfig};
use crate::core::{Catalog, CatalogPage, ResumeCursor};
use crate::error::{ConfigError, ConfigResult, OaiError, OaiResult};
use crate::factory::RecordFactory;
use crate::token::{ResumptionToken, TokenKind, TokenStore};
use crate::types::{
    Granularity, HarvestQuery, Identity, ListResponse, MetadataFormat, NativeRecord, Record,
    RecordHeader, ResumptionInfo, SetSpec,
};

/// Selective-harvesting arguments of a fresh list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestArgs {
    /// Lower datestamp bound, possibly partial.
    pub from: Option<String>,
    /// Upper datestamp bound, possibly partial.
    pub until: Option<String>,
    /// Set filter.
    pub set: Option<String>,
    /// Requested format.
    pub metadata_prefix: String,
}

impl HarvestArgs {
    /// Arguments selecting every record in a format.
    pub fn new(metadata_prefix: impl Into<String>) -> Self {
        Self {
            metadata_prefix: metadata_prefix.into(),
            ..Default::default()
        }
    }

    /// Sets the date range.
    pub fn with_range(mut self, from: impl Into<String>, until: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self.until = Some(until.into());
        self
    }

    /// Sets the set filter.
    pub fn with_set(mut self, set: impl Into<String>) -> Self {
        self.set = Some(set.into());
        self
    }
}

/// A list request: a fresh query or a resumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListRequest {
    /// Start a listing.
    Query(HarvestArgs),
    /// Continue a listing.
    Resume(String),
}

/// A page of native records before they are turned into headers or records.
struct Harvest {
    items: Vec<NativeRecord>,
    metadata_prefix: String,
    resumption: Option<ResumptionInfo>,
    resumed: bool,
}

/// An OAI-PMH repository over one catalog.
#[derive(Debug)]
pub struct Repository {
    catalog: Box<dyn Catalog>,
    factory: RecordFactory,
    tokens: TokenStore,
    page_size: usize,
    granularity: Granularity,
    identify: IdentifyConfig,
    static_sets: Vec<SetSpec>,
}

impl Repository {
    /// Creates a repository over an opened catalog.
    pub fn new(catalog: Box<dyn Catalog>, config: &RepositoryConfig) -> Self {
        let mut factory = RecordFactory::new(config.crosswalks(), config.granularity);
        if let Some(id) = &config.identify.repository_identifier {
            factory = factory.with_repository_identifier(id.clone());
        }
        Self {
            catalog,
            factory,
            tokens: TokenStore::new(config.token_ttl),
            page_size: config.max_list_size,
            granularity: config.granularity,
            identify: config.identify.clone(),
            static_sets: config.sets.clone(),
        }
    }

    /// Validates `config`, opens its backend and builds the repository.
    pub fn from_config(config: &RepositoryConfig) -> ConfigResult<Self> {
        config
            .validate()
            .map_err(|errors| ConfigError::Invalid { errors })?;
        let catalog = config.backend.open().map_err(|source| ConfigError::Backend {
            backend_name: config.backend.kind().to_string(),
            source,
        })?;
        Ok(Self::new(catalog, config))
    }

    /// The underlying catalog.
    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    /// The record factory.
    pub fn factory(&self) -> &RecordFactory {
        &self.factory
    }

    /// The token table.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Maximum number of items per list page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Describes the repository.
    pub fn identify(&self) -> OaiResult<Identity> {
        logged("Identify", self.describe())
    }

    /// Lists the formats of the repository, or of one item.
    pub fn list_metadata_formats(&self, identifier: Option<&str>) -> OaiResult<Vec<MetadataFormat>> {
        logged("ListMetadataFormats", self.formats(identifier))
    }

    /// Lists headers.
    pub fn list_identifiers(&self, request: ListRequest) -> OaiResult<ListResponse<RecordHeader>> {
        let result = self.harvest(request).map(|harvest| ListResponse {
            items: harvest.items.iter().map(|r| self.factory.header(r)).collect(),
            resumption: harvest.resumption,
        });
        logged("ListIdentifiers", result)
    }

    /// Lists records rendered in the requested format.
    pub fn list_records(&self, request: ListRequest) -> OaiResult<ListResponse<Record>> {
        let result = self.harvest(request).and_then(|harvest| {
            let items = harvest
                .items
                .iter()
                .map(|r| self.factory.render(r, &harvest.metadata_prefix))
                .collect::<OaiResult<Vec<_>>>()
                .map_err(|e| match e {
                    OaiError::CannotDisseminateFormat { .. } | OaiError::IdDoesNotExist { .. }
                        if harvest.resumed =>
                    {
                        OaiError::bad_token(format!("listing can no longer continue: {e}"))
                    }
                    other => other,
                })?;
            Ok(ListResponse {
                items,
                resumption: harvest.resumption,
            })
        });
        logged("ListRecords", result)
    }

    /// Lists the set hierarchy.
    pub fn list_sets(&self, resumption_token: Option<&str>) -> OaiResult<ListResponse<SetSpec>> {
        logged("ListSets", self.sets_page(resumption_token))
    }

    /// Fetches one record.
    pub fn get_record(&self, identifier: &str, metadata_prefix: &str) -> OaiResult<Record> {
        logged("GetRecord", self.fetch(identifier, metadata_prefix))
    }

    fn describe(&self) -> OaiResult<Identity> {
        let earliest = match self.catalog.earliest_datestamp()? {
            Some(datestamp) => self.granularity.normalize_datestamp(&datestamp).into_owned(),
            None => self.granularity.earliest().to_string(),
        };
        Ok(Identity {
            repository_name: self.identify.repository_name.clone(),
            base_url: self.identify.base_url.clone(),
            protocol_version: "2.0",
            admin_emails: self.identify.admin_emails.clone(),
            earliest_datestamp: earliest,
            deleted_record: self.identify.deleted_record,
            granularity: self.granularity.pattern().to_string(),
            repository_identifier: self.identify.repository_identifier.clone(),
        })
    }

    fn formats(&self, identifier: Option<&str>) -> OaiResult<Vec<MetadataFormat>> {
        match identifier {
            None => Ok(self
                .factory
                .crosswalks()
                .iter()
                .map(|c| c.format().clone())
                .collect()),
            Some(identifier) => {
                let (local, variants) = self.lookup(identifier)?;
                self.factory.formats_for(local, &variants)
            }
        }
    }

    fn fetch(&self, identifier: &str, metadata_prefix: &str) -> OaiResult<Record> {
        let (_, variants) = self.lookup(identifier)?;
        let cannot_disseminate = || OaiError::CannotDisseminateFormat {
            metadata_prefix: metadata_prefix.to_string(),
        };
        if self.factory.crosswalks().get(metadata_prefix).is_none() {
            return Err(cannot_disseminate());
        }
        let record = self
            .factory
            .select_variant(&variants, metadata_prefix)
            .ok_or_else(cannot_disseminate)?;
        self.factory.render(record, metadata_prefix)
    }

    /// Resolves a public identifier to its local form and every stored variant.
    fn lookup<'i>(&self, identifier: &'i str) -> OaiResult<(&'i str, Vec<NativeRecord>)> {
        let missing = || OaiError::IdDoesNotExist {
            identifier: identifier.to_string(),
        };
        let local = self.factory.to_local_identifier(identifier).ok_or_else(missing)?;
        let variants = self.catalog.get_variants(local)?;
        if variants.is_empty() {
            return Err(missing());
        }
        Ok((local, variants))
    }

    /// The catalog's sets, else the configured static list.
    fn set_hierarchy(&self) -> OaiResult<Vec<SetSpec>> {
        match self.catalog.list_sets()? {
            Some(sets) => Ok(sets),
            None if !self.static_sets.is_empty() => Ok(self.static_sets.clone()),
            None => Err(OaiError::NoSetHierarchy),
        }
    }

    fn harvest(&self, request: ListRequest) -> OaiResult<Harvest> {
        self.tokens.purge_expired(Instant::now());
        match request {
            ListRequest::Query(args) => self.start(args),
            ListRequest::Resume(token) => self.resume(&token),
        }
    }

    fn start(&self, args: HarvestArgs) -> OaiResult<Harvest> {
        let query = self.build_query(args)?;
        let metadata_prefix = query.metadata_prefix.clone();
        let filter = self.factory.format_filter(&metadata_prefix)?;
        debug!(
            catalog = self.catalog.name(),
            from = %query.from,
            until = %query.until,
            set = ?query.set,
            metadata_prefix = %query.metadata_prefix,
            "Starting listing"
        );

        let page = self.catalog.query_range(&query, &filter, self.page_size)?;
        if page.items.is_empty() {
            return Err(OaiError::NoItemsMatch);
        }

        let CatalogPage { items, resume, total } = page;
        let resumption = resume.map(|cursor| {
            let returned = items.len();
            self.continuation(cursor, 0, returned, total)
        });
        Ok(Harvest {
            items,
            metadata_prefix: query.metadata_prefix,
            resumption,
            resumed: false,
        })
    }

    fn resume(&self, token: &str) -> OaiResult<Harvest> {
        if ResumptionToken::decode(token)?.kind == TokenKind::Sets {
            return Err(OaiError::bad_token("token continues a set listing"));
        }
        let resolved = self.tokens.resolve(token, self.catalog.supports_replay())?;
        let cursor = resolved
            .cursor
            .ok_or_else(|| OaiError::bad_token("token carries no cursor"))?;

        let metadata_prefix = cursor.query().metadata_prefix.clone();
        let prefix = metadata_prefix.clone();
        let filter = self
            .factory
            .format_filter(&prefix)
            .map_err(|e| OaiError::bad_token(e.to_string()))?;

        let before = resolved.token.returned;
        let total = resolved.token.total;
        debug!(
            catalog = self.catalog.name(),
            id = resolved.token.id,
            position = cursor.position(),
            returned = before,
            "Resuming listing"
        );

        let page = self.catalog.query_resume(cursor, &filter, self.page_size)?;
        let CatalogPage { items, resume, .. } = page;
        let resumption = match resume {
            Some(cursor) => self.continuation(cursor, before, before + items.len(), total),
            None => ResumptionInfo {
                token: None,
                complete_list_size: total,
                cursor: before,
                expiration_date: None,
            },
        };
        Ok(Harvest {
            items,
            metadata_prefix,
            resumption: Some(resumption),
            resumed: true,
        })
    }

    /// Stores `cursor` and describes the token that continues after `returned` items.
    fn continuation(
        &self,
        cursor: ResumeCursor,
        before: usize,
        returned: usize,
        total: Option<usize>,
    ) -> ResumptionInfo {
        let kind = if cursor.is_replayable() {
            TokenKind::Replay
        } else {
            TokenKind::Live
        };
        let token = ResumptionToken::for_query(kind, cursor.query(), cursor.position(), returned, total);
        let issued = self.tokens.issue(token, Some(cursor));
        ResumptionInfo {
            token: Some(issued.token),
            complete_list_size: total,
            cursor: before,
            expiration_date: issued.expiration_date,
        }
    }

    fn build_query(&self, args: HarvestArgs) -> OaiResult<HarvestQuery> {
        if let (Some(from), Some(until)) = (&args.from, &args.until) {
            if Granularity::of(from.trim()) != Granularity::of(until.trim()) {
                return Err(OaiError::bad_argument(
                    "from and until must have the same granularity",
                ));
            }
        }

        let g = self.granularity;
        let from = match &args.from {
            Some(from) => g.normalize_from(from)?,
            None => g.earliest().to_string(),
        };
        let until = match &args.until {
            Some(until) => g.normalize_until(until)?,
            None => g.latest().to_string(),
        };
        if from > until {
            return Err(OaiError::bad_argument(format!(
                "from {from} is later than until {until}"
            )));
        }

        if args.set.is_some() {
            self.set_hierarchy()?;
        }

        Ok(HarvestQuery {
            from,
            until,
            set: args.set,
            metadata_prefix: args.metadata_prefix,
        })
    }

    fn sets_page(&self, resumption_token: Option<&str>) -> OaiResult<ListResponse<SetSpec>> {
        self.tokens.purge_expired(Instant::now());
        let sets = self.set_hierarchy()?;

        let start = match resumption_token {
            None => 0,
            Some(token) => {
                if ResumptionToken::decode(token)?.kind != TokenKind::Sets {
                    return Err(OaiError::bad_token("token does not continue a set listing"));
                }
                let resolved = self.tokens.resolve(token, true)?;
                if resolved.token.position > sets.len() {
                    return Err(OaiError::bad_token("token position is past the set list"));
                }
                resolved.token.position
            }
        };

        let end = (start + self.page_size).min(sets.len());
        let items = sets[start..end].to_vec();
        let resumption = if end < sets.len() {
            let issued = self
                .tokens
                .issue(ResumptionToken::for_sets(end, end, sets.len()), None);
            Some(ResumptionInfo {
                token: Some(issued.token),
                complete_list_size: Some(sets.len()),
                cursor: start,
                expiration_date: issued.expiration_date,
            })
        } else if resumption_token.is_some() {
            Some(ResumptionInfo {
                token: None,
                complete_list_size: Some(sets.len()),
                cursor: start,
                expiration_date: None,
            })
        } else {
            None
        };

        Ok(ListResponse { items, resumption })
    }
}

/// Logs internal failures with their source chain before they leave the library.
fn logged<T>(verb: &'static str, result: OaiResult<T>) -> OaiResult<T> {
    if let Err(OaiError::Internal(source)) = &result {
        error!(verb, error = %source, detail = ?source, "Internal repository error");
    }
    result
}
