//! Command line configuration.
//!
//! Every flag can also be supplied through an environment variable.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OAISERVE_CONFIG` | | Properties file with repository settings |
//! | `OAISERVE_PROPERTIES` | | Comma-separated `key=value` overrides |
//! | `OAISERVE_VERB` | Identify | Verb to execute |
//! | `OAISERVE_LOG_LEVEL` | warn | Log level |
//!
//! # Example
//!
//! ```text
//! oaiserve --config repo.properties --verb ListRecords --metadata-prefix oai_dc --follow
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use oaiserve_catalog::config::Properties;

const LIST_VERBS: [&str; 3] = ["ListIdentifiers", "ListRecords", "ListSets"];

/// Command line configuration for a single repository request.
#[derive(Debug, Clone, Parser)]
#[command(name = "oaiserve")]
#[command(about = "Answer OAI-PMH requests against a configured repository")]
pub struct CliConfig {
    /// Properties file holding the repository configuration.
    #[arg(short, long, env = "OAISERVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Property override as `key=value`; may be repeated.
    #[arg(
        short = 'D',
        long = "property",
        env = "OAISERVE_PROPERTIES",
        value_delimiter = ','
    )]
    pub properties: Vec<String>,

    /// Verb to execute.
    #[arg(long, env = "OAISERVE_VERB", default_value = "Identify")]
    pub verb: String,

    /// `identifier` argument.
    #[arg(long)]
    pub identifier: Option<String>,

    /// `metadataPrefix` argument.
    #[arg(long)]
    pub metadata_prefix: Option<String>,

    /// `from` argument.
    #[arg(long)]
    pub from: Option<String>,

    /// `until` argument.
    #[arg(long)]
    pub until: Option<String>,

    /// `set` argument.
    #[arg(long)]
    pub set: Option<String>,

    /// `resumptionToken` argument.
    #[arg(long)]
    pub resumption_token: Option<String>,

    /// Keep requesting pages until the list is exhausted.
    #[arg(long, default_value = "false")]
    pub follow: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "OAISERVE_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

impl CliConfig {
    /// Loads the properties file, then applies overrides in order.
    pub fn load_properties(&self) -> anyhow::Result<Properties> {
        let mut props = match &self.config {
            Some(path) => Properties::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => Properties::new(),
        };
        for entry in &self.properties {
            let (key, value) = split_property(entry)
                .with_context(|| format!("Invalid property override '{entry}'"))?;
            props.set(key, value);
        }
        Ok(props)
    }

    /// The protocol arguments given on the command line, in protocol names.
    pub fn verb_args(&self) -> Vec<(String, String)> {
        [
            ("identifier", &self.identifier),
            ("metadataPrefix", &self.metadata_prefix),
            ("from", &self.from),
            ("until", &self.until),
            ("set", &self.set),
            ("resumptionToken", &self.resumption_token),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| (name.to_string(), v.clone())))
        .collect()
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.config.is_none() && self.properties.is_empty() {
            errors.push("Either --config or at least one --property is required".to_string());
        }

        for entry in &self.properties {
            if split_property(entry).is_none() {
                errors.push(format!("Property override '{entry}' must be key=value"));
            }
        }

        if self.follow && !LIST_VERBS.contains(&self.verb.as_str()) {
            errors.push(format!("--follow only applies to list verbs, not {}", self.verb));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn split_property(entry: &str) -> Option<(&str, &str)> {
    let (key, value) = entry.split_once('=')?;
    let key = key.trim();
    (!key.is_empty()).then_some((key, value.trim()))
}
