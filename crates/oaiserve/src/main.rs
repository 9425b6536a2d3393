//! oaiserve
//!
//! Runs one OAI-PMH request against a configured repository and prints the
//! result as JSON. Protocol errors are printed the same way with their OAI
//! error code and the HTTP status a web dispatcher would answer with.

mod config;

use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use oaiserve_catalog::config::RepositoryConfig;
use oaiserve_catalog::verbs::VerbRegistry;
use oaiserve_catalog::{OaiError, Repository, VerbResponse};
use serde_json::json;
use tracing::{debug, info};

use crate::config::CliConfig;

/// Exit status when the request ended with a protocol error.
const PROTOCOL_ERROR: u8 = 2;

/// Initializes tracing output on stderr.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("oaiserve={level},oaiserve_catalog={level}"))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Builds the repository described by the command line.
fn open_repository(config: &CliConfig) -> anyhow::Result<Repository> {
    let props = config.load_properties()?;
    let repo_config = RepositoryConfig::from_properties(&props)
        .context("Invalid repository configuration")?;
    info!(
        backend = %repo_config.backend.kind(),
        max_list_size = repo_config.max_list_size,
        granularity = %repo_config.granularity,
        "Opening repository"
    );
    Repository::from_config(&repo_config).context("Failed to open repository")
}

/// Executes the request, writing one JSON document per page to `out`.
///
/// Returns the process exit status.
fn run(config: &CliConfig, repo: &Repository, out: &mut impl Write) -> anyhow::Result<u8> {
    let registry = VerbRegistry::standard();
    let mut args = config.verb_args();
    let mut pages = 0usize;

    loop {
        let response = match registry.dispatch(repo, &config.verb, &args) {
            Ok(response) => response,
            Err(err) => {
                write_error(out, &err)?;
                return Ok(PROTOCOL_ERROR);
            }
        };
        pages += 1;
        serde_json::to_writer(&mut *out, &response)?;
        writeln!(out)?;

        match next_request(config, &response) {
            Some(token) => args = vec![("resumptionToken".to_string(), token)],
            None => break,
        }
    }

    debug!(verb = %config.verb, pages, "Request complete");
    Ok(0)
}

fn next_request(config: &CliConfig, response: &VerbResponse) -> Option<String> {
    if !config.follow {
        return None;
    }
    response.next_token().map(str::to_string)
}

fn write_error(out: &mut impl Write, err: &OaiError) -> anyhow::Result<()> {
    let body = json!({
        "error": {
            "code": err.code(),
            "message": err.public_message(),
            "status": err.http_status(),
        }
    });
    serde_json::to_writer(&mut *out, &body)?;
    writeln!(out)?;
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let repo = open_repository(&config)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    Ok(ExitCode::from(run(&config, &repo, &mut out)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"<records>
        <record><header><identifier>a</identifier><datestamp>2021-06-01</datestamp></header>
          <metadata><dc>A</dc></metadata></record>
        <record><header><identifier>b</identifier><datestamp>2021-06-02</datestamp></header>
          <metadata><dc>B</dc></metadata></record>
        <record><header status="deleted"><identifier>c</identifier><datestamp>2021-06-03</datestamp></header></record>
    </records>"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        base: Vec<String>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("records.xml");
        std::fs::write(&source, DOCUMENT).unwrap();
        let props = dir.path().join("repo.properties");
        std::fs::write(
            &props,
            format!(
                "catalog.backend=xml\n\
                 catalog.maxListSize=2\n\
                 identify.repositoryName=CLI Test\n\
                 identify.baseUrl=http://localhost/oai\n\
                 identify.adminEmail=admin@example.org\n\
                 xml.sourceFile={}\n",
                source.display()
            ),
        )
        .unwrap();
        let base = vec![
            "oaiserve".to_string(),
            "--config".to_string(),
            props.display().to_string(),
        ];
        Fixture { _dir: dir, base }
    }

    fn execute(fixture: &Fixture, args: &[&str]) -> (u8, Vec<serde_json::Value>) {
        let argv = fixture.base.iter().map(String::as_str).chain(args.iter().copied());
        let config = CliConfig::try_parse_from(argv).unwrap();
        let repo = open_repository(&config).unwrap();
        let mut out = Vec::new();
        let code = run(&config, &repo, &mut out).unwrap();
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        (code, lines)
    }

    #[test]
    fn test_identify() {
        let fixture = fixture();
        let (code, pages) = execute(&fixture, &[]);
        assert_eq!(code, 0);
        assert_eq!(pages[0]["verb"], "Identify");
        assert_eq!(pages[0]["result"]["repository_name"], "CLI Test");
    }

    #[test]
    fn test_follow_collects_every_page() {
        let fixture = fixture();
        let (_, pages) = execute(
            &fixture,
            &["--verb", "ListIdentifiers", "--metadata-prefix", "oai_dc", "--follow"],
        );
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0]["result"]["items"].as_array().unwrap().len(), 2);
        assert_eq!(pages[1]["result"]["items"][0]["identifier"], "c");
        assert_eq!(pages[1]["result"]["items"][0]["deleted"], true);
    }

    #[test]
    fn test_without_follow_stops_after_one_page() {
        let fixture = fixture();
        let (_, pages) = execute(
            &fixture,
            &["--verb", "ListRecords", "--metadata-prefix", "oai_dc"],
        );
        assert_eq!(pages.len(), 1);
        assert!(pages[0]["result"]["resumption"]["token"].is_string());
    }

    #[test]
    fn test_protocol_error_output() {
        let fixture = fixture();
        let (code, pages) = execute(
            &fixture,
            &["--verb", "GetRecord", "--identifier", "zzz", "--metadata-prefix", "oai_dc"],
        );
        assert_eq!(code, PROTOCOL_ERROR);
        assert_eq!(pages[0]["error"]["code"], "idDoesNotExist");
        assert_eq!(pages[0]["error"]["status"], 404);
    }

    #[test]
    fn test_bad_verb() {
        let fixture = fixture();
        let (_, pages) = execute(&fixture, &["--verb", "Harvest"]);
        assert_eq!(pages[0]["error"]["code"], "badVerb");
    }

    #[test]
    fn test_invalid_repository_config() {
        let config = CliConfig::try_parse_from([
            "oaiserve",
            "-D",
            "catalog.backend=tape",
            "-D",
            "catalog.maxListSize=5",
        ])
        .unwrap();
        assert!(open_repository(&config).is_err());
    }
}
