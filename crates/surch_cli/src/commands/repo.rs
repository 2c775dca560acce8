//! Repo command - scans the history of one or more repositories.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context as _;
use surch_core::scan::{DEFAULT_CLONES_DIR, DEFAULT_WEB_HOST};
use surch_core::{Config, GitCli, HistoryScanner, ResultStore, ScanConfig, ScanError, ScanReport, SearchConfig};
use surch_vault::VaultSource;
use tracing::debug;

use crate::progress::CliProgress;
use crate::ui::{self, colors, format_duration, print_command_header};
use crate::{CONFIG_FILENAME, RepoArgs, TermSource};

/// Default directory results files are written to.
pub const DEFAULT_RESULTS_DIR: &str = ".surch/results";

/// Executes the `surch repo` command.
pub fn run(args: &RepoArgs) -> super::Result {
    let start = Instant::now();
    let config = load_config(args)?;
    let settings = Settings::resolve(args, &config)?;

    let terms = collect_terms(args, &config)?;
    if terms.is_empty() {
        return Err(ScanError::NoSearchTerms.into());
    }

    let urls = if args.urls.is_empty() { &config.repositories } else { &args.urls };
    if urls.is_empty() {
        anyhow::bail!("no repositories to scan: pass a URL or set `repositories` in {CONFIG_FILENAME}");
    }

    configure_thread_pool(settings.concurrency)?;

    let scanner = HistoryScanner::new(GitCli::new(), settings.scan.clone());
    let version = scanner.ensure_git()?;
    debug!(%version, "found git");

    // Reject every unusable URL before any clone is touched.
    let repos = urls
        .iter()
        .map(|url| scanner.repository(url))
        .collect::<Result<Vec<_>, _>>()?;

    print_command_header("repo");

    let mut rotated = BTreeSet::new();
    let mut written = BTreeSet::new();
    let mut total_findings = 0;

    for repo in &repos {
        let store_path = ResultStore::default_path(&settings.results_dir, repo.organization());

        // Rotate once per run so repositories of one organisation share a file.
        if settings.consolidate
            && rotated.insert(store_path.clone())
            && let Some(moved) = ResultStore::rotate(&store_path)?
        {
            ui::print_info(&format!("moved previous results to {}", moved.display()));
        }

        let mut store = ResultStore::open(&store_path)?;
        let progress = CliProgress::new(!settings.scan.verbose);
        let report = scanner.scan(repo, terms.terms(), &mut store, &progress)?;

        print_report(&report);
        total_findings += report.findings_written;
        written.insert(store_path);
    }

    if settings.print_results {
        for path in written.iter().filter(|p| p.is_file()) {
            super::results::print_file(path)?;
        }
    }

    if urls.len() > 1 {
        ui::print_success(&format!(
            "scanned {} repositories, {} {} in {}",
            urls.len(),
            total_findings,
            ui::pluralise_word(total_findings, "finding", "findings"),
            format_duration(start.elapsed())
        ));
    }

    Ok(())
}

/// Effective settings after merging flags over the config file.
#[derive(Debug)]
struct Settings {
    scan: ScanConfig,
    results_dir: PathBuf,
    concurrency: Option<usize>,
    print_results: bool,
    consolidate: bool,
}

impl Settings {
    fn resolve(args: &RepoArgs, config: &Config) -> anyhow::Result<Self> {
        let concurrency = args.concurrency.or(config.concurrency);

        let scan = ScanConfig {
            clones_dir: args
                .clones_dir
                .clone()
                .or_else(|| config.clones_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CLONES_DIR)),
            default_web_host: args
                .web_host
                .clone()
                .or_else(|| config.web_host.clone())
                .unwrap_or_else(|| DEFAULT_WEB_HOST.to_string()),
            verbose: args.verbose || config.verbose,
            retry: config.retry_policy().context("loading retry settings")?,
            parallel: concurrency.is_some_and(|n| n != 1),
            remove_clone: args.remove_clone || config.remove_clone,
        };

        Ok(Self {
            scan,
            results_dir: args
                .results_dir
                .clone()
                .or_else(|| config.results_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR)),
            concurrency,
            print_results: args.print || config.print_results,
            consolidate: args.consolidate || config.consolidate,
        })
    }
}

/// Loads the config named by `--config`, which must exist, or `.surch.toml`
/// in the working directory if present.
fn load_config(args: &RepoArgs) -> anyhow::Result<Config> {
    let (path, explicit) = match &args.config {
        Some(path) => (path.as_path(), true),
        None => (Path::new(CONFIG_FILENAME), false),
    };

    if args.source == TermSource::Vault && !path.is_file() {
        anyhow::bail!("--source vault requires a config file ({} not found)", path.display());
    }

    let config = if explicit {
        Config::load(path)
    } else {
        Config::load_or_default(path)
    }
    .context("loading config")?;

    Ok(config)
}

/// Merges terms from the command line, the config file and, if requested,
/// Vault. The first occurrence of a term wins.
fn collect_terms(args: &RepoArgs, config: &Config) -> anyhow::Result<SearchConfig> {
    let mut terms = SearchConfig::new()
        .merge(args.search.iter().map(String::as_str))
        .merge(config.search.iter().cloned());

    if args.source == TermSource::Vault {
        let vault_terms = fetch_vault_terms(config)?;
        ui::print_info(&format!(
            "fetched {} search {} from vault",
            vault_terms.len(),
            ui::pluralise_word(vault_terms.len(), "term", "terms")
        ));
        terms = terms.merge(vault_terms);
    }

    debug!(terms = terms.len(), "collected search terms");
    Ok(terms)
}

fn fetch_vault_terms(config: &Config) -> anyhow::Result<Vec<String>> {
    let settings = config.vault_settings().context("loading vault settings")?;
    let source = VaultSource::new(
        &settings.url,
        &settings.token,
        &settings.secret_path,
        &settings.key_list,
    )
    .context("configuring vault client")?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create async runtime")?;

    rt.block_on(source.fetch_terms())
        .with_context(|| format!("fetching search terms from vault at {}", settings.url))
}

/// Configures the global rayon thread pool with the requested number of
/// threads, if specified.
fn configure_thread_pool(concurrency: Option<usize>) -> anyhow::Result<()> {
    if let Some(n) = concurrency.filter(|n| *n > 1) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("failed to configure thread pool")?;
    }
    Ok(())
}

fn print_report(report: &ScanReport) {
    let findings = report.findings_written;

    ui::print_success(&format!(
        "{}: {} {} in {} {} ({})",
        colors::accent().apply_to(&report.repository),
        findings,
        ui::pluralise_word(findings, "finding", "findings"),
        report.commits_scanned,
        ui::pluralise_word(report.commits_scanned, "commit", "commits"),
        format_duration(report.elapsed)
    ));

    if findings > 0 {
        ui::print_info(&format!("results written to {}", report.store_path.display()));
    }

    if report.clone_removed {
        ui::print_info("removed local clone");
    }

    for error in report.errors.entries() {
        ui::print_warning(error);
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        args: RepoArgs,
    }

    fn args(argv: &[&str]) -> RepoArgs {
        Harness::parse_from(std::iter::once("surch").chain(argv.iter().copied())).args
    }

    #[test]
    fn flags_override_config() {
        let config = Config::from_toml(
            r#"
            clones_dir = "/from/config"
            results_dir = "/results/config"
            concurrency = 1
        "#,
        )
        .unwrap();

        let settings = Settings::resolve(&args(&["-p", "/from/flag", "--concurrency", "4"]), &config).unwrap();

        assert_eq!(settings.scan.clones_dir, PathBuf::from("/from/flag"));
        assert_eq!(settings.results_dir, PathBuf::from("/results/config"));
        assert!(settings.scan.parallel);
    }

    #[test]
    fn defaults_apply_without_config() {
        let settings = Settings::resolve(&args(&[]), &Config::default()).unwrap();

        assert_eq!(settings.scan.clones_dir, PathBuf::from(DEFAULT_CLONES_DIR));
        assert_eq!(settings.results_dir, PathBuf::from(DEFAULT_RESULTS_DIR));
        assert_eq!(settings.scan.default_web_host, DEFAULT_WEB_HOST);
        assert!(!settings.scan.parallel);
        assert!(!settings.print_results);
    }

    #[test]
    fn boolean_flags_combine_with_config() {
        let config = Config::from_toml("remove_clone = true\nconsolidate = true").unwrap();

        let settings = Settings::resolve(&args(&["--print"]), &config).unwrap();

        assert!(settings.scan.remove_clone);
        assert!(settings.consolidate);
        assert!(settings.print_results);
    }

    #[test]
    fn cli_terms_come_before_config_terms() {
        let config = Config::from_toml(r#"search = ["token", "password"]"#).unwrap();

        let terms = collect_terms(&args(&["-s", "password", "-s", "AKIA"]), &config).unwrap();

        let names: Vec<&str> = terms.terms().iter().map(|t| t.as_str()).collect();
        assert_eq!(names, vec!["password", "AKIA", "token"]);
    }

    #[test]
    fn vault_source_without_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let missing = missing.to_str().unwrap();

        let err = load_config(&args(&["--source", "vault", "-c", missing])).unwrap_err();

        assert!(err.to_string().contains("requires a config file"));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        assert!(load_config(&args(&["-c", missing.to_str().unwrap()])).is_err());
    }
}
