//! # Commands
//!
//! - `surch repo` - Scan the full history of git repositories for strings
//! - `surch results` - Print a results file

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;
mod progress;
mod ui;

use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use console::style;
pub use surch_core::CONFIG_FILENAME;

use crate::ui::colors;

const REPO_URL: &str = "https://github.com/cloudify-cosmo/surch";

#[derive(Debug, Parser)]
#[command(
    name = "surch",
    version,
    styles = ui::clap_styles(),
    arg_required_else_help = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(visible_alias = "r")]
    Repo(RepoArgs),

    Results(ResultsArgs),
}

/// Where search terms come from in addition to the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TermSource {
    /// Terms from `-s` and the config file.
    #[default]
    Config,
    /// Also fetch terms from the Vault server named in the config file.
    Vault,
}

/// Arguments for the `surch repo` command.
#[derive(Debug, Parser)]
pub struct RepoArgs {
    /// Repository URLs to scan. Defaults to `repositories` from the config file.
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// String to search for (repeatable).
    #[arg(short = 's', long = "search", value_name = "TERM")]
    pub search: Vec<String>,

    /// Path to `.surch.toml` configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory clones are kept in.
    #[arg(short = 'p', long, value_name = "DIR")]
    pub clones_dir: Option<PathBuf>,

    /// Directory results files are written to.
    #[arg(short = 'l', long, value_name = "DIR")]
    pub results_dir: Option<PathBuf>,

    /// Additional source of search terms.
    #[arg(long, value_enum, default_value_t)]
    pub source: TermSource,

    /// Web host for result links when a URL does not name one.
    #[arg(long, value_name = "URL")]
    pub web_host: Option<String>,

    /// Print the results file when done.
    #[arg(long)]
    pub print: bool,

    /// Move an existing results file aside before scanning.
    #[arg(long)]
    pub consolidate: bool,

    /// Delete each clone after scanning it.
    #[arg(short = 'R', long)]
    pub remove_clone: bool,

    /// Number of parallel scanning threads.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Show git output and debug logs.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for the `surch results` command.
#[derive(Debug, Parser)]
pub struct ResultsArgs {
    /// Results file to print.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Print the raw JSON document.
    #[arg(long)]
    pub json: bool,
}

fn main() {
    let cli = parse_cli();

    #[cfg(feature = "tracing")]
    init_tracing(matches!(&cli.command, Command::Repo(args) if args.verbose));

    if let Err(e) = run(cli.command) {
        ui::print_error(&format!("{e:#}"));
        std::process::exit(ui::exit::ERROR);
    }
}

#[cfg(feature = "tracing")]
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn parse_cli() -> Cli {
    let cmd = Cli::command().about(build_about()).after_help(build_after_help());

    let matches = cmd.get_matches();

    #[expect(clippy::expect_used, reason = "clap already validated args; this cannot fail")]
    Cli::from_arg_matches(&matches).expect("failed to parse arguments")
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Repo(args) => commands::repo::run(&args),
        Command::Results(args) => commands::results::run(&args),
    }
}

fn build_about() -> String {
    format!(
        r"
  {} searches the entire history of git repositories for strings.

  Every commit on every branch is searched, so secrets that were
  committed and later removed are still found.",
        colors::accent().apply_to("surch").bold()
    )
}

fn build_after_help() -> String {
    format!(
        r"
  {}
    surch repo https://github.com/acme/widgets.git -s password
    surch repo URL -s AKIA -s secret_key     Search for several strings
    surch repo URL --source vault            Add terms from Vault
    surch repo URL -s token -R --print       Remove clone, print results
    surch results .surch/results/acme/results.json

  Learn more: {}",
        style("Examples:").bold(),
        colors::accent().apply_to(REPO_URL).underlined()
    )
}
