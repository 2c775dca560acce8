//! Results command - prints a results file.

use std::io::Write;
use std::path::Path;

use anyhow::Context as _;
use console::style;
use surch_core::{Finding, ResultStore};

use crate::ResultsArgs;
use crate::ui::{self, colors, indicators};

/// Executes the `surch results` command.
pub fn run(args: &ResultsArgs) -> super::Result {
    if !args.path.is_file() {
        anyhow::bail!("results file not found: {}", args.path.display());
    }

    if args.json {
        let store = open(&args.path)?;
        let stdout = std::io::stdout();
        let mut writer = stdout.lock();
        writeln!(writer, "{}", store.to_json()?)?;
        return Ok(());
    }

    print_file(&args.path)
}

/// Prints every finding in the results file at `path`.
pub fn print_file(path: &Path) -> super::Result {
    let store = open(path)?;
    let findings = store.findings();

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();
    write_findings(path, &findings, &mut writer)
}

fn open(path: &Path) -> anyhow::Result<ResultStore> {
    ResultStore::open(path).with_context(|| format!("reading results from {}", path.display()))
}

fn write_findings(path: &Path, findings: &[Finding], writer: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(writer)?;

    for finding in findings {
        write_finding(finding, writer)?;
    }

    writeln!(
        writer,
        "{} {} {} in {}",
        colors::info().apply_to(indicators::INFO),
        colors::primary().apply_to(findings.len()),
        ui::pluralise_word(findings.len(), "finding", "findings"),
        colors::muted().apply_to(path.display()),
    )?;
    writeln!(writer)?;

    Ok(())
}

fn write_finding(finding: &Finding, writer: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(
        writer,
        "{} {} {} {}",
        colors::warning().apply_to(indicators::FINDING),
        style(&finding.filepath).bold(),
        colors::muted().apply_to("·"),
        colors::accent().apply_to(format!("{}/{}", finding.organization_name, finding.repository_name)),
    )?;

    writeln!(
        writer,
        "  {} {} {}",
        colors::emphasis().apply_to(ui::short_hash(&finding.commit_sha)),
        colors::secondary().apply_to(&finding.username),
        colors::muted().apply_to(format!("<{}>", finding.email)),
    )?;

    writeln!(writer, "  {}", colors::secondary().apply_to(&finding.commit_time))?;

    writeln!(
        writer,
        "  {} {}",
        colors::muted().apply_to("└─"),
        colors::secondary().apply_to(&finding.blob_url),
    )?;

    writeln!(writer)?;
    Ok(())
}
