//! The scan orchestrator.
//!
//! A scan moves through a fixed sequence of phases:
//!
//! ```text
//! Start → Acquiring → Enumerating → Scanning → Assembling → Reporting → Done
//! ```
//!
//! Only an empty term set or a result-store failure stops a scan. Everything
//! that goes wrong with the repository itself is collected in the
//! [`ErrorSummary`] and the scan carries on with whatever it has.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, error, info, info_span, warn};

use crate::acquire::Acquirer;
use crate::assemble::ResultAssembler;
use crate::attribution::{AttributionCache, AttributionResolver};
use crate::enumerate::CommitEnumerator;
use crate::error::ScanError;
use crate::finding::{Finding, RawHit};
use crate::git::{Git, GitCli};
use crate::pattern::{SearchExpression, SearchTerm};
use crate::repository::Repository;
use crate::retry::RetryPolicy;
use crate::search::{CommitSearcher, SearchOutcome};
use crate::store::ResultStore;

/// Default clone directory, relative to the working directory.
pub const DEFAULT_CLONES_DIR: &str = ".surch/clones";

/// Default web host for deep links.
pub const DEFAULT_WEB_HOST: &str = "https://github.com";

/// Settings for a [`HistoryScanner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Root under which clones live as `<organization>/<repository>`.
    pub clones_dir: PathBuf,
    /// Host used for deep links when a URL does not name one.
    pub default_web_host: String,
    /// Let git print its progress and log it.
    pub verbose: bool,
    /// Retry policy for clone and pull.
    pub retry: RetryPolicy,
    /// Search commits and resolve attribution on the rayon pool.
    pub parallel: bool,
    /// Delete the clone once the scan is finished.
    pub remove_clone: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            clones_dir: PathBuf::from(DEFAULT_CLONES_DIR),
            default_web_host: DEFAULT_WEB_HOST.to_string(),
            verbose: false,
            retry: RetryPolicy::default(),
            parallel: false,
            remove_clone: false,
        }
    }
}

/// Pipeline phase, reported to [`ScanProgress`] observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Terms compiled, nothing touched yet.
    Start,
    /// Cloning or pulling.
    Acquiring,
    /// Listing commits.
    Enumerating,
    /// Running `git grep` on each commit.
    Scanning,
    /// Resolving attribution and writing findings.
    Assembling,
    /// Building the report and cleaning up.
    Reporting,
    /// Finished.
    Done,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Acquiring => "acquiring",
            Self::Enumerating => "enumerating",
            Self::Scanning => "scanning",
            Self::Assembling => "assembling",
            Self::Reporting => "reporting",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Observer for scan progress. Called from worker threads in parallel mode.
pub trait ScanProgress: Sync {
    /// A new phase began.
    fn phase(&self, _phase: ScanPhase, _repo: &Repository) {}

    /// The number of commits that will be scanned is known.
    fn commits_found(&self, _total: usize) {}

    /// One commit finished scanning.
    fn commit_scanned(&self) {}
}

/// A [`ScanProgress`] that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ScanProgress for NoProgress {}

/// Recoverable, repository-level errors collected during a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSummary {
    entries: Vec<String>,
}

impl ErrorSummary {
    /// Creates an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error.
    pub fn push(&mut self, message: impl Into<String>) {
        self.entries.push(message.into());
    }

    /// The recorded errors in order.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Number of recorded errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing went wrong.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a finished scan did.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// `organization/repository`.
    pub repository: String,
    /// Commits that were searched.
    pub commits_scanned: usize,
    /// Findings appended to the store.
    pub findings_written: usize,
    /// Wall-clock duration of the scan.
    pub elapsed: Duration,
    /// Recoverable errors.
    pub errors: ErrorSummary,
    /// The store findings were written to.
    pub store_path: PathBuf,
    /// Whether the clone was deleted afterwards.
    pub clone_removed: bool,
}

/// Search failures grouped by cause, so one bad pattern yields one entry
/// however many commits it fails on.
#[derive(Debug, Default)]
struct ToolErrors {
    /// detail -> (first commit seen, commits failed)
    by_detail: BTreeMap<String, (String, usize)>,
}

impl ToolErrors {
    fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, detail: String, commit: &str) {
        self.by_detail
            .entry(detail)
            .and_modify(|(_, count)| *count += 1)
            .or_insert_with(|| (commit.to_string(), 1));
    }

    fn messages(self, repo: &Repository) -> impl Iterator<Item = String> {
        let repo = repo.to_string();
        self.by_detail.into_iter().map(move |(detail, (commit, count))| {
            if count == 1 {
                format!("search failed for commit {commit} of {repo}: {detail}")
            } else {
                format!("search failed for {count} commits of {repo}, including {commit}: {detail}")
            }
        })
    }
}

/// Scans the full history of repositories for search terms.
///
/// Generic over the [`Git`] implementation so the pipeline can run against a
/// scripted fake.
#[derive(Debug)]
pub struct HistoryScanner<G: Git = GitCli> {
    git: G,
    config: ScanConfig,
}

impl<G: Git> HistoryScanner<G> {
    /// Creates a scanner.
    #[must_use]
    pub fn new(git: G, config: ScanConfig) -> Self {
        Self { git, config }
    }

    /// The scanner's settings.
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Checks that git can be executed and returns its version line.
    pub fn ensure_git(&self) -> Result<String, ScanError> {
        self.git
            .version()
            .map(|out| out.trim().to_string())
            .map_err(|source| ScanError::GitUnavailable { source })
    }

    /// Resolves a URL into a [`Repository`] under this scanner's clone root.
    ///
    /// Fails with [`ScanError::InvalidRepository`] when the names derived
    /// from the URL are not usable as directories.
    pub fn repository(&self, url: &str) -> Result<Repository, ScanError> {
        Ok(Repository::from_url(url, &self.config.clones_dir, &self.config.default_web_host)?)
    }

    /// Runs the full pipeline for one repository and appends findings to
    /// `store`.
    ///
    /// Returns [`ScanError::NoSearchTerms`] before touching the repository
    /// when `terms` is empty.
    pub fn scan(
        &self,
        repo: &Repository,
        terms: &[SearchTerm],
        store: &mut ResultStore,
        progress: &dyn ScanProgress,
    ) -> Result<ScanReport, ScanError> {
        let expression = SearchExpression::compile(terms)?;

        let _span = info_span!("scan", repo = %repo).entered();
        let started = Instant::now();
        let errors = Mutex::new(ErrorSummary::new());
        let record = |message: String| {
            errors.lock().unwrap_or_else(PoisonError::into_inner).push(message);
        };

        self.enter(ScanPhase::Start, repo, progress);

        self.enter(ScanPhase::Acquiring, repo, progress);
        let acquired = match Acquirer::new(&self.git, self.config.retry, self.config.verbose).acquire(repo) {
            Ok(()) => true,
            Err(err) => {
                error!(repo = %repo, error = %err, "failed to sync repo");
                record(format!("failed to sync {repo} from {}: {err}", repo.remote()));
                false
            }
        };

        self.enter(ScanPhase::Enumerating, repo, progress);
        let commits = match CommitEnumerator::new(&self.git).commits(repo.local_path()) {
            Ok(commits) => commits,
            Err(err) if acquired => {
                error!(repo = %repo, error = %err, "failed to list commits");
                record(format!("failed to list commits of {repo}: {err}"));
                Vec::new()
            }
            Err(err) => {
                debug!(repo = %repo, error = %err, "no commits to list after failed sync");
                Vec::new()
            }
        };
        progress.commits_found(commits.len());

        self.enter(ScanPhase::Scanning, repo, progress);
        info!(
            repo = %repo,
            commits = commits.len(),
            terms = expression.len(),
            "scanning commits"
        );
        let searcher = CommitSearcher::new(&self.git, repo.local_path(), &expression);
        let tool_errors = Mutex::new(ToolErrors::new());
        let scan_commit = |commit: &String| -> Option<Vec<RawHit>> {
            let outcome = searcher.search(commit);
            progress.commit_scanned();
            match outcome {
                SearchOutcome::Matched(hits) => Some(hits),
                SearchOutcome::NoMatch => None,
                SearchOutcome::ToolError(detail) => {
                    debug!(commit = %commit, error = %detail, "search failed");
                    tool_errors
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .add(detail, commit);
                    None
                }
            }
        };
        let matched: Vec<Vec<RawHit>> = if self.config.parallel {
            commits.par_iter().filter_map(scan_commit).collect()
        } else {
            commits.iter().filter_map(scan_commit).collect()
        };
        for message in tool_errors.into_inner().unwrap_or_else(PoisonError::into_inner).messages(repo) {
            warn!(repo = %repo, error = %message, "search failed");
            record(message);
        }

        self.enter(ScanPhase::Assembling, repo, progress);
        let cache = AttributionCache::new();
        let assembler = ResultAssembler::new(AttributionResolver::new(&self.git, repo.local_path()), &cache, repo);
        let findings: Vec<Finding> = if self.config.parallel {
            matched.par_iter().flat_map_iter(|hits| assembler.assemble(hits)).collect()
        } else {
            matched.iter().flat_map(|hits| assembler.assemble(hits)).collect()
        };
        debug!(path = %store.path().display(), findings = findings.len(), "writing results");
        let findings_written = store.append(&findings)?;

        self.enter(ScanPhase::Reporting, repo, progress);
        let clone_removed = self.config.remove_clone && self.remove_clone(repo, &record);

        let elapsed = started.elapsed();
        info!(
            repo = %repo,
            findings = findings_written,
            commits = commits.len(),
            lookups = cache.len(),
            ?elapsed,
            "scan complete"
        );
        self.enter(ScanPhase::Done, repo, progress);

        Ok(ScanReport {
            repository: repo.to_string(),
            commits_scanned: commits.len(),
            findings_written,
            elapsed,
            errors: errors.into_inner().unwrap_or_else(PoisonError::into_inner),
            store_path: store.path().to_path_buf(),
            clone_removed,
        })
    }

    fn enter(&self, phase: ScanPhase, repo: &Repository, progress: &dyn ScanProgress) {
        debug!(%phase, "entering phase");
        progress.phase(phase, repo);
    }

    fn remove_clone(&self, repo: &Repository, record: &dyn Fn(String)) -> bool {
        let path = repo.local_path();
        match crate::fs_util::remove_dir_if_exists(path) {
            Ok(removed) => {
                if removed {
                    info!(path = %path.display(), "removed clone");
                }
                removed
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to remove clone");
                record(format!("failed to remove clone '{}': {err}", path.display()));
                false
            }
        }
    }
}
