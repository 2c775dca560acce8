//! Per-commit `git grep`.

use std::path::Path;

use tracing::trace;

use crate::finding::RawHit;
use crate::git::{Git, GitError};
use crate::pattern::SearchExpression;

/// Exit status `git grep` uses for "nothing matched".
const NO_MATCH_EXIT_CODE: i32 = 1;

/// Result of searching one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// At least one file matched. Holds the raw output lines.
    Matched(Vec<RawHit>),
    /// The search ran and nothing matched.
    NoMatch,
    /// The search itself failed (bad pattern, missing object, spawn error).
    /// Holds [`GitError::detail`], which does not name the commit.
    ToolError(String),
}

impl SearchOutcome {
    /// The hits of a `Matched` outcome, empty otherwise.
    #[must_use]
    pub fn hits(&self) -> &[RawHit] {
        match self {
            Self::Matched(hits) => hits,
            Self::NoMatch | Self::ToolError(_) => &[],
        }
    }
}

/// Runs the compiled expression against individual commit trees.
#[derive(Clone, Copy)]
pub struct CommitSearcher<'a> {
    git: &'a dyn Git,
    repo: &'a Path,
    expression: &'a SearchExpression,
}

impl std::fmt::Debug for CommitSearcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitSearcher")
            .field("repo", &self.repo)
            .field("terms", &self.expression.len())
            .finish_non_exhaustive()
    }
}

impl<'a> CommitSearcher<'a> {
    /// Creates a searcher for the working copy at `repo`.
    #[must_use]
    pub fn new(git: &'a dyn Git, repo: &'a Path, expression: &'a SearchExpression) -> Self {
        Self { git, repo, expression }
    }

    /// Searches the tree of `commit`.
    #[must_use]
    pub fn search(&self, commit: &str) -> SearchOutcome {
        let outcome = classify(self.git.grep(self.repo, self.expression, commit));
        trace!(commit, hits = outcome.hits().len(), "searched commit");
        outcome
    }
}

/// Maps a `git grep -l` result onto a [`SearchOutcome`].
#[must_use]
pub fn classify(result: Result<String, GitError>) -> SearchOutcome {
    match result {
        Ok(stdout) => {
            let hits = parse_grep_output(&stdout);
            if hits.is_empty() {
                SearchOutcome::NoMatch
            } else {
                SearchOutcome::Matched(hits)
            }
        }
        Err(err) if err.exit_code() == Some(NO_MATCH_EXIT_CODE) => SearchOutcome::NoMatch,
        Err(err) => SearchOutcome::ToolError(err.detail()),
    }
}

/// Splits `git grep -l` output into raw hits, skipping blank records.
///
/// Output containing a NUL is read as `-z` records, where a path may hold
/// any character including newlines. Anything else is read line by line.
#[must_use]
pub fn parse_grep_output(stdout: &str) -> Vec<RawHit> {
    let records: Vec<&str> = if stdout.contains('\0') {
        stdout.split('\0').collect()
    } else {
        stdout.lines().map(|line| line.trim_end_matches('\r')).collect()
    };

    records
        .into_iter()
        .filter(|record| !record.trim().is_empty())
        .map(RawHit::new)
        .collect()
}
