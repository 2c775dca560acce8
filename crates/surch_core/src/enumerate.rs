//! Commit enumeration.

use std::path::Path;

use tracing::debug;

use crate::git::{Git, GitError};

/// Lists every commit reachable from any ref of a working copy.
#[derive(Clone, Copy)]
pub struct CommitEnumerator<'a> {
    git: &'a dyn Git,
}

impl std::fmt::Debug for CommitEnumerator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitEnumerator").finish_non_exhaustive()
    }
}

impl<'a> CommitEnumerator<'a> {
    /// Creates an enumerator using `git`.
    #[must_use]
    pub fn new(git: &'a dyn Git) -> Self {
        Self { git }
    }

    /// Runs `git rev-list --all` and returns one hash per commit.
    ///
    /// `rev-list` already deduplicates commits shared between branches.
    pub fn commits(&self, repo: &Path) -> Result<Vec<String>, GitError> {
        debug!(repo = %repo.display(), "retrieving list of commits");
        let stdout = self.git.rev_list_all(repo)?;
        Ok(parse_rev_list(&stdout))
    }
}

/// Parses `git rev-list` output, ignoring blank lines.
#[must_use]
pub fn parse_rev_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
