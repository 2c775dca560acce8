//! Findings and raw search hits.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One file that matched a search term at one commit.
///
/// Field names are the on-disk record format of the result store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Author email of the commit.
    pub email: String,
    /// Path of the matching file within the commit tree.
    pub filepath: String,
    /// Author name of the commit.
    pub username: String,
    /// Full commit hash.
    pub commit_sha: String,
    /// Commit date as printed by `git show`, without the timezone offset.
    pub commit_time: String,
    /// Repository name.
    pub repository_name: String,
    /// Organisation the repository belongs to.
    pub organization_name: String,
    /// Deep link to the file at this commit.
    pub blob_url: String,
}

/// One raw line of `git grep -l <commit>` output.
///
/// Well-formed lines look like `<commit-hash>:<file-path>`. Anything else is
/// carried as-is and rejected by [`RawHit::split`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHit(String);

impl RawHit {
    /// Wraps one output line.
    #[must_use]
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    /// The line as received.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the line into `(commit hash, file path)`.
    ///
    /// The split happens at the first `:` since commit hashes never contain
    /// one while file paths may. Returns `None` when there is no separator or
    /// either side is empty.
    #[must_use]
    pub fn split(&self) -> Option<(&str, &str)> {
        parse_hit_line(&self.0)
    }
}

impl fmt::Display for RawHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses `<commit-hash>:<file-path>`.
#[must_use]
pub fn parse_hit_line(line: &str) -> Option<(&str, &str)> {
    let (commit, path) = line.split_once(':')?;
    let commit = commit.trim();

    if commit.is_empty() || path.is_empty() || commit.contains(char::is_whitespace) {
        return None;
    }

    Some((commit, path))
}
