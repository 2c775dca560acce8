//! Commit author and date lookup.
//!
//! Attribution comes from `git show -s <commit>`, whose header is stable
//! plain text:
//!
//! ```text
//! commit 3f2a9c1e...
//! Author: Jane Doe <jane@example.com>
//! Date:   Thu Oct 15 12:00:00 2026 +0200
//! ```
//!
//! The parsers below only look at the labelled `Author:` and `Date:` lines.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use thiserror::Error;
use tracing::{trace, warn};

use crate::git::{Git, GitError};

const AUTHOR_LABEL: &str = "Author:";
const DATE_LABEL: &str = "Date:";

/// Who made a commit and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    /// Author name.
    pub name: String,
    /// Author email.
    pub email: String,
    /// Commit date without the timezone offset, e.g. `Thu Oct 15 12:00:00 2026`.
    pub time: String,
}

/// Errors resolving a commit's attribution.
#[derive(Debug, Error)]
pub enum AttributionError {
    /// `git show` failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// The `git show` header lacked an expected line.
    #[error("commit {commit}: no usable '{label}' line in git show output")]
    Malformed {
        /// Commit that was looked up.
        commit: String,
        /// The label that could not be parsed.
        label: &'static str,
    },
}

/// Looks up attribution for commits of one local repository.
#[derive(Clone, Copy)]
pub struct AttributionResolver<'a> {
    git: &'a dyn Git,
    repo: &'a Path,
}

impl std::fmt::Debug for AttributionResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributionResolver")
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

impl<'a> AttributionResolver<'a> {
    /// Creates a resolver for the working copy at `repo`.
    #[must_use]
    pub fn new(git: &'a dyn Git, repo: &'a Path) -> Self {
        Self { git, repo }
    }

    /// Runs `git show -s <commit>` and parses the author and date lines.
    pub fn resolve(&self, commit: &str) -> Result<Attribution, AttributionError> {
        let output = self.git.show(self.repo, commit)?;
        parse_show_output(&output).map_err(|label| AttributionError::Malformed {
            commit: commit.to_string(),
            label,
        })
    }
}

/// Parses the header of `git show -s` output.
///
/// On failure returns the label of the line that was missing or malformed.
pub fn parse_show_output(output: &str) -> Result<Attribution, &'static str> {
    let author = labelled_value(output, AUTHOR_LABEL).ok_or(AUTHOR_LABEL)?;
    let (name, email) = parse_author(author).ok_or(AUTHOR_LABEL)?;

    let date = labelled_value(output, DATE_LABEL).ok_or(DATE_LABEL)?;
    let time = strip_timezone(date);
    if time.is_empty() {
        return Err(DATE_LABEL);
    }

    Ok(Attribution {
        name: name.to_string(),
        email: email.to_string(),
        time: time.to_string(),
    })
}

/// Returns the trimmed text after `label` on the first line that starts with it.
fn labelled_value<'a>(output: &'a str, label: &str) -> Option<&'a str> {
    output
        .lines()
        .find_map(|line| line.strip_prefix(label))
        .map(str::trim)
}

/// Splits `Jane Doe <jane@example.com>` into name and email.
fn parse_author(author: &str) -> Option<(&str, &str)> {
    let email = find_between(author, "<", ">")?;
    let (name, _) = author.split_once('<')?;
    Some((name.trim(), email))
}

/// Returns the text between the first `start` and the next `end` after it.
#[must_use]
pub fn find_between<'a>(haystack: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = haystack.find(start)? + start.len();
    let len = haystack[from..].find(end)?;
    Some(&haystack[from..from + len])
}

/// Drops a trailing `+hhmm` / `-hhmm` offset.
fn strip_timezone(date: &str) -> &str {
    match date.rsplit_once(' ') {
        Some((rest, offset)) if is_offset(offset) => rest.trim_end(),
        _ => date,
    }
}

fn is_offset(token: &str) -> bool {
    token.len() == 5 && token.starts_with(['+', '-']) && token[1..].bytes().all(|b| b.is_ascii_digit())
}

type CacheCell = Arc<OnceLock<Option<Attribution>>>;

/// Per-scan memo of attribution lookups keyed by commit hash.
///
/// Safe to share between worker threads: concurrent requests for the same
/// commit block on a single lookup, so each commit is resolved at most once
/// per scan. Failed lookups are remembered too and never retried.
#[derive(Debug, Default)]
pub struct AttributionCache {
    entries: Mutex<HashMap<String, CacheCell>>,
}

impl AttributionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached attribution for `commit`, running `resolve` on the
    /// first request only.
    pub fn get_or_resolve<F>(&self, commit: &str, resolve: F) -> Option<Attribution>
    where
        F: FnOnce() -> Result<Attribution, AttributionError>,
    {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(commit.to_string()).or_default())
        };

        cell.get_or_init(|| match resolve() {
            Ok(attribution) => {
                trace!(commit, author = %attribution.email, "resolved attribution");
                Some(attribution)
            }
            Err(err) => {
                warn!(commit, error = %err, "could not resolve commit author, skipping its findings");
                None
            }
        })
        .clone()
    }

    /// Number of distinct commits looked up so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no commit has been looked up yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const SHOW_OUTPUT: &str = "commit 3f2a9c1e5b\n\
Author: Jane Doe <jane@example.com>\n\
Date:   Thu Oct 15 12:00:00 2026 +0200\n\
\n    Add config\n";

    #[test]
    fn parses_author_email_and_date() {
        let attribution = parse_show_output(SHOW_OUTPUT).unwrap();

        assert_eq!(attribution.name, "Jane Doe");
        assert_eq!(attribution.email, "jane@example.com");
        assert_eq!(attribution.time, "Thu Oct 15 12:00:00 2026");
    }

    #[test]
    fn negative_offsets_are_stripped_too() {
        let output = "commit a\nAuthor: A <a@b>\nDate:   Mon Jan 5 09:30:00 2026 -0700\n";
        assert_eq!(parse_show_output(output).unwrap().time, "Mon Jan 5 09:30:00 2026");
    }

    #[test]
    fn merge_header_line_is_ignored() {
        let output = "commit a\nMerge: b c\nAuthor: A B <a@b>\nDate:   Mon Jan 5 09:30:00 2026 +0000\n";
        let attribution = parse_show_output(output).unwrap();
        assert_eq!(attribution.name, "A B");
    }

    #[test]
    fn email_in_commit_message_does_not_win() {
        let output = "commit a\nAuthor: A <real@x>\nDate:   Mon Jan 5 09:30:00 2026 +0000\n\n    cc <other@y>\n";
        assert_eq!(parse_show_output(output).unwrap().email, "real@x");
    }

    #[test]
    fn empty_name_is_allowed() {
        let output = "Author: <bot@ci>\nDate:   Mon Jan 5 09:30:00 2026 +0000\n";
        let attribution = parse_show_output(output).unwrap();
        assert_eq!(attribution.name, "");
        assert_eq!(attribution.email, "bot@ci");
    }

    #[test]
    fn missing_author_line_is_reported() {
        assert_eq!(parse_show_output("commit a\nDate:   x +0000\n"), Err(AUTHOR_LABEL));
    }

    #[test]
    fn author_without_email_is_reported() {
        assert_eq!(
            parse_show_output("Author: Jane Doe\nDate:   Mon Jan 5 2026 +0000\n"),
            Err(AUTHOR_LABEL)
        );
    }

    #[test]
    fn missing_date_line_is_reported() {
        assert_eq!(parse_show_output("Author: A <a@b>\n"), Err(DATE_LABEL));
    }

    #[test]
    fn empty_input_is_reported() {
        assert!(parse_show_output("").is_err());
    }

    #[test]
    fn date_without_offset_is_kept_whole() {
        assert_eq!(strip_timezone("2026-10-15 12:00"), "2026-10-15 12:00");
    }

    #[test]
    fn find_between_markers() {
        assert_eq!(find_between("Author: A <a@b>", "<", ">"), Some("a@b"));
        assert_eq!(find_between("no markers", "<", ">"), None);
        assert_eq!(find_between("open <only", "<", ">"), None);
    }

    #[test]
    fn cache_resolves_each_commit_once() {
        let cache = AttributionCache::new();
        let calls = AtomicUsize::new(0);
        let resolve = || {
            calls.fetch_add(1, Ordering::SeqCst);
            parse_show_output(SHOW_OUTPUT).map_err(|label| AttributionError::Malformed {
                commit: "abc".into(),
                label,
            })
        };

        let first = cache.get_or_resolve("abc", resolve);
        let second = cache.get_or_resolve("abc", resolve);

        assert_eq!(first, second);
        assert!(first.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_remembers_failures() {
        let cache = AttributionCache::new();
        let calls = AtomicUsize::new(0);
        let resolve = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AttributionError::Malformed {
                commit: "abc".into(),
                label: AUTHOR_LABEL,
            })
        };

        assert!(cache.get_or_resolve("abc", resolve).is_none());
        assert!(cache.get_or_resolve("abc", resolve).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cache_is_shared_safely_across_threads() {
        let cache = AttributionCache::new();
        let calls = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    cache.get_or_resolve("abc", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        parse_show_output(SHOW_OUTPUT).map_err(|label| AttributionError::Malformed {
                            commit: "abc".into(),
                            label,
                        })
                    })
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
