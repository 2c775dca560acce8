//! The `git` command layer.
//!
//! Every external process the engine spawns goes through the [`Git`] trait.
//! [`GitCli`] is the real implementation; tests substitute a scripted fake.

mod cli;

use std::path::Path;

use thiserror::Error;

pub use self::cli::GitCli;
use crate::pattern::SearchExpression;

/// Errors from running a `git` subcommand.
#[derive(Debug, Error)]
pub enum GitError {
    /// The process could not be started (for example, `git` is not installed).
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        /// The command line that was attempted.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process ran but exited unsuccessfully.
    #[error("`{command}` exited with status {status}{summary}", status = format_status(.code), summary = format_summary(.stderr))]
    Exit {
        /// The command line that was run.
        command: String,
        /// Exit code, or `None` when the process was killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
}

impl GitError {
    /// Exit code of a process that ran to completion, if any.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exit { code, .. } => *code,
            Self::Spawn { .. } => None,
        }
    }

    /// The failure without the command line, so the same fault reads the
    /// same for every commit it hits.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Spawn { source, .. } => format!("failed to execute git: {source}"),
            Self::Exit { code, stderr, .. } => {
                format!("git exited with status {}{}", format_status(code), format_summary(stderr))
            }
        }
    }
}

fn format_status(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

fn format_summary(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| format!(": {line}"))
        .unwrap_or_default()
}

/// The `git` subcommands the engine relies on.
///
/// Each method returns the captured standard output on a zero exit status
/// and [`GitError::Exit`] otherwise, so callers can inspect the exit code.
pub trait Git: Send + Sync {
    /// `git --version`.
    fn version(&self) -> Result<String, GitError>;

    /// `git clone [--quiet] <remote> <dest>`.
    fn clone_repo(&self, remote: &str, dest: &Path, quiet: bool) -> Result<String, GitError>;

    /// `git -C <repo> pull [--quiet]`.
    fn pull(&self, repo: &Path, quiet: bool) -> Result<String, GitError>;

    /// `git -C <repo> rev-list --all`.
    fn rev_list_all(&self, repo: &Path) -> Result<String, GitError>;

    /// `git -C <repo> grep -l -z -e <t1> --or -e <t2> ... <commit>`.
    ///
    /// `git grep` exits with status 1 when nothing matched.
    fn grep(&self, repo: &Path, expr: &SearchExpression, commit: &str) -> Result<String, GitError>;

    /// `git -C <repo> show -s <commit>`.
    fn show(&self, repo: &Path, commit: &str) -> Result<String, GitError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_error_summarises_first_stderr_line() {
        let err = GitError::Exit {
            command: "git clone x y".into(),
            code: Some(128),
            stderr: "\nfatal: repository 'x' does not exist\nmore\n".into(),
        };

        assert_eq!(
            err.to_string(),
            "`git clone x y` exited with status 128: fatal: repository 'x' does not exist"
        );
        assert_eq!(err.exit_code(), Some(128));
    }

    #[test]
    fn exit_error_without_stderr_has_no_summary() {
        let err = GitError::Exit {
            command: "git grep".into(),
            code: None,
            stderr: String::new(),
        };

        assert_eq!(err.to_string(), "`git grep` exited with status signal");
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn detail_omits_the_command_line() {
        let err = GitError::Exit {
            command: "git -C repo grep -l -z -e ( 3f2a9c1".into(),
            code: Some(128),
            stderr: "fatal: -e option, '(': Unmatched ( or \\(\n".into(),
        };

        assert_eq!(err.detail(), "git exited with status 128: fatal: -e option, '(': Unmatched ( or \\(");
    }

    #[test]
    fn spawn_error_has_no_exit_code() {
        let err = GitError::Spawn {
            command: "git --version".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };

        assert!(err.exit_code().is_none());
        assert!(err.to_string().contains("git --version"));
    }
}
