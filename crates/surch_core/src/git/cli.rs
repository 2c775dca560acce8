//! `git` subprocess invocation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, trace};

use super::{Git, GitError};
use crate::pattern::SearchExpression;

/// Runs the system `git` binary.
///
/// Interactive credential prompts are disabled so an unauthenticated clone
/// fails instead of blocking the scan.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    /// Uses `git` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Uses a specific `git` executable.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.stdin(Stdio::null());
        cmd
    }

    fn git_in(&self, repo: &Path) -> Command {
        let mut cmd = self.git();
        cmd.arg("-C").arg(repo);
        cmd
    }

    /// `git grep -l -z`: NUL-terminated `<commit>:<path>` records, so paths
    /// come back verbatim instead of C-quoted.
    fn grep_command(&self, repo: &Path, expr: &SearchExpression, commit: &str) -> Command {
        let mut cmd = self.git_in(repo);
        cmd.args(["grep", "-l", "-z"]).args(expr.args()).arg(commit);
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<String, GitError> {
        let command = describe(&cmd);
        debug!(%command, "running git");

        let output = cmd.output().map_err(|source| GitError::Spawn {
            command: command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(GitError::Exit {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!(bytes = stdout.len(), "git finished");
        Ok(stdout)
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl Git for GitCli {
    fn version(&self) -> Result<String, GitError> {
        let mut cmd = self.git();
        cmd.arg("--version");
        self.run(cmd)
    }

    fn clone_repo(&self, remote: &str, dest: &Path, quiet: bool) -> Result<String, GitError> {
        let mut cmd = self.git();
        cmd.arg("clone");
        if quiet {
            cmd.arg("--quiet");
        }
        cmd.arg(remote).arg(dest);
        self.run(cmd)
    }

    fn pull(&self, repo: &Path, quiet: bool) -> Result<String, GitError> {
        let mut cmd = self.git_in(repo);
        cmd.arg("pull");
        if quiet {
            cmd.arg("--quiet");
        }
        self.run(cmd)
    }

    fn rev_list_all(&self, repo: &Path) -> Result<String, GitError> {
        let mut cmd = self.git_in(repo);
        cmd.args(["rev-list", "--all"]);
        self.run(cmd)
    }

    fn grep(&self, repo: &Path, expr: &SearchExpression, commit: &str) -> Result<String, GitError> {
        self.run(self.grep_command(repo, expr, commit))
    }

    fn show(&self, repo: &Path, commit: &str) -> Result<String, GitError> {
        let mut cmd = self.git_in(repo);
        cmd.args(["show", "-s", commit]);
        self.run(cmd)
    }
}

fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}
