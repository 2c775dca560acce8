//! Test utilities for `surch_core` (compiled only during testing).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::git::{Git, GitError};
use crate::pattern::SearchExpression;
use crate::repository::Repository;

/// Scripted stand-in for the `git` binary that records every call.
///
/// Unknown commits grep as "no match" (exit 1) and show a fixed author.
#[derive(Debug, Default)]
pub struct FakeGit {
    calls: Mutex<Vec<(&'static str, String)>>,
    last_quiet: Mutex<Option<bool>>,
    fail_clone: bool,
    fail_pull: bool,
    fail_rev_list: bool,
    commits: Vec<String>,
    grep: HashMap<String, Result<String, i32>>,
    show: HashMap<String, Result<String, i32>>,
}

fn exit(command: &str, code: i32) -> GitError {
    GitError::Exit {
        command: command.into(),
        code: Some(code),
        stderr: format!("fatal: simulated {command} failure"),
    }
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_clone(mut self) -> Self {
        self.fail_clone = true;
        self
    }

    pub fn failing_pull(mut self) -> Self {
        self.fail_pull = true;
        self
    }

    pub fn failing_rev_list(mut self) -> Self {
        self.fail_rev_list = true;
        self
    }

    pub fn with_commits(mut self, commits: &[&str]) -> Self {
        self.commits = commits.iter().map(|c| (*c).to_string()).collect();
        self
    }

    pub fn with_grep(mut self, commit: &str, stdout: &str) -> Self {
        self.grep.insert(commit.into(), Ok(stdout.into()));
        self
    }

    pub fn with_grep_exit(mut self, commit: &str, code: i32) -> Self {
        self.grep.insert(commit.into(), Err(code));
        self
    }

    pub fn with_show(mut self, commit: &str, stdout: &str) -> Self {
        self.show.insert(commit.into(), Ok(stdout.into()));
        self
    }

    pub fn failing_show(mut self, commit: &str) -> Self {
        self.show.insert(commit.into(), Err(128));
        self
    }

    /// Number of calls to the given operation.
    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(o, _)| *o == op).count()
    }

    /// Number of calls to the given operation with the given argument.
    pub fn calls_with(&self, op: &str, arg: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, a)| *o == op && a == arg)
            .count()
    }

    /// Total number of calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The `quiet` flag passed to the most recent clone or pull.
    pub fn last_quiet(&self) -> Option<bool> {
        *self.last_quiet.lock().unwrap()
    }

    fn record(&self, op: &'static str, arg: &str) {
        self.calls.lock().unwrap().push((op, arg.to_string()));
    }
}

impl Git for FakeGit {
    fn version(&self) -> Result<String, GitError> {
        self.record("version", "");
        Ok("git version 2.47.0\n".into())
    }

    fn clone_repo(&self, remote: &str, _dest: &Path, quiet: bool) -> Result<String, GitError> {
        self.record("clone", remote);
        *self.last_quiet.lock().unwrap() = Some(quiet);
        if self.fail_clone {
            return Err(exit("clone", 128));
        }
        Ok(String::new())
    }

    fn pull(&self, repo: &Path, quiet: bool) -> Result<String, GitError> {
        self.record("pull", &repo.display().to_string());
        *self.last_quiet.lock().unwrap() = Some(quiet);
        if self.fail_pull {
            return Err(exit("pull", 1));
        }
        Ok("Already up to date.\n".into())
    }

    fn rev_list_all(&self, _repo: &Path) -> Result<String, GitError> {
        self.record("rev-list", "");
        if self.fail_rev_list {
            return Err(exit("rev-list", 128));
        }
        Ok(self.commits.iter().map(|c| format!("{c}\n")).collect())
    }

    fn grep(&self, _repo: &Path, _expr: &SearchExpression, commit: &str) -> Result<String, GitError> {
        self.record("grep", commit);
        match self.grep.get(commit) {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(code)) => Err(exit("grep", *code)),
            None => Err(exit("grep", 1)),
        }
    }

    fn show(&self, _repo: &Path, commit: &str) -> Result<String, GitError> {
        self.record("show", commit);
        match self.show.get(commit) {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(code)) => Err(exit("show", *code)),
            None => Ok(format!(
                "commit {commit}\nAuthor: Test User <test@example.com>\nDate:   Thu Oct 15 12:00:00 2026 +0000\n\n    message\n"
            )),
        }
    }
}

/// `acme/widgets` cloned under `<base>/clones`.
pub fn fake_repository(base: &Path) -> Repository {
    Repository::new(
        "acme",
        "widgets",
        "https://github.com/acme/widgets.git",
        base.join("clones").join("acme").join("widgets"),
        "https://github.com",
    )
}
