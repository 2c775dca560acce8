//! Repository acquisition.

use std::path::Path;

use tracing::{debug, info};

use crate::git::{Git, GitError};
use crate::repository::Repository;
use crate::retry::RetryPolicy;

/// Errors from bringing a working copy up to date.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    /// The parent directory for the clone could not be created.
    #[error("failed to create clone directory '{path}': {source}")]
    CreateDir {
        /// The directory that could not be created.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// `git clone` or `git pull` failed.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Clones a repository when no working copy exists and pulls it otherwise.
#[derive(Clone, Copy)]
pub struct Acquirer<'a> {
    git: &'a dyn Git,
    retry: RetryPolicy,
    verbose: bool,
}

impl std::fmt::Debug for Acquirer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquirer")
            .field("retry", &self.retry)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl<'a> Acquirer<'a> {
    /// Creates an acquirer. With `verbose` set, git runs without `--quiet`
    /// and its output is logged at debug level.
    #[must_use]
    pub fn new(git: &'a dyn Git, retry: RetryPolicy, verbose: bool) -> Self {
        Self { git, retry, verbose }
    }

    /// Ensures `repo` has an up-to-date working copy, retrying per policy.
    ///
    /// Returns the error of the final attempt when every attempt failed.
    pub fn acquire(&self, repo: &Repository) -> Result<(), AcquireError> {
        self.retry.run(|attempt| {
            if attempt > 1 {
                info!(repo = %repo, attempt, "retrying repository sync");
            }
            self.sync(repo)
        })
    }

    fn sync(&self, repo: &Repository) -> Result<(), AcquireError> {
        let path = repo.local_path();
        let quiet = !self.verbose;

        let stdout = if path.is_dir() {
            debug!(path = %path.display(), "local repo already exists");
            info!(repo = %repo.name(), "pulling repo");
            self.git.pull(path, quiet)?
        } else {
            create_parent(path)?;
            info!(
                repo = %repo.name(),
                organization = %repo.organization(),
                path = %path.display(),
                "cloning repo"
            );
            self.git.clone_repo(repo.remote(), path, quiet)?
        };

        if self.verbose && !stdout.trim().is_empty() {
            debug!("{}", stdout.trim_end());
        }

        Ok(())
    }
}

fn create_parent(path: &Path) -> Result<(), AcquireError> {
    crate::fs_util::ensure_parent_dir(path).map_err(|source| AcquireError::CreateDir {
        path: path.parent().unwrap_or(path).to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeGit, fake_repository};

    #[test]
    fn clones_when_working_copy_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fake_repository(dir.path());
        let git = FakeGit::new();

        Acquirer::new(&git, RetryPolicy::default(), false).acquire(&repo).unwrap();

        assert_eq!(git.calls("clone"), 1);
        assert_eq!(git.calls("pull"), 0);
        assert!(repo.local_path().parent().unwrap().is_dir());
    }

    #[test]
    fn pulls_when_working_copy_exists() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fake_repository(dir.path());
        std::fs::create_dir_all(repo.local_path()).unwrap();
        let git = FakeGit::new();

        Acquirer::new(&git, RetryPolicy::default(), false).acquire(&repo).unwrap();

        assert_eq!(git.calls("pull"), 1);
        assert_eq!(git.calls("clone"), 0);
    }

    #[test]
    fn retries_until_attempts_are_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fake_repository(dir.path());
        let git = FakeGit::new().failing_clone();

        let err = Acquirer::new(&git, RetryPolicy::default(), false)
            .acquire(&repo)
            .unwrap_err();

        assert!(matches!(err, AcquireError::Git(_)));
        assert_eq!(git.calls("clone"), 3);
    }

    #[test]
    fn quiet_flag_follows_verbosity() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fake_repository(dir.path());

        let git = FakeGit::new();
        Acquirer::new(&git, RetryPolicy::default(), false).acquire(&repo).unwrap();
        assert_eq!(git.last_quiet(), Some(true));

        let git = FakeGit::new();
        Acquirer::new(&git, RetryPolicy::default(), true).acquire(&repo).unwrap();
        assert_eq!(git.last_quiet(), Some(false));
    }
}
