use thiserror::Error;

use crate::git::GitError;
use crate::repository::InvalidRepositoryUrl;
use crate::store::StoreError;

/// Fatal errors that stop a scan.
///
/// Everything recoverable (clone failures, listing failures, search tool
/// errors) is collected in the scan's `ErrorSummary` instead.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The effective search-term set was empty.
    #[error("you must supply at least one string to search for")]
    NoSearchTerms,

    /// The `git` executable could not be run.
    #[error("git is required but could not be executed: {source}")]
    GitUnavailable {
        /// The underlying spawn or exit failure.
        #[source]
        source: GitError,
    },

    /// A repository URL would place its clone outside the clone root.
    #[error(transparent)]
    InvalidRepository(#[from] InvalidRepositoryUrl),

    /// Findings could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}
