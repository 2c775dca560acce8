//! History-scanning engine for surch.
//!
//! This crate clones or updates a git repository, walks every commit
//! reachable from any ref, runs `git grep` against each commit tree and turns
//! the hits into attributed findings appended to a JSON result store.
//!
//! # Main Types
//!
//! - [`HistoryScanner`] - Runs the full acquire → enumerate → search → assemble pipeline
//! - [`Repository`] - A remote repository and where its clone lives on disk
//! - [`SearchExpression`] - The compiled `git grep` pattern set
//! - [`Finding`] - One matched file at one commit, with author attribution
//! - [`ResultStore`] - The on-disk JSON document findings are appended to
//! - [`Config`] - User configuration loaded from `.surch.toml`
//!
//! # Error Handling
//!
//! Library errors are typed with [`thiserror`]:
//!
//! - [`GitError`] - A git invocation could not be spawned or exited non-zero
//! - [`StoreError`] - The result store could not be read, parsed, or written
//! - [`ConfigError`] - Configuration loading or validation failures
//! - [`ScanError`] - Fatal errors that stop a scan before or after it runs
//! - [`InvalidRepositoryUrl`] - A URL whose names cannot be used as clone directories
//!
//! Repository-level failures (clone errors, listing errors) never surface as
//! `Err`; they are collected in the [`ErrorSummary`] of the [`ScanReport`].
//! The CLI crate (`surch_cli`) uses `anyhow` for error propagation.

/// Repository acquisition: clone when absent, pull when present.
pub mod acquire;
/// Joins search hits with commit attribution and persists findings.
pub mod assemble;
/// Commit author and date lookup with a per-scan cache.
pub mod attribution;
/// User configuration loaded from `.surch.toml` and the merged search terms.
pub mod config;
/// Commit enumeration across all refs.
pub mod enumerate;
/// Error types shared by the engine.
pub mod error;
/// Findings and raw search hits.
pub mod finding;
/// Filesystem helpers for atomic writes and clone cleanup.
pub mod fs_util;
/// The `git` command layer.
pub mod git;
/// Search-term compilation into a `git grep` expression.
pub mod pattern;
/// Common re-exports for internal use.
pub mod prelude;
/// Remote repository identity and local clone location.
pub mod repository;
/// Bounded retry with optional exponential backoff.
pub mod retry;
/// The scan orchestrator.
pub mod scan;
/// Per-commit `git grep` execution.
pub mod search;
/// The JSON result store.
pub mod store;
#[cfg(test)]
pub(crate) mod test_utils;

pub use acquire::Acquirer;
pub use assemble::{ResultAssembler, blob_url};
pub use attribution::{Attribution, AttributionCache, AttributionResolver};
pub use config::{Config, ConfigError, RetryConfig, SearchConfig, VaultConfig, VaultSettings};
pub use enumerate::CommitEnumerator;
pub use error::ScanError;
pub use finding::{Finding, RawHit};
pub use git::{Git, GitCli, GitError};
pub use pattern::{SearchExpression, SearchTerm};
pub use repository::{InvalidRepositoryUrl, Repository};
pub use retry::{Backoff, RetryPolicy};
pub use scan::{ErrorSummary, HistoryScanner, NoProgress, ScanConfig, ScanPhase, ScanProgress, ScanReport};
pub use search::{CommitSearcher, SearchOutcome};
pub use store::{ResultStore, StoreError};

/// Default filename for surch configuration.
pub const CONFIG_FILENAME: &str = ".surch.toml";
