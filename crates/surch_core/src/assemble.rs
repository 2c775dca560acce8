//! Joins search hits with commit attribution.

use tracing::trace;

use crate::attribution::{AttributionCache, AttributionResolver};
use crate::finding::{Finding, RawHit};
use crate::repository::Repository;

/// Deep link to `path` at `commit`:
/// `<host>/<organization>/<repository>/blob/<commit>/<path>`.
#[must_use]
pub fn blob_url(host: &str, organization: &str, repository: &str, commit: &str, path: &str) -> String {
    format!(
        "{}/{organization}/{repository}/blob/{commit}/{path}",
        host.trim_end_matches('/')
    )
}

/// Builds [`Finding`]s from the raw hits of one repository.
///
/// Attribution goes through a shared [`AttributionCache`], so a commit with
/// many matching files costs a single `git show`.
#[derive(Debug, Clone, Copy)]
pub struct ResultAssembler<'a> {
    resolver: AttributionResolver<'a>,
    cache: &'a AttributionCache,
    repo: &'a Repository,
}

impl<'a> ResultAssembler<'a> {
    /// Creates an assembler for `repo`.
    #[must_use]
    pub fn new(resolver: AttributionResolver<'a>, cache: &'a AttributionCache, repo: &'a Repository) -> Self {
        Self { resolver, cache, repo }
    }

    /// Turns hits into findings.
    ///
    /// Malformed hits are dropped without a lookup. Hits whose commit
    /// cannot be attributed are dropped too.
    #[must_use]
    pub fn assemble(&self, hits: &[RawHit]) -> Vec<Finding> {
        hits.iter().filter_map(|hit| self.assemble_one(hit)).collect()
    }

    fn assemble_one(&self, hit: &RawHit) -> Option<Finding> {
        let Some((commit, path)) = hit.split() else {
            trace!(line = %hit, "skipping malformed search hit");
            return None;
        };

        let attribution = self
            .cache
            .get_or_resolve(commit, || self.resolver.resolve(commit))?;

        Some(Finding {
            email: attribution.email,
            filepath: path.to_string(),
            username: attribution.name,
            commit_sha: commit.to_string(),
            commit_time: attribution.time,
            repository_name: self.repo.name().to_string(),
            organization_name: self.repo.organization().to_string(),
            blob_url: blob_url(
                self.repo.web_host(),
                self.repo.organization(),
                self.repo.name(),
                commit,
                path,
            ),
        })
    }
}
