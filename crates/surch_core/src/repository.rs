//! Remote repository identity and local clone location.
//!
//! Organisation and repository names come from plain string splitting on the
//! URL path: the last segment (minus `.git`) is the repository, the one before
//! it the organisation. URLs that do not follow `<host>/<org>/<repo>.git`
//! produce wrong names; no URL parsing is attempted.
//!
//! Both names become directories under the clone root, so a name that is
//! empty, `.`, `..` or holds a path separator is rejected.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Used when the URL has no path segment before the repository name.
const UNKNOWN_ORGANIZATION: &str = "unknown";

/// A URL whose derived names cannot be used as clone directories.
#[derive(Debug, Error)]
#[error("cannot scan '{url}': {reason}")]
pub struct InvalidRepositoryUrl {
    url: String,
    reason: String,
}

impl InvalidRepositoryUrl {
    /// The rejected URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// A repository to scan and where its working copy lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    organization: String,
    name: String,
    remote: String,
    local_path: PathBuf,
    web_host: String,
}

impl Repository {
    /// Builds a repository from explicit parts.
    #[must_use]
    pub fn new(
        organization: impl Into<String>,
        name: impl Into<String>,
        remote: impl Into<String>,
        local_path: impl Into<PathBuf>,
        web_host: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            name: name.into(),
            remote: remote.into(),
            local_path: local_path.into(),
            web_host: web_host.into(),
        }
    }

    /// Derives organisation, name, and web host from `url` and places the
    /// clone at `<clones_dir>/<organization>/<name>`.
    ///
    /// `default_host` is used for deep links when the URL names no host
    /// (for example a filesystem path).
    pub fn from_url(url: &str, clones_dir: &Path, default_host: &str) -> Result<Self, InvalidRepositoryUrl> {
        let (host, path) = split_host(url.trim());
        let (organization, name) = split_org_and_name(path);
        let invalid = |reason: String| InvalidRepositoryUrl {
            url: url.trim().to_string(),
            reason,
        };
        check_component("repository name", &name).map_err(invalid)?;
        check_component("organization", &organization).map_err(invalid)?;

        let web_host = host.map_or_else(|| default_host.trim_end_matches('/').to_string(), |h| h.web_url());
        let local_path = clones_dir.join(&organization).join(&name);

        Ok(Self {
            organization,
            name,
            remote: url.trim().to_string(),
            local_path,
            web_host,
        })
    }

    /// Organisation (owner) the repository belongs to.
    #[must_use]
    pub fn organization(&self) -> &str {
        &self.organization
    }

    /// Repository name without the `.git` suffix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL or path the repository is cloned from.
    #[must_use]
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Where the working copy lives.
    #[must_use]
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Base URL for deep links, e.g. `https://github.com`.
    #[must_use]
    pub fn web_host(&self) -> &str {
        &self.web_host
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization, self.name)
    }
}

struct Host<'a> {
    scheme: &'a str,
    name: &'a str,
}

impl Host<'_> {
    fn web_url(&self) -> String {
        let scheme = if self.scheme == "http" { "http" } else { "https" };
        format!("{scheme}://{}", self.name)
    }
}

/// Splits `url` into its host (if any) and the path after it.
fn split_host(url: &str) -> (Option<Host<'_>>, &str) {
    if let Some((scheme, rest)) = url.split_once("://") {
        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
        if scheme == "file" {
            return (None, path);
        }
        return (
            Some(Host {
                scheme,
                name: strip_user(authority),
            }),
            path,
        );
    }

    // scp-like syntax: `git@github.com:org/repo.git`
    if let Some((authority, path)) = url.split_once(':')
        && !authority.contains('/')
        && authority.contains('@')
    {
        return (
            Some(Host {
                scheme: "ssh",
                name: strip_user(authority),
            }),
            path,
        );
    }

    (None, url)
}

fn strip_user(authority: &str) -> &str {
    authority.rsplit_once('@').map_or(authority, |(_, host)| host)
}

fn split_org_and_name(path: &str) -> (String, String) {
    let trimmed = path.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let mut segments = trimmed.rsplit('/').filter(|s| !s.is_empty());
    let name = segments.next().unwrap_or_default().to_string();
    let organization = segments.next().unwrap_or(UNKNOWN_ORGANIZATION).to_string();

    (organization, name)
}

fn check_component(what: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("the URL names no {what}"));
    }
    if value == "." || value == ".." {
        return Err(format!("{what} '{value}' is not a directory name"));
    }
    if value.contains(['/', '\\']) {
        return Err(format!("{what} '{value}' contains a path separator"));
    }
    Ok(())
}
