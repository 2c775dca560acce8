use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pattern::SearchTerm;
use crate::retry::{Backoff, RetryPolicy};

/// Field-name patterns used to pick search terms out of Vault secrets when
/// `[vault].key_list` is not set. Matched case-insensitively.
pub const DEFAULT_VAULT_KEY_LIST: &[&str] = &[
    ".*password.*",
    ".*key.*",
    ".*secret.*",
    ".*id.*",
    ".*endpoint.*",
    ".*tenant.*",
    ".*api.*",
];

const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

/// User configuration loaded from `.surch.toml`.
///
/// Every field is optional. Command-line flags take precedence over the
/// values here; the CLI performs that merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Repository URLs scanned when none are given on the command line.
    #[serde(default)]
    pub repositories: Vec<String>,

    /// Search terms added to those given on the command line.
    #[serde(default)]
    pub search: Vec<SearchTerm>,

    /// Where clones are kept. Defaults to `.surch/clones`.
    #[serde(default)]
    pub clones_dir: Option<PathBuf>,

    /// Where result files are written. Defaults to `.surch/results`.
    #[serde(default)]
    pub results_dir: Option<PathBuf>,

    /// Web host used for deep links when a URL does not name one.
    #[serde(default)]
    pub web_host: Option<String>,

    /// Run git without `--quiet` and log at debug level.
    #[serde(default)]
    pub verbose: bool,

    /// Print the result file after each scan.
    #[serde(default)]
    pub print_results: bool,

    /// Move an existing result file aside before scanning.
    #[serde(default)]
    pub consolidate: bool,

    /// Delete each clone after it has been scanned.
    #[serde(default)]
    pub remove_clone: bool,

    /// Worker threads for scanning. `1` scans sequentially.
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Retry settings for clone and pull.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Vault connection used by `--source vault`.
    #[serde(default)]
    pub vault: Option<VaultConfig>,
}

impl Config {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from `path`, which must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads configuration from `path`, or returns the default when the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        Self::load(path)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// The retry policy described by `[retry]`.
    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        self.retry.policy()
    }

    /// Validated Vault settings.
    ///
    /// Fails when `[vault]` is absent or lacks `url`, `token` or
    /// `secret_path`.
    pub fn vault_settings(&self) -> Result<VaultSettings, ConfigError> {
        self.vault.clone().unwrap_or_default().validate()
    }
}

/// The `[retry]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per clone or pull. Defaults to 3.
    #[serde(default)]
    pub attempts: Option<u32>,

    /// Initial delay between attempts. Unset or `0` retries immediately.
    #[serde(default)]
    pub backoff_ms: Option<u64>,

    /// Cap on the exponential delay.
    #[serde(default)]
    pub max_backoff_ms: Option<u64>,
}

impl RetryConfig {
    /// Builds the [`RetryPolicy`] these settings describe.
    pub fn policy(&self) -> Result<RetryPolicy, ConfigError> {
        let mut policy = RetryPolicy::default();

        if let Some(attempts) = self.attempts {
            if attempts == 0 {
                return Err(ConfigError::Invalid {
                    field: "retry.attempts",
                    reason: "must be at least 1".into(),
                });
            }
            policy.max_attempts = attempts;
        }

        if let Some(initial) = self.backoff_ms.filter(|ms| *ms > 0) {
            let max = self.max_backoff_ms.unwrap_or(DEFAULT_MAX_BACKOFF_MS).max(initial);
            policy.backoff = Backoff::Exponential {
                initial: Duration::from_millis(initial),
                max: Duration::from_millis(max),
            };
        }

        Ok(policy)
    }
}

/// The `[vault]` table as written by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Base URL of the Vault server, e.g. `https://vault.example.com:8200`.
    #[serde(default)]
    pub url: Option<String>,
    /// Token sent as `X-Vault-Token`.
    #[serde(default)]
    pub token: Option<String>,
    /// Secret path below `/v1/`, e.g. `secret/ci`.
    #[serde(default)]
    pub secret_path: Option<String>,
    /// Regexes selecting which secret fields become search terms.
    #[serde(default)]
    pub key_list: Option<Vec<String>>,
}

impl VaultConfig {
    /// Checks that the required keys are present.
    pub fn validate(self) -> Result<VaultSettings, ConfigError> {
        let url = required(self.url, "url")?;
        let token = required(self.token, "token")?;
        let secret_path = required(self.secret_path, "secret_path")?;
        let key_list = self
            .key_list
            .unwrap_or_else(|| DEFAULT_VAULT_KEY_LIST.iter().map(|k| (*k).to_string()).collect());

        Ok(VaultSettings {
            url,
            token,
            secret_path,
            key_list,
        })
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingVaultKey { key })
}

/// Complete Vault settings, ready for a client.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultSettings {
    /// Base URL of the Vault server.
    pub url: String,
    /// Access token.
    pub token: String,
    /// Secret path below `/v1/`.
    pub secret_path: String,
    /// Field-name regexes.
    pub key_list: Vec<String>,
}

impl std::fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSettings")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("secret_path", &self.secret_path)
            .field("key_list", &self.key_list)
            .finish()
    }
}

/// The effective search-term set.
///
/// Terms are merged source by source; the first occurrence of a term wins
/// and order is preserved. Blank terms are dropped since they would match
/// every file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchConfig {
    terms: Vec<SearchTerm>,
}

impl SearchConfig {
    /// Creates an empty term set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the terms of another source, skipping ones already present.
    #[must_use]
    pub fn merge<I>(mut self, terms: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SearchTerm>,
    {
        let mut seen: HashSet<SearchTerm> = self.terms.iter().cloned().collect();
        for term in terms {
            let term = term.into();
            if term.as_str().trim().is_empty() {
                continue;
            }
            if seen.insert(term.clone()) {
                self.terms.push(term);
            }
        }
        self
    }

    /// The merged terms.
    #[must_use]
    pub fn terms(&self) -> &[SearchTerm] {
        &self.terms
    }

    /// Returns `true` if no source contributed a term.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Number of distinct terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }
}

/// Errors that can occur when reading, parsing, or validating `.surch.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read from disk.
    #[error("failed to read config '{path}': {source}")]
    Read {
        /// Path to the config file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file contained invalid TOML or unexpected values.
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        /// Path to the config file that could not be parsed.
        path: PathBuf,
        /// The underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// A required `[vault]` key was missing.
    #[error("vault configuration is missing '{key}'")]
    MissingVaultKey {
        /// The missing key.
        key: &'static str,
    },

    /// A value was out of range.
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Dotted name of the field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl ConfigError {
    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => Some(path),
            Self::MissingVaultKey { .. } | Self::Invalid { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn default_config_is_empty() {
        let config = Config::default();
        assert!(config.repositories.is_empty());
        assert!(config.search.is_empty());
        assert!(config.vault.is_none());
        assert_eq!(config.retry_policy().unwrap(), RetryPolicy::default());
    }

    #[test]
    fn from_toml_parses_complete_config() {
        let toml = r#"
            repositories = ["https://github.com/acme/widgets.git"]
            search = ["password", "AKIA"]
            clones_dir = "/tmp/clones"
            results_dir = "/tmp/results"
            web_host = "https://git.example.com"
            verbose = true
            print_results = true
            consolidate = true
            remove_clone = true
            concurrency = 4

            [retry]
            attempts = 5
            backoff_ms = 100
            max_backoff_ms = 1000

            [vault]
            url = "https://vault.example.com:8200"
            token = "s.abc"
            secret_path = "secret/ci"
            key_list = ["(?i)token"]
        "#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.repositories.len(), 1);
        assert_eq!(config.search, vec![SearchTerm::new("password"), SearchTerm::new("AKIA")]);
        assert_eq!(config.clones_dir, Some(PathBuf::from("/tmp/clones")));
        assert_eq!(config.concurrency, Some(4));
        assert!(config.consolidate && config.remove_clone && config.print_results && config.verbose);

        let policy = config.retry_policy().unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(
            policy.backoff,
            Backoff::Exponential {
                initial: Duration::from_millis(100),
                max: Duration::from_millis(1000),
            }
        );

        let vault = config.vault_settings().unwrap();
        assert_eq!(vault.secret_path, "secret/ci");
        assert_eq!(vault.key_list, vec!["(?i)token"]);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Config::from_toml("serach = [\"typo\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn zero_attempts_is_invalid() {
        let config = Config::from_toml("[retry]\nattempts = 0").unwrap();
        assert!(matches!(
            config.retry_policy(),
            Err(ConfigError::Invalid { field: "retry.attempts", .. })
        ));
    }

    #[test]
    fn zero_backoff_retries_immediately() {
        let config = Config::from_toml("[retry]\nbackoff_ms = 0").unwrap();
        assert_eq!(config.retry_policy().unwrap().backoff, Backoff::None);
    }

    #[test]
    fn vault_requires_url_token_and_path() {
        let missing = Config::default().vault_settings().unwrap_err();
        assert!(matches!(missing, ConfigError::MissingVaultKey { key: "url" }));

        let config = Config::from_toml("[vault]\nurl = \"http://v\"\nsecret_path = \"s\"").unwrap();
        assert!(matches!(
            config.vault_settings(),
            Err(ConfigError::MissingVaultKey { key: "token" })
        ));

        let config = Config::from_toml("[vault]\nurl = \"http://v\"\ntoken = \"t\"\nsecret_path = \"  \"").unwrap();
        assert!(matches!(
            config.vault_settings(),
            Err(ConfigError::MissingVaultKey { key: "secret_path" })
        ));
    }

    #[test]
    fn vault_key_list_has_a_default() {
        let config = Config::from_toml("[vault]\nurl = \"http://v\"\ntoken = \"t\"\nsecret_path = \"s\"").unwrap();
        let settings = config.vault_settings().unwrap();
        assert_eq!(settings.key_list.len(), DEFAULT_VAULT_KEY_LIST.len());
        assert!(!format!("{settings:?}").contains("\"t\""));
    }

    #[test]
    fn load_reads_file_and_load_or_default_tolerates_absence() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "search = [\"secret\"]").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.search, vec![SearchTerm::new("secret")]);

        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join(".surch.toml");
        assert!(matches!(Config::load(&absent), Err(ConfigError::Read { .. })));
        assert_eq!(Config::load_or_default(&absent).unwrap(), Config::default());
    }

    #[test]
    fn parse_error_carries_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "search = [").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert_eq!(err.path(), Some(file.path()));
    }

    #[test]
    fn merge_keeps_first_occurrence_in_order() {
        let terms = SearchConfig::new()
            .merge(["password", "AKIA"])
            .merge(["token", "password"])
            .merge(["AKIA", "api_key"]);

        let names: Vec<&str> = terms.terms().iter().map(SearchTerm::as_str).collect();
        assert_eq!(names, vec!["password", "AKIA", "token", "api_key"]);
    }

    #[test]
    fn merge_drops_blank_terms() {
        let terms = SearchConfig::new().merge(["", "  ", "x"]);
        assert_eq!(terms.len(), 1);
    }

    #[test]
    fn merging_nothing_is_empty() {
        let terms = SearchConfig::new().merge(Vec::<String>::new());
        assert!(terms.is_empty());
    }
}
