//! Vault error types.

/// Errors that can occur while fetching search terms from Vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The HTTP client could not be initialised.
    #[error("failed to initialize HTTP client: {0}")]
    ClientInit(String),

    /// The request could not be sent or its body could not be read.
    #[error("vault request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Vault answered with an unexpected status.
    #[error("vault returned {status} for '{path}'")]
    Status {
        /// Secret path that was requested.
        path: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response was not shaped like a Vault secret or listing.
    #[error("unexpected vault response for '{path}': {reason}")]
    InvalidPayload {
        /// Secret path that was requested.
        path: String,
        /// What was missing.
        reason: &'static str,
    },

    /// A `key_list` entry is not a valid regular expression.
    #[error("invalid vault key pattern '{pattern}': {source}")]
    InvalidKeyPattern {
        /// The offending pattern.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },
}
