//! HashiCorp Vault search-term source for surch.
//!
//! Reads the secrets stored under a Vault path and turns the values of
//! selected fields into search terms, so a repository can be audited for
//! credentials that are known to be live.

mod client;
mod error;
mod filter;

pub use client::{DEFAULT_TIMEOUT, VaultClient, VaultSource};
pub use error::VaultError;
pub use filter::KeyFilter;

/// HTTP `User-Agent` header sent with every Vault request.
pub(crate) const USER_AGENT: &str = concat!("surch/", env!("CARGO_PKG_VERSION"));
