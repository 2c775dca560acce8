//! Selection of secret fields by name.

use regex::{RegexBuilder, RegexSet, RegexSetBuilder};
use serde_json::{Map, Value};

use crate::error::VaultError;

/// Case-insensitive set of field-name patterns.
///
/// A field is selected when any pattern matches anywhere in its name.
#[derive(Debug, Clone)]
pub struct KeyFilter {
    set: RegexSet,
}

impl KeyFilter {
    /// Compiles `patterns`, naming the first invalid one on failure.
    pub fn new<I, S>(patterns: I) -> Result<Self, VaultError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(|p| p.as_ref().to_string()).collect();

        for pattern in &patterns {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| VaultError::InvalidKeyPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
        }

        let set = RegexSetBuilder::new(&patterns)
            .case_insensitive(true)
            .build()
            .map_err(|source| VaultError::InvalidKeyPattern {
                pattern: patterns.join(", "),
                source,
            })?;

        Ok(Self { set })
    }

    /// Returns `true` if `key` matches any pattern.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.set.is_match(key)
    }

    /// String values of the selected fields, in field order.
    ///
    /// Non-string values are skipped.
    pub fn select<'a>(&'a self, secret: &'a Map<String, Value>) -> impl Iterator<Item = &'a str> + 'a {
        secret
            .iter()
            .filter(|(key, _)| self.matches(key))
            .filter_map(|(_, value)| value.as_str())
    }
}
