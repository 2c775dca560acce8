//! Search-term compilation.
//!
//! `git grep` combines patterns with `-e <p1> --or -e <p2> ...`. The canonical
//! text form of a compiled expression wraps each term in single quotes, which
//! is what a shell invocation of `git grep -l -e <expr> <commit>` would use.
//! The engine never goes through a shell; it passes [`SearchExpression::args`]
//! straight to the process, which is the same argument vector the shell would
//! produce after stripping the quotes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Separator `git grep` uses between alternative patterns.
const OR_SEPARATOR: &str = " --or -e ";

/// A string or `git grep` pattern to look for in committed files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchTerm(String);

impl SearchTerm {
    /// Wraps a raw term. No escaping or normalisation is applied.
    #[must_use]
    pub fn new(term: impl Into<String>) -> Self {
        Self(term.into())
    }

    /// Returns the raw term.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn quoted(&self) -> String {
        format!("'{}'", self.0)
    }
}

impl From<&str> for SearchTerm {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SearchTerm {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A non-empty set of search terms compiled for `git grep`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchExpression {
    terms: Vec<SearchTerm>,
}

impl SearchExpression {
    /// Compiles `terms` into a single OR expression.
    ///
    /// Returns [`ScanError::NoSearchTerms`] when `terms` is empty.
    pub fn compile(terms: &[SearchTerm]) -> Result<Self, ScanError> {
        if terms.is_empty() {
            return Err(ScanError::NoSearchTerms);
        }

        tracing::debug!(terms = terms.len(), "compiling git grep search expression");

        Ok(Self { terms: terms.to_vec() })
    }

    /// Number of terms in the expression.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Always `false`; a compiled expression holds at least one term.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The terms in compilation order.
    #[must_use]
    pub fn terms(&self) -> &[SearchTerm] {
        &self.terms
    }

    /// Arguments for `git grep`, starting with the first `-e`.
    ///
    /// For terms `a`, `b` this is `["-e", "a", "--or", "-e", "b"]`.
    #[must_use]
    pub fn args(&self) -> Vec<&str> {
        let mut args = Vec::with_capacity(self.terms.len() * 3);

        for (idx, term) in self.terms.iter().enumerate() {
            if idx > 0 {
                args.push("--or");
            }
            args.push("-e");
            args.push(term.as_str());
        }

        args
    }
}

/// Renders the quoted form that follows the first `-e`,
/// e.g. `'a' --or -e 'b' --or -e 'c'`.
impl fmt::Display for SearchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted: Vec<String> = self.terms.iter().map(SearchTerm::quoted).collect();
        f.write_str(&quoted.join(OR_SEPARATOR))
    }
}
