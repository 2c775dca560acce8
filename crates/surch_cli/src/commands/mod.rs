//! CLI command handlers.

/// Scanning repositories for search terms.
pub mod repo;
/// Printing results files.
pub mod results;

/// Convenience alias for command return types.
pub type Result<T = ()> = anyhow::Result<T>;
