//! Convenience re-exports of the most commonly used types.

pub use crate::config::{Config, ConfigError, SearchConfig};
pub use crate::error::ScanError;
pub use crate::finding::{Finding, RawHit};
pub use crate::git::{Git, GitCli, GitError};
pub use crate::pattern::{SearchExpression, SearchTerm};
pub use crate::repository::Repository;
pub use crate::scan::{ErrorSummary, HistoryScanner, NoProgress, ScanConfig, ScanProgress, ScanReport};
pub use crate::store::{ResultStore, StoreError};
