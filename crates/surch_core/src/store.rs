//! The JSON result store.
//!
//! The file is a TinyDB-style document: a top-level object of tables, each
//! table an object mapping a numeric record id (as a string) to one record.
//! Findings go into the `_default` table. The document is written with
//! four-space indentation and sorted keys.
//!
//! ```json
//! {
//!     "_default": {
//!         "1": {
//!             "blob_url": "https://github.com/acme/widgets/blob/3f2a.../config.py",
//!             "commit_sha": "3f2a...",
//!             ...
//!         }
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::finding::Finding;

/// Table findings are stored in.
pub const DEFAULT_TABLE: &str = "_default";

/// File name of a result store inside its organisation directory.
pub const RESULTS_FILENAME: &str = "results.json";

const INDENT: &[u8] = b"    ";
const ROTATION_TIMESTAMP: &str = "%Y%m%dT%H%M%S";

/// Errors that can occur when reading, writing, or rotating a result store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file exists but could not be read.
    #[error("failed to read results file '{path}': {source}")]
    Read {
        /// Path of the store file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The store file could not be written.
    #[error("failed to write results file '{path}': {source}")]
    Write {
        /// Path of the store file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The store file is not valid JSON.
    #[error("failed to parse results file '{path}': {source}")]
    Parse {
        /// Path of the store file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The store file is JSON but not shaped like a result store.
    #[error("invalid results file '{path}': {reason}")]
    Invalid {
        /// Path of the store file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A record or the document could not be serialised.
    #[error("failed to serialise results file '{path}': {source}")]
    Serialize {
        /// Path of the store file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An existing store could not be moved aside.
    #[error("failed to rotate results file '{path}': {source}")]
    Rotate {
        /// Path of the store file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// An append-only collection of findings backed by one JSON file.
///
/// Opening an existing file keeps its records; new findings are numbered
/// after the highest existing id. Writers are assumed to be exclusive.
#[derive(Debug)]
pub struct ResultStore {
    path: PathBuf,
    records: BTreeMap<u64, Value>,
    other_tables: Map<String, Value>,
}

impl ResultStore {
    /// Default location: `<results_dir>/<organization>/results.json`.
    #[must_use]
    pub fn default_path(results_dir: &Path, organization: &str) -> PathBuf {
        results_dir.join(organization).join(RESULTS_FILENAME)
    }

    /// Opens the store at `path`, loading any records already there.
    ///
    /// A missing or empty file yields an empty store; nothing is written
    /// until [`save`](Self::save) or [`append`](Self::append).
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut store = Self {
            path: path.to_path_buf(),
            records: BTreeMap::new(),
            other_tables: Map::new(),
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(store);
        }

        store.load(&content)?;
        debug!(path = %path.display(), records = store.records.len(), "opened results file");
        Ok(store)
    }

    fn load(&mut self, content: &str) -> Result<(), StoreError> {
        let document: Value = serde_json::from_str(content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let Value::Object(tables) = document else {
            return Err(self.invalid("top level is not an object"));
        };

        for (name, table) in tables {
            if name != DEFAULT_TABLE {
                self.other_tables.insert(name, table);
                continue;
            }

            let Value::Object(rows) = table else {
                return Err(self.invalid("table '_default' is not an object"));
            };

            for (id, record) in rows {
                let id = id
                    .parse::<u64>()
                    .map_err(|_err| self.invalid(&format!("record id '{id}' is not a number")))?;
                self.records.insert(id, record);
            }
        }

        Ok(())
    }

    fn invalid(&self, reason: &str) -> StoreError {
        StoreError::Invalid {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Adds a finding in memory and returns its record id.
    pub fn insert(&mut self, finding: &Finding) -> Result<u64, StoreError> {
        let record = serde_json::to_value(finding).map_err(|source| self.serialize_error(source))?;
        let id = self.records.last_key_value().map_or(1, |(last, _)| last + 1);
        self.records.insert(id, record);
        Ok(id)
    }

    /// Inserts `findings` and writes the store to disk.
    ///
    /// Returns the number of findings added. Nothing is written when
    /// `findings` is empty.
    pub fn append<'a>(&mut self, findings: impl IntoIterator<Item = &'a Finding>) -> Result<usize, StoreError> {
        let mut added = 0;
        for finding in findings {
            self.insert(finding)?;
            added += 1;
        }

        if added > 0 {
            self.save()?;
        }

        Ok(added)
    }

    /// Raw records in id order.
    pub fn records(&self) -> impl Iterator<Item = (u64, &Value)> {
        self.records.iter().map(|(id, record)| (*id, record))
    }

    /// Records that parse as [`Finding`]s, in id order.
    ///
    /// Records written by other tools with different fields are skipped.
    #[must_use]
    pub fn findings(&self) -> Vec<Finding> {
        self.records
            .values()
            .filter_map(|record| serde_json::from_value(record.clone()).ok())
            .collect()
    }

    /// Serialises the document with four-space indentation and sorted keys.
    pub fn to_json(&self) -> Result<String, StoreError> {
        let mut tables = self.other_tables.clone();
        let rows: Map<String, Value> = self
            .records
            .iter()
            .map(|(id, record)| (id.to_string(), record.clone()))
            .collect();
        tables.insert(DEFAULT_TABLE.to_string(), Value::Object(rows));

        let document = sort_keys(Value::Object(tables));

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        document
            .serialize(&mut serializer)
            .map_err(|source| self.serialize_error(source))?;

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn serialize_error(&self, source: serde_json::Error) -> StoreError {
        StoreError::Serialize {
            path: self.path.clone(),
            source,
        }
    }

    /// Atomically writes the store to its path, creating parent directories.
    pub fn save(&self) -> Result<(), StoreError> {
        crate::fs_util::atomic_write(&self.path, &self.to_json()?).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), records = self.records.len(), "saved results file");
        Ok(())
    }

    /// Moves an existing store at `path` aside to
    /// `<stem>-<YYYYmmddTHHMMSS>.<ext>` so the next scan starts fresh.
    ///
    /// Returns the new location, or `None` if there was nothing to rotate.
    pub fn rotate(path: &Path) -> Result<Option<PathBuf>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }

        let target = rotation_target(path, &Local::now().format(ROTATION_TIMESTAMP).to_string());

        fs::rename(path, &target).map_err(|source| StoreError::Rotate {
            path: path.to_path_buf(),
            source,
        })?;

        info!(from = %path.display(), to = %target.display(), "consolidated previous results file");
        Ok(Some(target))
    }
}

fn rotation_target(path: &Path, stamp: &str) -> PathBuf {
    let stem = path.file_stem().map_or_else(|| "results".into(), |s| s.to_string_lossy());
    let extension = path.extension().map(|e| e.to_string_lossy());

    let file_name = |suffix: &str| match &extension {
        Some(ext) => format!("{stem}-{stamp}{suffix}.{ext}"),
        None => format!("{stem}-{stamp}{suffix}"),
    };

    let mut candidate = path.with_file_name(file_name(""));
    let mut counter = 1;
    while candidate.exists() {
        candidate = path.with_file_name(file_name(&format!("-{counter}")));
        counter += 1;
    }

    candidate
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
