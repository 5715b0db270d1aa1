//! Batch file model and persistence
//!
//! A batch file is one numbered, size-bounded chunk of collected items:
//!
//! ```json
//! {
//!   "metadata": {
//!     "batch_index": 1,
//!     "item_count": 2,
//!     "collection_type": "issues",
//!     "repository": "octocat/hello-world",
//!     "state": "open"
//!   },
//!   "issues": [ { "number": 1, ... }, { "number": 2, ... } ]
//! }
//! ```
//!
//! Filenames follow `batch_<NNN>_<item_type>.json` with the index
//! zero-padded to three digits; renumbering in [`dedup`] relies on this
//! exact contract. The filesystem is the sole source of truth for batch
//! content - nothing here caches across invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;
use tracing::warn;

pub mod dedup;
pub mod store;
pub mod verify;

pub use dedup::{BatchDeduplicator, DeduplicationReport};
pub use store::FsBatchStore;
pub use verify::{
    BatchVerifier, DateBound, DateRangeViolation, DuplicateEntry, IntegrityIssue, IntegrityKind,
    StateViolation, VerificationResult,
};

/// Batch file errors
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(String),

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(String),

    /// File exists but does not hold a usable batch
    #[error("malformed batch file {file}: {detail}")]
    Malformed {
        /// Offending file name
        file: String,
        /// What was wrong with it
        detail: String,
    },
}

/// Result type for batch operations
pub type BatchResult<T> = Result<T, BatchError>;

/// Optional descriptive wrapper persisted alongside the item array
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchMetadata {
    /// 1-based position of this file in the batch sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_index: Option<u64>,
    /// Declared number of items in the array
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_count: Option<u64>,
    /// Item type name the file was collected as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_type: Option<String>,
    /// Source repository in `owner/name` form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// State filter the collection ran with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// One batch file held in memory
#[derive(Debug, Clone)]
pub struct BatchFile {
    /// Metadata wrapper, absent in files written by older tooling
    pub metadata: Option<BatchMetadata>,
    /// Item type name keying the item array
    pub item_type: String,
    /// The items themselves, kept as raw JSON
    pub items: Vec<Value>,
}

impl BatchFile {
    /// Load a batch file, tolerating a missing or malformed metadata
    /// wrapper. A file whose item array is absent is an error.
    pub fn load(path: &Path, item_type: &str) -> BatchResult<Self> {
        let file_name = display_name(path);
        let contents = std::fs::read_to_string(path).map_err(|e| BatchError::Io(e.to_string()))?;
        let value: Value = serde_json::from_str(&contents).map_err(|e| BatchError::Malformed {
            file: file_name.clone(),
            detail: format!("invalid JSON: {e}"),
        })?;

        let Value::Object(mut object) = value else {
            return Err(BatchError::Malformed {
                file: file_name,
                detail: "top level is not an object".to_string(),
            });
        };

        let metadata = match object.remove("metadata") {
            Some(raw) => match serde_json::from_value::<BatchMetadata>(raw) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    warn!(file = %file_name, error = %e, "Ignoring malformed batch metadata");
                    None
                }
            },
            None => None,
        };

        let items = match object.remove(item_type) {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(BatchError::Malformed {
                    file: file_name,
                    detail: format!("'{item_type}' is not an array"),
                })
            }
            None => {
                return Err(BatchError::Malformed {
                    file: file_name,
                    detail: format!("missing '{item_type}' item array"),
                })
            }
        };

        Ok(Self {
            metadata,
            item_type: item_type.to_string(),
            items,
        })
    }

    /// Write the batch file atomically: serialize to a temp file in the
    /// destination directory, then persist over the target path.
    pub fn save(&self, path: &Path) -> BatchResult<()> {
        let mut object = Map::new();
        if let Some(metadata) = &self.metadata {
            let raw = serde_json::to_value(metadata)
                .map_err(|e| BatchError::Serialization(e.to_string()))?;
            object.insert("metadata".to_string(), raw);
        }
        object.insert(self.item_type.clone(), Value::Array(self.items.clone()));

        let json = serde_json::to_string_pretty(&Value::Object(object))
            .map_err(|e| BatchError::Serialization(e.to_string()))?;

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| BatchError::Io(format!("failed to create temp file: {e}")))?;
        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| BatchError::Io(format!("failed to write temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| BatchError::Io(format!("failed to flush temp file: {e}")))?;
        temp_file
            .persist(path)
            .map_err(|e| BatchError::Io(format!("failed to persist batch file: {e}")))?;

        Ok(())
    }
}

/// Format a batch file name: `batch_<NNN>_<item_type>.json`
pub fn batch_file_name(index: usize, item_type: &str) -> String {
    format!("batch_{index:03}_{item_type}.json")
}

/// Parse the batch index out of a file name of the given item type.
/// Returns `None` for anything that does not match the naming contract.
pub fn parse_batch_index(file_name: &str, item_type: &str) -> Option<usize> {
    let rest = file_name.strip_prefix("batch_")?;
    let rest = rest.strip_suffix(".json")?;
    let (index, name) = rest.split_once('_')?;
    if name != item_type {
        return None;
    }
    index.parse::<usize>().ok()
}

/// List a directory's batch files for one item type, ordered by file name.
/// Returns `(index, file_name)` pairs.
pub fn list_batch_files(directory: &Path, item_type: &str) -> BatchResult<Vec<(usize, String)>> {
    let entries = std::fs::read_dir(directory).map_err(|e| BatchError::Io(e.to_string()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BatchError::Io(e.to_string()))?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if let Some(index) = parse_batch_index(&file_name, item_type) {
            files.push((index, file_name));
        }
    }

    // Zero-padded names make lexical and numeric order agree; sort on both
    // so hand-renamed stragglers still land deterministically.
    files.sort_by(|a, b| a.cmp(b));
    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Identifier of an item: `number` preferred, `id` as fallback
pub fn item_id(item: &Value) -> Option<i64> {
    item.get("number")
        .and_then(Value::as_i64)
        .or_else(|| item.get("id").and_then(Value::as_i64))
}

/// The item's `state` field, when present
pub fn item_state(item: &Value) -> Option<&str> {
    item.get("state").and_then(Value::as_str)
}

/// The item's `created_at` field parsed as an ISO-8601 timestamp
pub fn item_created_at(item: &Value) -> Option<DateTime<Utc>> {
    let raw = item.get("created_at").and_then(Value::as_str)?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
