//! Filesystem-backed batch store
//!
//! Owns the destination layout for collection runs: one directory per
//! repository and item type under a configurable root, holding the numbered
//! batch files. Single-writer discipline on a destination directory is the
//! caller's responsibility.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::collector::CollectionRequest;

use super::{batch_file_name, list_batch_files, BatchFile, BatchMetadata, BatchResult};

/// Persists collection batches under `root/<owner_name>/<item_type>/`
#[derive(Debug, Clone)]
pub struct FsBatchStore {
    root: PathBuf,
}

impl FsBatchStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Destination directory for a request, without touching the filesystem
    pub fn output_directory(&self, request: &CollectionRequest) -> PathBuf {
        self.root
            .join(sanitize_path_component(&request.repository))
            .join(request.item_kind.type_name())
    }

    /// Ensure the destination directory exists and return it
    pub fn create_output_directory(&self, request: &CollectionRequest) -> BatchResult<PathBuf> {
        let directory = self.output_directory(request);
        std::fs::create_dir_all(&directory).map_err(|e| {
            super::BatchError::Io(format!(
                "failed to create output directory {}: {e}",
                directory.display()
            ))
        })?;
        Ok(directory)
    }

    /// Remove the request's previous batch files, leaving unrelated files
    /// (and other item types' batches) untouched. Returns how many files
    /// were removed; a missing directory removes nothing.
    pub fn clean_output_directory(&self, request: &CollectionRequest) -> BatchResult<usize> {
        let directory = self.output_directory(request);
        if !directory.is_dir() {
            return Ok(0);
        }

        let files = list_batch_files(&directory, request.item_kind.type_name())?;
        for (_, file_name) in &files {
            let path = directory.join(file_name);
            std::fs::remove_file(&path).map_err(|e| {
                super::BatchError::Io(format!("failed to remove {}: {e}", path.display()))
            })?;
        }

        if !files.is_empty() {
            info!(
                directory = %directory.display(),
                removed = files.len(),
                "Cleaned previous batch files"
            );
        }
        Ok(files.len())
    }

    /// Persist one numbered batch and return its file name
    pub fn save_batch(
        &self,
        directory: &Path,
        index: usize,
        request: &CollectionRequest,
        items: Vec<Value>,
    ) -> BatchResult<String> {
        let file_name = batch_file_name(index, request.item_kind.type_name());
        let batch = BatchFile {
            metadata: Some(BatchMetadata {
                batch_index: Some(index as u64),
                item_count: Some(items.len() as u64),
                collection_type: Some(request.item_kind.type_name().to_string()),
                repository: Some(request.repository.clone()),
                state: request.state.clone(),
            }),
            item_type: request.item_kind.type_name().to_string(),
            items,
        };

        batch.save(&directory.join(&file_name))?;
        debug!(
            file = %file_name,
            items = batch.items.len(),
            "Saved batch file"
        );
        Ok(file_name)
    }
}

/// Make a repository name safe as a single path component:
/// `owner/name` becomes `owner_name`, traversal sequences are defused.
fn sanitize_path_component(name: &str) -> String {
    name.replace("..", "__").replace(['/', '\\', ':'], "_")
}
