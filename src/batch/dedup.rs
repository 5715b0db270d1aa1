//! Duplicate removal and batch renumbering
//!
//! Consumes the verifier's duplicate findings and restores the dataset
//! invariants: each duplicated item survives only in its first file, files
//! left empty are deleted, and the remaining files are renumbered to a
//! contiguous `1..N` sequence with filenames and metadata rewritten to
//! match.
//!
//! The whole plan - rewrites, deletions, renames - is computed in memory
//! before the first filesystem mutation, shrinking the window in which a
//! crash can leave mixed state. The input findings are trusted as-is;
//! running against a directory modified since they were produced is
//! undefined behavior.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

use super::{batch_file_name, item_id, list_batch_files, BatchError, BatchFile, BatchResult};
use super::verify::DuplicateEntry;

/// What one deduplication run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeduplicationReport {
    /// Duplicate item occurrences removed
    pub duplicates_removed: usize,
    /// Files whose item array changed
    pub files_rewritten: usize,
    /// Files deleted because deduplication emptied them
    pub files_deleted: usize,
    /// Files whose batch index changed
    pub files_renumbered: usize,
}

/// One planned action over a surviving or emptied batch file
struct FilePlan {
    file_name: String,
    new_index: usize,
    batch: BatchFile,
    removed: usize,
    renamed: bool,
}

/// Rewrites, deletes and renumbers batch files to clear duplicate findings
pub struct BatchDeduplicator;

impl BatchDeduplicator {
    /// Apply `duplicates` to the batch files for `item_type` under
    /// `directory`.
    ///
    /// For each finding the item stays in its first (authoritative) file
    /// and is removed from every later one. Idempotent: findings taken
    /// from the cleaned directory remove nothing and change no file.
    pub fn deduplicate(
        directory: &Path,
        item_type: &str,
        duplicates: &[DuplicateEntry],
    ) -> BatchResult<DeduplicationReport> {
        // ids to strip, keyed by the files that hold the non-authoritative
        // copies
        let mut removals: HashMap<&str, HashSet<i64>> = HashMap::new();
        for entry in duplicates {
            for file in entry.files.iter().skip(1) {
                removals.entry(file.as_str()).or_default().insert(entry.item_id);
            }
        }

        // Plan phase: load everything and decide every file's fate before
        // touching the filesystem.
        let files = list_batch_files(directory, item_type)?;
        let mut survivors: Vec<FilePlan> = Vec::new();
        let mut deletions: Vec<String> = Vec::new();
        let mut report = DeduplicationReport::default();

        for (old_index, file_name) in &files {
            let mut batch = BatchFile::load(&directory.join(file_name), item_type)?;

            let removed = match removals.get(file_name.as_str()) {
                Some(ids) => {
                    let before = batch.items.len();
                    batch
                        .items
                        .retain(|item| item_id(item).map_or(true, |id| !ids.contains(&id)));
                    before - batch.items.len()
                }
                None => 0,
            };
            report.duplicates_removed += removed;

            if batch.items.is_empty() {
                deletions.push(file_name.clone());
                continue;
            }

            let new_index = survivors.len() + 1;
            survivors.push(FilePlan {
                file_name: file_name.clone(),
                new_index,
                batch,
                removed,
                renamed: new_index != *old_index,
            });
        }

        // Apply phase: deletions first so every rename target is free, then
        // survivors in ascending order (a file only ever moves to a lower
        // index, and the previous holder of that index has already moved or
        // been deleted).
        for file_name in &deletions {
            let path = directory.join(file_name);
            std::fs::remove_file(&path)
                .map_err(|e| BatchError::Io(format!("failed to delete {}: {e}", path.display())))?;
            info!(file = %file_name, "Deleted emptied batch file");
            report.files_deleted += 1;
        }

        for mut plan in survivors {
            if plan.removed > 0 {
                report.files_rewritten += 1;
            }
            if plan.renamed {
                report.files_renumbered += 1;
            }
            if plan.removed == 0 && !plan.renamed {
                continue;
            }

            if let Some(metadata) = plan.batch.metadata.as_mut() {
                metadata.batch_index = Some(plan.new_index as u64);
                metadata.item_count = Some(plan.batch.items.len() as u64);
            }

            let new_name = batch_file_name(plan.new_index, item_type);
            plan.batch.save(&directory.join(&new_name))?;
            if plan.renamed {
                let old_path = directory.join(&plan.file_name);
                std::fs::remove_file(&old_path).map_err(|e| {
                    BatchError::Io(format!("failed to remove {}: {e}", old_path.display()))
                })?;
                debug!(from = %plan.file_name, to = %new_name, "Renumbered batch file");
            } else {
                debug!(file = %new_name, removed = plan.removed, "Rewrote batch file");
            }
        }

        info!(
            directory = %directory.display(),
            item_type = item_type,
            duplicates_removed = report.duplicates_removed,
            files_rewritten = report.files_rewritten,
            files_deleted = report.files_deleted,
            files_renumbered = report.files_renumbered,
            "Deduplication complete"
        );
        Ok(report)
    }
}
