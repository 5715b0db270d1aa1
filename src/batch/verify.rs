//! Post-hoc batch verification
//!
//! Scans the batch files persisted for one item type and reports structured
//! findings instead of failing fast: duplicated items, creation dates
//! outside the collected range, state mismatches, and count/numbering
//! integrity problems. Tolerable data-shape anomalies (missing metadata,
//! items without dates or states) produce no findings at all.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use super::{item_created_at, item_id, item_state, list_batch_files, BatchFile, BatchResult};

/// An item id found in more than one batch file.
/// The first file listed is the authoritative copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateEntry {
    /// Duplicated item id
    pub item_id: i64,
    /// Files containing the item, in first-seen order
    pub files: Vec<String>,
}

/// Which side of the collected range a date violation falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// Created before the range's start
    Lower,
    /// Created at or after the range's end
    Upper,
}

/// An item created outside the collected date range
#[derive(Debug, Clone)]
pub struct DateRangeViolation {
    /// Offending item id, when one could be read
    pub item_id: Option<i64>,
    /// File holding the item
    pub file: String,
    /// The item's creation timestamp
    pub created_at: DateTime<Utc>,
    /// Violated bound
    pub bound: DateBound,
}

/// An item whose state does not match the expected filter
#[derive(Debug, Clone)]
pub struct StateViolation {
    /// Offending item id, when one could be read
    pub item_id: Option<i64>,
    /// File holding the item
    pub file: String,
    /// State the collection ran with
    pub expected: String,
    /// State the item actually carries
    pub actual: String,
}

/// What kind of integrity problem a file has
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityKind {
    /// Declared `item_count` disagrees with the array length
    CountMismatch {
        /// Count declared in metadata
        declared: u64,
        /// Items actually present
        actual: u64,
    },
    /// Batch numbering is not sequential at this file
    IndexGap {
        /// Index the sequence called for
        expected: usize,
        /// Index actually found
        found: usize,
    },
    /// The file could not be read as a batch at all
    UnreadableFile {
        /// Underlying problem
        detail: String,
    },
}

/// A non-fatal integrity finding attached to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityIssue {
    /// File the issue was found in
    pub file: String,
    /// The problem
    pub kind: IntegrityKind,
}

/// Everything one verification pass found
#[derive(Debug, Clone, Default)]
pub struct VerificationResult {
    /// Item ids present in more than one file
    pub duplicates: Vec<DuplicateEntry>,
    /// Items created outside the collected range
    pub date_range_violations: Vec<DateRangeViolation>,
    /// Items whose state does not match the filter
    pub state_violations: Vec<StateViolation>,
    /// Count and numbering problems (warnings only)
    pub integrity_issues: Vec<IntegrityIssue>,
    /// Batch files scanned
    pub files_scanned: usize,
    /// Items seen across all files
    pub total_items: usize,
}

impl VerificationResult {
    /// Whether the dataset holds its invariants.
    /// Integrity issues are warnings and do not fail a pass.
    pub fn passed(&self) -> bool {
        self.duplicates.is_empty()
            && self.date_range_violations.is_empty()
            && self.state_violations.is_empty()
    }
}

/// Scans persisted batch files and reports invariant violations
pub struct BatchVerifier;

impl BatchVerifier {
    /// Verify every batch file for `item_type` under `directory`.
    ///
    /// `expected_state` of `None` or `"all"` skips state checking. `after`
    /// is the inclusive lower creation-date bound, `before` the exclusive
    /// upper bound; items without a readable creation date are skipped.
    /// Errors only when the directory itself cannot be listed; unreadable
    /// files become integrity findings.
    pub fn verify(
        directory: &Path,
        item_type: &str,
        expected_state: Option<&str>,
        after: Option<NaiveDate>,
        before: Option<NaiveDate>,
    ) -> BatchResult<VerificationResult> {
        let files = list_batch_files(directory, item_type)?;
        debug!(
            directory = %directory.display(),
            item_type = item_type,
            files = files.len(),
            "Verifying batch files"
        );

        let state_filter = expected_state.filter(|s| !s.eq_ignore_ascii_case("all"));
        let after_bound = after.map(|d| d.and_time(NaiveTime::MIN).and_utc());
        let before_bound = before.map(|d| d.and_time(NaiveTime::MIN).and_utc());

        let mut result = VerificationResult::default();
        // First-seen order of duplicated ids, not hash order
        let mut occurrence_order: Vec<DuplicateEntry> = Vec::new();
        let mut occurrence_index: HashMap<i64, usize> = HashMap::new();
        let mut previous_index: usize = 0;

        for (index, file_name) in &files {
            result.files_scanned += 1;

            if *index != previous_index + 1 {
                result.integrity_issues.push(IntegrityIssue {
                    file: file_name.clone(),
                    kind: IntegrityKind::IndexGap {
                        expected: previous_index + 1,
                        found: *index,
                    },
                });
            }
            previous_index = *index;

            let batch = match BatchFile::load(&directory.join(file_name), item_type) {
                Ok(batch) => batch,
                Err(err) => {
                    result.integrity_issues.push(IntegrityIssue {
                        file: file_name.clone(),
                        kind: IntegrityKind::UnreadableFile {
                            detail: err.to_string(),
                        },
                    });
                    continue;
                }
            };

            let actual = batch.items.len() as u64;
            if let Some(declared) = batch.metadata.as_ref().and_then(|m| m.item_count) {
                if declared != actual {
                    result.integrity_issues.push(IntegrityIssue {
                        file: file_name.clone(),
                        kind: IntegrityKind::CountMismatch { declared, actual },
                    });
                }
            }

            result.total_items += batch.items.len();

            for item in &batch.items {
                let id = item_id(item);

                if let Some(id) = id {
                    match occurrence_index.get(&id) {
                        Some(&slot) => {
                            let entry = &mut occurrence_order[slot];
                            // Two copies inside one file still list it once
                            if entry.files.last().map(String::as_str) != Some(file_name.as_str())
                            {
                                entry.files.push(file_name.clone());
                            }
                        }
                        None => {
                            occurrence_index.insert(id, occurrence_order.len());
                            occurrence_order.push(DuplicateEntry {
                                item_id: id,
                                files: vec![file_name.clone()],
                            });
                        }
                    }
                }

                if let Some(created_at) = item_created_at(item) {
                    if let Some(lower) = after_bound {
                        if created_at < lower {
                            result.date_range_violations.push(DateRangeViolation {
                                item_id: id,
                                file: file_name.clone(),
                                created_at,
                                bound: DateBound::Lower,
                            });
                        }
                    }
                    if let Some(upper) = before_bound {
                        if created_at >= upper {
                            result.date_range_violations.push(DateRangeViolation {
                                item_id: id,
                                file: file_name.clone(),
                                created_at,
                                bound: DateBound::Upper,
                            });
                        }
                    }
                }

                if let Some(expected) = state_filter {
                    if let Some(actual_state) = item_state(item) {
                        if !actual_state.eq_ignore_ascii_case(expected) {
                            result.state_violations.push(StateViolation {
                                item_id: id,
                                file: file_name.clone(),
                                expected: expected.to_string(),
                                actual: actual_state.to_string(),
                            });
                        }
                    }
                }
            }
        }

        result.duplicates = occurrence_order
            .into_iter()
            .filter(|entry| entry.files.len() > 1)
            .collect();

        info!(
            directory = %directory.display(),
            item_type = item_type,
            files_scanned = result.files_scanned,
            total_items = result.total_items,
            duplicates = result.duplicates.len(),
            date_violations = result.date_range_violations.len(),
            state_violations = result.state_violations.len(),
            integrity_issues = result.integrity_issues.len(),
            passed = result.passed(),
            "Verification complete"
        );
        Ok(result)
    }
}
