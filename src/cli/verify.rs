//! Verify and dedup command implementations

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use crate::batch::{
    BatchDeduplicator, BatchVerifier, DateBound, IntegrityKind, VerificationResult,
};
use crate::ItemKind;

use super::CliError;

/// Verify previously collected batch files
#[derive(Parser, Debug)]
pub struct VerifyCommand {
    /// Directory holding the batch files
    pub directory: PathBuf,

    /// Item kind the batches were collected as
    pub item_kind: ItemKind,

    /// State every item is expected to carry (skipped for "all")
    #[arg(long)]
    pub state: Option<String>,

    /// Inclusive creation-date lower bound (YYYY-MM-DD)
    #[arg(long)]
    pub after: Option<NaiveDate>,

    /// Exclusive creation-date upper bound (YYYY-MM-DD)
    #[arg(long)]
    pub before: Option<NaiveDate>,
}

impl VerifyCommand {
    /// Execute the verify command
    pub async fn execute(&self) -> Result<(), CliError> {
        let result = BatchVerifier::verify(
            &self.directory,
            self.item_kind.type_name(),
            self.state.as_deref(),
            self.after,
            self.before,
        )?;

        print_result(&result);

        if result.passed() {
            Ok(())
        } else {
            Err(CliError::VerificationFailed(format!(
                "{} duplicate(s), {} date violation(s), {} state violation(s)",
                result.duplicates.len(),
                result.date_range_violations.len(),
                result.state_violations.len()
            )))
        }
    }
}

/// Remove duplicates found by verification and renumber batches
#[derive(Parser, Debug)]
pub struct DedupCommand {
    /// Directory holding the batch files
    pub directory: PathBuf,

    /// Item kind the batches were collected as
    pub item_kind: ItemKind,
}

impl DedupCommand {
    /// Execute the dedup command: verify first, then apply the findings
    pub async fn execute(&self) -> Result<(), CliError> {
        let verification = BatchVerifier::verify(
            &self.directory,
            self.item_kind.type_name(),
            None,
            None,
            None,
        )?;

        if verification.duplicates.is_empty() {
            println!(
                "No duplicates across {} file(s); nothing to do",
                verification.files_scanned
            );
            return Ok(());
        }

        let report = BatchDeduplicator::deduplicate(
            &self.directory,
            self.item_kind.type_name(),
            &verification.duplicates,
        )?;

        println!("Deduplication complete:");
        println!("  Duplicates removed: {}", report.duplicates_removed);
        println!("  Files rewritten:    {}", report.files_rewritten);
        println!("  Files deleted:      {}", report.files_deleted);
        println!("  Files renumbered:   {}", report.files_renumbered);

        Ok(())
    }
}

/// Print verification findings in a human-readable form
fn print_result(result: &VerificationResult) {
    println!(
        "Scanned {} file(s), {} item(s)",
        result.files_scanned, result.total_items
    );

    if !result.duplicates.is_empty() {
        println!("\nDuplicates ({}):", result.duplicates.len());
        for entry in &result.duplicates {
            println!("  - item #{} in {}", entry.item_id, entry.files.join(", "));
        }
    }

    if !result.date_range_violations.is_empty() {
        println!(
            "\nDate range violations ({}):",
            result.date_range_violations.len()
        );
        for violation in &result.date_range_violations {
            let bound = match violation.bound {
                DateBound::Lower => "before range",
                DateBound::Upper => "past range",
            };
            let id = violation
                .item_id
                .map(|id| format!("#{id}"))
                .unwrap_or_else(|| "<no id>".to_string());
            println!(
                "  - item {} in {} created {} ({})",
                id, violation.file, violation.created_at, bound
            );
        }
    }

    if !result.state_violations.is_empty() {
        println!("\nState violations ({}):", result.state_violations.len());
        for violation in &result.state_violations {
            let id = violation
                .item_id
                .map(|id| format!("#{id}"))
                .unwrap_or_else(|| "<no id>".to_string());
            println!(
                "  - item {} in {}: expected {}, got {}",
                id, violation.file, violation.expected, violation.actual
            );
        }
    }

    if !result.integrity_issues.is_empty() {
        println!(
            "\nIntegrity warnings ({}):",
            result.integrity_issues.len()
        );
        for issue in &result.integrity_issues {
            match &issue.kind {
                IntegrityKind::CountMismatch { declared, actual } => println!(
                    "  - {}: declares {} item(s) but holds {}",
                    issue.file, declared, actual
                ),
                IntegrityKind::IndexGap { expected, found } => println!(
                    "  - {}: expected batch index {}, found {}",
                    issue.file, expected, found
                ),
                IntegrityKind::UnreadableFile { detail } => {
                    println!("  - {}: {}", issue.file, detail)
                }
            }
        }
    }

    println!(
        "\nResult: {}",
        if result.passed() { "PASSED" } else { "FAILED" }
    );
}
