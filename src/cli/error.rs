//! CLI error types and conversions

use crate::batch::BatchError;
use crate::collector::CollectorError;
use crate::github::ApiError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Collection error
    #[error("collection error: {0}")]
    CollectorError(#[from] CollectorError),

    /// Batch file error
    #[error("batch error: {0}")]
    BatchError(#[from] BatchError),

    /// Transport error
    #[error("API error: {0}")]
    ApiError(#[from] ApiError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Verification found invariant violations
    #[error("verification failed: {0}")]
    VerificationFailed(String),
}
