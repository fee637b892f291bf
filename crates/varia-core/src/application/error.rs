//! Application layer errors.
//!
//! These errors represent failures in orchestration, not document or
//! criteria logic. Those are `DomainError` from `crate::domain`.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors that occur during application orchestration.
#[derive(Debug, Error, Clone)]
pub enum ApplicationError {
    /// Filesystem operation failed.
    #[error("Filesystem error at {path}: {reason}")]
    FilesystemError { path: PathBuf, reason: String },

    /// Rendering a definition to text failed.
    #[error("Rendering {path} failed: {reason}")]
    RenderingFailed { path: PathBuf, reason: String },

    /// Batch root already exists and overwriting was not allowed.
    #[error("Batch already exists at {path}")]
    BatchExists { path: PathBuf },

    /// Experiment directories under a batch root do not match the criteria.
    #[error(
        "Batch at {root} holds {found} experiment directories but the criteria define {expected}"
    )]
    ExperimentCountMismatch {
        root: PathBuf,
        expected: usize,
        found: usize,
    },

    /// A change log was read before the scaffolding stage wrote it.
    #[error("No change log at {path}")]
    ChangeLogMissing { path: PathBuf },

    /// Shared state lock poisoned.
    #[error("Filesystem state lock poisoned")]
    StoreLockError,

    /// Run subdivision that cannot be carried out, e.g. seeds past `u64::MAX`.
    #[error("Invalid run plan: {reason}")]
    InvalidRunPlan { reason: String },
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::FilesystemError { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have write permissions".into(),
                "Ensure the parent directory exists".into(),
            ],
            Self::BatchExists { path } => vec![
                format!("Directory already exists: {}", path.display()),
                "Use --force to regenerate the batch in place".into(),
                "Or choose a different --output directory".into(),
            ],
            Self::ExperimentCountMismatch { root, .. } => vec![
                format!("{} contains experiments from another batch", root.display()),
                "Remove stale experiment directories or scaffold into a fresh root".into(),
            ],
            Self::ChangeLogMissing { .. } => vec![
                "Scaffold the batch before querying it".into(),
                "Try: varia scaffold --template <file> --criteria <spec> --output <dir>".into(),
            ],
            Self::InvalidRunPlan { .. } => vec![
                "Lower --seed so that seed + run index stays within 64 bits".into(),
            ],
            Self::StoreLockError => vec!["Try again in a moment".into()],
            _ => vec!["Check the error details above".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::FilesystemError { .. }
            | Self::RenderingFailed { .. }
            | Self::StoreLockError => ErrorCategory::Internal,
            Self::BatchExists { .. } | Self::InvalidRunPlan { .. } => ErrorCategory::Validation,
            Self::ExperimentCountMismatch { .. } => ErrorCategory::Consistency,
            Self::ChangeLogMissing { .. } => ErrorCategory::NotFound,
        }
    }
}
