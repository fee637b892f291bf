// ============================================================================
// domain/error.rs - DOCUMENT & CRITERIA ERRORS
// ============================================================================

use thiserror::Error;

/// Root domain error type.
///
/// All errors are:
/// - Cloneable (the same failure can be reported per experiment)
/// - Categorizable (for CLI display and exit codes)
/// - Actionable (provides suggestions)
///
/// Soft structural failures (a path that matches nothing, an attribute that
/// is absent) are *not* errors: mutation operations report them as `false`
/// plus a `tracing::warn!` event.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Specification Errors (rejected before anything is mutated)
    // ========================================================================
    #[error("invalid node path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid batch criteria '{spec}': {reason}")]
    InvalidCriteria { spec: String, reason: String },

    #[error("unknown batch criteria category '{category}'")]
    UnknownCriteria { category: String },

    #[error("no batch criteria given")]
    MissingCriteria,

    #[error("at most two batch criteria can be combined, got {count}")]
    TooManyCriteria { count: usize },

    #[error("batch criteria category '{category}' given twice")]
    DuplicateCriteria { category: String },

    #[error("both criteria write attribute '{attr}' at '{path}'")]
    ConflictingWrites { path: String, attr: String },

    #[error("experiment name '{name}' generated more than once")]
    DuplicateExperimentName { name: String },

    #[error("invalid experiment name '{name}': {reason}")]
    InvalidExperimentName { name: String, reason: String },

    #[error("invalid write spec: {0}")]
    InvalidWriteSpec(String),

    // ========================================================================
    // Consistency Errors (the documents disagree with the request)
    // ========================================================================
    #[error("path '{path}' matched {count} nodes where exactly one was required")]
    AmbiguousMatch { path: String, count: usize },

    // ========================================================================
    // Input Errors
    // ========================================================================
    #[error("unsupported definition format '{0}'")]
    UnsupportedFormat(String),

    #[error("invalid experiment definition: {0}")]
    InvalidDefinition(String),

    #[error("invalid change log at line {line}: {reason}")]
    InvalidChangeLog { line: usize, reason: String },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidPath { .. } => vec![
                "Paths look like './/arena/distribute/entity' or './arena[@id='a'][1]'".into(),
                "Steps use '/' (child) or '//' (descendant); '*' matches any tag".into(),
            ],
            Self::InvalidCriteria { reason, .. } => vec![
                format!("Details: {}", reason),
                "Criteria are written as <category>.<definition>, e.g. population_size.Log8".into(),
                "Try: varia criteria to see the grammar of each category".into(),
            ],
            Self::UnknownCriteria { category } => vec![
                format!("'{}' is not a registered category", category),
                "Try: varia criteria".into(),
            ],
            Self::MissingCriteria => vec!["Pass --criteria once or twice".into()],
            Self::TooManyCriteria { .. } => vec![
                "Combine at most two criteria (a bivariate batch)".into(),
                "Split larger studies into several batches".into(),
            ],
            Self::DuplicateCriteria { category } => vec![
                format!("Merge both '{}' criteria into one definition", category),
            ],
            Self::ConflictingWrites { path, attr } => vec![
                format!("Only one of the criteria may vary {}@{}", path, attr),
                "Combine the values into a single univariate criteria instead".into(),
            ],
            Self::AmbiguousMatch { path, .. } => vec![
                format!("Narrow '{}' with a predicate such as [@id='...'] or [1]", path),
            ],
            Self::UnsupportedFormat(_) => vec![
                "Supported extensions: .xml, .argos, .launch, .yaml, .yml, .toml".into(),
            ],
            Self::InvalidChangeLog { .. } => vec![
                "The change log was edited or truncated by hand".into(),
                "Re-scaffold the batch with --force to regenerate it".into(),
            ],
            _ => vec!["See documentation for more details".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidPath { .. }
            | Self::InvalidCriteria { .. }
            | Self::UnknownCriteria { .. }
            | Self::MissingCriteria
            | Self::TooManyCriteria { .. }
            | Self::DuplicateCriteria { .. }
            | Self::ConflictingWrites { .. }
            | Self::DuplicateExperimentName { .. }
            | Self::InvalidExperimentName { .. }
            | Self::InvalidWriteSpec(_) => ErrorCategory::Specification,
            Self::AmbiguousMatch { .. } => ErrorCategory::Consistency,
            Self::UnsupportedFormat(_)
            | Self::InvalidDefinition(_)
            | Self::InvalidChangeLog { .. } => ErrorCategory::Input,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Specification,
    Consistency,
    Input,
}

pub type DomainResult<T> = Result<T, DomainError>;
