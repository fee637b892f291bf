//! Application layer for Varia.
//!
//! This layer contains:
//! - **Definition**: the change-tracking wrapper around a backend document
//! - **Services**: Use case orchestration (ScaffoldService, ChangeLogService, DefinitionWriter)
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Errors**: Application-specific error types
//!
//! The application layer coordinates the domain layer. Criteria, paths and
//! change-log encoding live in `crate::domain`.

pub mod definition;
pub mod error;
pub mod ports;
pub mod services;

pub use definition::{ApplyReport, ExperimentDefinition};

// Re-export main services
pub use services::{
    BatchPlan, ChangeLogService, DefinitionWriter, ExperimentReport, RunPlan, ScaffoldOptions,
    ScaffoldReport, ScaffoldService,
};

// Re-export port traits (for adapter implementation)
pub use ports::{DefinitionBackend, Filesystem};

pub use error::ApplicationError;
