//! Application services - orchestrate use cases.
//!
//! Services coordinate the domain layer and ports to accomplish
//! high-level use cases like "scaffold a batch" or "query an experiment".

pub mod changelog_service;
pub mod scaffold_service;
pub mod writer;

pub use changelog_service::{CHANGELOG_FILE, ChangeLogService, changelog_path};
pub use scaffold_service::{
    BatchPlan, ExperimentReport, RunPlan, ScaffoldOptions, ScaffoldReport, ScaffoldService,
};
pub use writer::DefinitionWriter;
