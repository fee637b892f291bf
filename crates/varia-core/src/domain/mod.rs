//! Core domain layer for Varia.
//!
//! This module contains pure logic: node paths, change values, batch
//! criteria and the change-log codec. All document parsing and I/O are
//! handled via ports (traits) defined in the application layer.
//!
//! - **No I/O**: no filesystem or process calls
//! - **Deterministic**: the same criteria always generate the same batch
//! - **Value types**: everything here is `Clone + PartialEq`

pub mod changelog;
pub mod changes;
pub mod criteria;
pub mod error;
pub mod experiment;
pub mod format;
pub mod path;
pub mod write_spec;

pub use changelog::{CHANGELOG_FORMAT, ChangeLog, RunRecord};
pub use changes::{
    AttributeChange, AttributeChangeSet, AuditTrail, ElementAdd, ElementAddList, ElementRemove,
    ElementRename, Mutation,
};
pub use criteria::{
    BatchCriteria, BivariateCriteria, CRITERIA_REGISTRY, CriteriaDef, CriteriaKind,
    POPULATION_ATTR, POPULATION_PATH, UnivariateCriteria,
};
pub use error::{DomainError, DomainResult, ErrorCategory};
pub use experiment::{ExperimentDef, ExperimentName};
pub use format::DefinitionFormat;
pub use path::{NodeAddr, NodePath, NodeTree};
pub use write_spec::{Graft, NEW_ROOT_MARKER, NewRoot, WriteSpec, WriteSpecSet};
