//! Varia Core - Hexagonal Architecture Implementation
//!
//! This crate provides the domain and application layers for Varia, which
//! turns one template experiment definition plus batch criteria into a
//! reproducible batch of experiment directories.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            varia-cli (CLI)              │
//! │     (Implements Driving Ports)          │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Application Services            │
//! │ (ScaffoldService, ChangeLogService,     │
//! │  DefinitionWriter, ExperimentDefinition)│
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │       Application Ports (Traits)        │
//! │   (Driven: Filesystem, Definition-      │
//! │    Backend)                             │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │     varia-adapters (Infrastructure)     │
//! │ (Xml/Yaml/TomlDefinition, Filesystems)  │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │        Domain Layer (Pure Logic)        │
//! │ (NodePath, BatchCriteria, ChangeLog)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use varia_core::prelude::*;
//!
//! let criteria = BatchCriteria::parse(&["population_size.Log8"])?;
//! let plan = BatchPlan::new("batch", criteria, "template.argos");
//!
//! let service = ScaffoldService::new(filesystem);
//! let report = service.scaffold(&plan, &template)?;
//!
//! let logs = ChangeLogService::new(filesystem);
//! let size = logs.population_size(&report.experiments[1].dir)?;
//! ```

pub mod domain;

pub mod application;

pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        ApplyReport, BatchPlan, ChangeLogService, DefinitionWriter, ExperimentDefinition,
        RunPlan, ScaffoldOptions, ScaffoldReport, ScaffoldService,
        ports::{DefinitionBackend, Filesystem},
    };
    pub use crate::domain::{
        AttributeChange, BatchCriteria, ChangeLog, DefinitionFormat, ElementAdd, ExperimentDef,
        ExperimentName, NodePath, WriteSpec, WriteSpecSet,
    };
    pub use crate::error::{VariaError, VariaResult};
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
