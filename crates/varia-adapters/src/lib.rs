//! Infrastructure adapters for Varia.
//!
//! This crate implements the ports defined in `varia-core::application::ports`.
//! It contains all external dependencies and I/O operations: the XML, YAML
//! and TOML document backends, the filesystems, and the write-spec manifest
//! loader.

pub mod definition;
pub mod filesystem;
pub mod write_spec_loader;

// Re-export commonly used adapters
pub use definition::{
    TomlDefinition, XmlDefinition, YamlDefinition, load_definition, parse_definition,
};
pub use filesystem::{LocalFilesystem, MemoryFilesystem};
pub use write_spec_loader::{load_write_specs, parse_write_specs};
