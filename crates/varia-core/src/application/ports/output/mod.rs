//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the application needs from external systems.
//! The `varia-adapters` crate provides implementations.

use std::any::Any;
use std::fmt;
use std::path::Path;

use indexmap::IndexMap;

use crate::domain::{DefinitionFormat, DomainResult, NodePath};
use crate::error::VariaResult;

/// Port for filesystem operations.
///
/// Implemented by:
/// - `varia_adapters::filesystem::LocalFilesystem` (production)
/// - `varia_adapters::filesystem::MemoryFilesystem` (testing)
#[cfg_attr(test, mockall::automock)]
pub trait Filesystem: Send + Sync {
    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> VariaResult<()>;

    /// Write content to a file, replacing it.
    fn write_file(&self, path: &Path, content: &str) -> VariaResult<()>;

    /// Append content to a file, creating it if needed.
    fn append_file(&self, path: &Path, content: &str) -> VariaResult<()>;

    /// Read a whole file as UTF-8.
    fn read_file(&self, path: &Path) -> VariaResult<String>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Names of the immediate subdirectories of `path`, sorted.
    fn list_dirs(&self, path: &Path) -> VariaResult<Vec<String>>;

    /// Remove a directory and all contents.
    fn remove_dir_all(&self, path: &Path) -> VariaResult<()>;
}

/// Port for one in-memory experiment definition document.
///
/// Implemented by:
/// - `varia_adapters::definition::XmlDefinition` (markup tree)
/// - `varia_adapters::definition::YamlDefinition` (path-query tree)
/// - `varia_adapters::definition::TomlDefinition` (formatting-preserving path-query tree)
///
/// ## Contract
///
/// - A composite value (map, table, list, element) is an *element*; a
///   scalar reachable by name is an *attribute*.
/// - Soft structural failures return `false` (or `Ok(false)`) and emit a
///   `tracing::warn!`; the document is left unchanged.
/// - Edits that need a single target fail with `DomainError::AmbiguousMatch`
///   when a path-query backend resolves several; a markup backend uses the
///   first match.
pub trait DefinitionBackend: Send + Sync + fmt::Debug {
    fn format(&self) -> DefinitionFormat;

    /// Attribute of the first node `path` selects.
    fn attr_get(&self, path: &NodePath, attr: &str) -> Option<String>;

    /// Change an existing attribute of the selected node(s).
    fn attr_change(&mut self, path: &NodePath, attr: &str, value: &str) -> bool;

    /// Add an attribute that does not exist yet to the single selected node.
    fn attr_add(&mut self, path: &NodePath, attr: &str, value: &str) -> DomainResult<bool>;

    fn has_element(&self, path: &NodePath) -> bool;

    fn has_attr(&self, path: &NodePath, attr: &str) -> bool;

    /// Add a child element to the single node `parent` selects. Without
    /// `allow_dup` an existing `tag` child makes this a no-op.
    fn element_add(
        &mut self,
        parent: &NodePath,
        tag: &str,
        attrs: &IndexMap<String, String>,
        allow_dup: bool,
    ) -> DomainResult<bool>;

    /// Remove the first (or every, with `all`) `tag` child of each selected parent.
    fn element_remove(&mut self, parent: &NodePath, tag: &str, all: bool) -> bool;

    /// Rename `tag` children of the selected parent(s) to `new_tag`.
    fn element_change(&mut self, parent: &NodePath, tag: &str, new_tag: &str) -> bool;

    /// Deep copy of the first subtree `path` selects, as a document whose
    /// single top-level element is that subtree. `.` copies the document.
    fn extract(&self, path: &NodePath) -> Option<Box<dyn DefinitionBackend>>;

    /// Rename the single top-level element.
    fn rename_root(&mut self, tag: &str) -> bool;

    /// Empty document of the same format with a new top-level element.
    fn with_root(&self, tag: &str, attrs: &IndexMap<String, String>) -> Box<dyn DefinitionBackend>;

    /// Append the top-level element(s) of `subtree` under `dest`.
    fn graft(&mut self, dest: &NodePath, subtree: &dyn DefinitionBackend) -> DomainResult<bool>;

    fn serialize(&self) -> DomainResult<String>;

    fn clone_box(&self) -> Box<dyn DefinitionBackend>;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn DefinitionBackend> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
