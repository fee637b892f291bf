//! Change-tracking experiment definition.
//!
//! [`ExperimentDefinition`] owns one backend document and records every
//! mutation that succeeds, so the exact difference between a template and
//! a generated experiment can be persisted next to it.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::application::ports::DefinitionBackend;
use crate::domain::{
    AttributeChange, AuditTrail, DefinitionFormat, DomainResult, ElementAdd, ElementRemove,
    ElementRename, ExperimentDef, NodePath,
};

#[derive(Debug, Clone)]
pub struct ExperimentDefinition {
    backend: Box<dyn DefinitionBackend>,
    trail: AuditTrail,
}

/// Outcome of applying one [`ExperimentDef`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub elements_added: usize,
    /// Additions skipped because the element was already there.
    pub elements_present: usize,
    pub changes_applied: usize,
    pub unapplied: Vec<AttributeChange>,
}

impl ExperimentDefinition {
    pub fn new(backend: Box<dyn DefinitionBackend>) -> Self {
        Self {
            backend,
            trail: AuditTrail::default(),
        }
    }

    /// Private deep copy with an empty audit trail.
    pub fn fork(&self) -> Self {
        Self::new(self.backend.clone_box())
    }

    pub fn format(&self) -> DefinitionFormat {
        self.backend.format()
    }

    pub fn backend(&self) -> &dyn DefinitionBackend {
        self.backend.as_ref()
    }

    pub fn trail(&self) -> &AuditTrail {
        &self.trail
    }

    /// (element additions, attribute changes) made so far.
    pub fn counts(&self) -> (usize, usize) {
        self.trail.counts()
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn attr_get(&self, path: &NodePath, attr: &str) -> Option<String> {
        self.backend.attr_get(path, attr)
    }

    pub fn has_element(&self, path: &NodePath) -> bool {
        self.backend.has_element(path)
    }

    pub fn has_attr(&self, path: &NodePath, attr: &str) -> bool {
        self.backend.has_attr(path, attr)
    }

    // ── Mutations ───────────────────────────────────────────────────────────

    pub fn attr_change(&mut self, path: &NodePath, attr: &str, value: &str) -> bool {
        let changed = self.backend.attr_change(path, attr, value);
        if changed {
            debug!(%path, attr, value, "attribute changed");
            self.trail.record(AttributeChange::new(path.clone(), attr, value));
        }
        changed
    }

    pub fn attr_add(&mut self, path: &NodePath, attr: &str, value: &str) -> DomainResult<bool> {
        let added = self.backend.attr_add(path, attr, value)?;
        if added {
            debug!(%path, attr, value, "attribute added");
            self.trail.record(AttributeChange::new(path.clone(), attr, value));
        }
        Ok(added)
    }

    pub fn element_add(&mut self, add: &ElementAdd) -> DomainResult<bool> {
        let added = self
            .backend
            .element_add(&add.parent, &add.tag, &add.attrs, add.allow_dup)?;
        if added {
            debug!(parent = %add.parent, tag = %add.tag, "element added");
            self.trail.record(add.clone());
        }
        Ok(added)
    }

    pub fn element_remove(&mut self, parent: &NodePath, tag: &str) -> bool {
        self.remove(parent, tag, false)
    }

    pub fn element_remove_all(&mut self, parent: &NodePath, tag: &str) -> bool {
        self.remove(parent, tag, true)
    }

    fn remove(&mut self, parent: &NodePath, tag: &str, all: bool) -> bool {
        let removed = self.backend.element_remove(parent, tag, all);
        if removed {
            debug!(%parent, tag, all, "element removed");
            self.trail.record(ElementRemove {
                parent: parent.clone(),
                tag: tag.to_string(),
                all,
            });
        }
        removed
    }

    pub fn element_change(&mut self, parent: &NodePath, tag: &str, new_tag: &str) -> bool {
        let renamed = self.backend.element_change(parent, tag, new_tag);
        if renamed {
            debug!(%parent, tag, new_tag, "element renamed");
            self.trail.record(ElementRename {
                parent: parent.clone(),
                tag: tag.to_string(),
                new_tag: new_tag.to_string(),
            });
        }
        renamed
    }

    /// Apply a generated experiment: element additions in order, then
    /// attribute changes. Soft failures are collected, not raised.
    pub fn apply(&mut self, def: &ExperimentDef) -> DomainResult<ApplyReport> {
        let mut report = ApplyReport::default();

        for add in &def.element_adds {
            if self.element_add(add)? {
                report.elements_added += 1;
            } else {
                report.elements_present += 1;
            }
        }

        for change in &def.attr_changes {
            if self.attr_change(&change.path, &change.attr, &change.value) {
                report.changes_applied += 1;
            } else {
                report.unapplied.push(change.clone());
            }
        }

        if !report.unapplied.is_empty() {
            warn!(
                experiment = %def.name,
                unapplied = report.unapplied.len(),
                "some attribute changes did not apply to the template"
            );
        }
        Ok(report)
    }

    /// New document of the same format rooted at `tag`.
    pub fn with_root(&self, tag: &str, attrs: &IndexMap<String, String>) -> Self {
        Self::new(self.backend.with_root(tag, attrs))
    }

    pub fn serialize(&self) -> DomainResult<String> {
        self.backend.serialize()
    }
}
