//! Change value types: what can be done to an experiment definition.
//!
//! These are plain values. They are produced by batch criteria, applied by
//! [`ExperimentDefinition`](crate::application::ExperimentDefinition),
//! recorded in its audit trail and persisted in change logs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::error::{DomainError, DomainResult};
use super::path::NodePath;

// ── Attribute changes ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeChange {
    pub path: NodePath,
    pub attr: String,
    pub value: String,
}

impl AttributeChange {
    pub fn new(path: NodePath, attr: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path,
            attr: attr.into(),
            value: value.into(),
        }
    }

    fn key(&self) -> (NodePath, String) {
        (self.path.clone(), self.attr.clone())
    }
}

/// Deduplicated set of attribute changes keyed by (path, attribute).
///
/// Iteration follows first-insertion order so generated documents and logs
/// are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeChangeSet {
    changes: IndexMap<(NodePath, String), AttributeChange>,
}

impl AttributeChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a change; a later change to the same (path, attribute) wins.
    pub fn insert(&mut self, change: AttributeChange) -> Option<AttributeChange> {
        self.changes.insert(change.key(), change)
    }

    pub fn get(&self, path: &NodePath, attr: &str) -> Option<&AttributeChange> {
        self.changes.get(&(path.clone(), attr.to_string()))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeChange> {
        self.changes.values()
    }

    /// Layer `other` on top of `self`; overlapping keys take `other`'s value.
    pub fn union(mut self, other: &AttributeChangeSet) -> Self {
        for change in other.iter() {
            self.insert(change.clone());
        }
        self
    }

    /// Combine two sets that must not touch the same (path, attribute).
    pub fn merge_disjoint(&self, other: &AttributeChangeSet) -> DomainResult<Self> {
        let mut merged = self.clone();
        for change in other.iter() {
            if merged.insert(change.clone()).is_some() {
                return Err(DomainError::ConflictingWrites {
                    path: change.path.to_string(),
                    attr: change.attr.clone(),
                });
            }
        }
        Ok(merged)
    }
}

impl FromIterator<AttributeChange> for AttributeChangeSet {
    fn from_iter<I: IntoIterator<Item = AttributeChange>>(iter: I) -> Self {
        let mut set = Self::new();
        for change in iter {
            set.insert(change);
        }
        set
    }
}

impl<'a> IntoIterator for &'a AttributeChangeSet {
    type Item = &'a AttributeChange;
    type IntoIter = indexmap::map::Values<'a, (NodePath, String), AttributeChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.values()
    }
}

// ── Element changes ─────────────────────────────────────────────────────────

/// Add element `tag` (with `attrs`) under the single node `parent` selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementAdd {
    pub parent: NodePath,
    pub tag: String,
    #[serde(default)]
    pub attrs: IndexMap<String, String>,
    #[serde(default)]
    pub allow_dup: bool,
}

impl ElementAdd {
    pub fn new(parent: NodePath, tag: impl Into<String>) -> Self {
        Self {
            parent,
            tag: tag.into(),
            attrs: IndexMap::new(),
            allow_dup: false,
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn allow_dup(mut self, allow: bool) -> Self {
        self.allow_dup = allow;
        self
    }
}

/// Ordered list of element additions; applied front to back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementAddList(Vec<ElementAdd>);

impl ElementAddList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, add: ElementAdd) {
        self.0.push(add);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ElementAdd> {
        self.0.iter()
    }

    /// `self`'s additions followed by `other`'s.
    pub fn concat(&self, other: &ElementAddList) -> Self {
        Self(self.0.iter().chain(other.0.iter()).cloned().collect())
    }
}

impl FromIterator<ElementAdd> for ElementAddList {
    fn from_iter<I: IntoIterator<Item = ElementAdd>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ElementAddList {
    type Item = &'a ElementAdd;
    type IntoIter = std::slice::Iter<'a, ElementAdd>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Remove child `tag` of the nodes `parent` selects; the first such child
/// of each parent, or every one when `all` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRemove {
    pub parent: NodePath,
    pub tag: String,
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRename {
    pub parent: NodePath,
    pub tag: String,
    pub new_tag: String,
}

// ── Audit trail ─────────────────────────────────────────────────────────────

/// One successful edit of an experiment definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    AttrChange(AttributeChange),
    ElementAdd(ElementAdd),
    ElementRemove(ElementRemove),
    ElementRename(ElementRename),
}

impl From<AttributeChange> for Mutation {
    fn from(change: AttributeChange) -> Self {
        Self::AttrChange(change)
    }
}

impl From<ElementAdd> for Mutation {
    fn from(add: ElementAdd) -> Self {
        Self::ElementAdd(add)
    }
}

impl From<ElementRemove> for Mutation {
    fn from(remove: ElementRemove) -> Self {
        Self::ElementRemove(remove)
    }
}

impl From<ElementRename> for Mutation {
    fn from(rename: ElementRename) -> Self {
        Self::ElementRename(rename)
    }
}

/// Every successful mutation made to one experiment definition, in the
/// order it was made. Replaying it against the template reproduces the
/// experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditTrail {
    mutations: Vec<Mutation>,
}

impl AuditTrail {
    pub fn record(&mut self, mutation: impl Into<Mutation>) {
        self.mutations.push(mutation.into());
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Attribute changes and additions, one per (path, attribute), latest
    /// value kept.
    pub fn attr_changes(&self) -> AttributeChangeSet {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::AttrChange(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn element_adds(&self) -> impl Iterator<Item = &ElementAdd> {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::ElementAdd(a) => Some(a),
            _ => None,
        })
    }

    pub fn element_removes(&self) -> impl Iterator<Item = &ElementRemove> {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::ElementRemove(r) => Some(r),
            _ => None,
        })
    }

    pub fn element_renames(&self) -> impl Iterator<Item = &ElementRename> {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::ElementRename(r) => Some(r),
            _ => None,
        })
    }

    /// (element additions, attribute changes or additions) recorded so far.
    pub fn counts(&self) -> (usize, usize) {
        (self.element_adds().count(), self.attr_changes().len())
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

impl FromIterator<Mutation> for AuditTrail {
    fn from_iter<I: IntoIterator<Item = Mutation>>(iter: I) -> Self {
        Self {
            mutations: iter.into_iter().collect(),
        }
    }
}
