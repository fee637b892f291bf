//! Path-query backend for YAML definitions.
//!
//! A key mapping to a scalar is an attribute; a key mapping to a mapping or
//! a sequence is an element. A sequence of mappings is a multiset: each item
//! is its own element carrying the key as its tag.

use std::any::Any;

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use varia_core::application::ports::DefinitionBackend;
use varia_core::domain::{
    DefinitionFormat, DomainError, DomainResult, NodeAddr, NodePath, NodeTree,
};

use super::scalar::{Scalar, ScalarKind};

#[derive(Debug, Clone, PartialEq)]
pub struct YamlDefinition {
    root: Value,
}

/// How one element child hangs off its parent mapping.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Single(Value),
    Item(Value, usize),
}

impl Slot {
    fn key(&self) -> &Value {
        match self {
            Self::Single(k) | Self::Item(k, _) => k,
        }
    }
}

fn is_item_list(seq: &[Value]) -> bool {
    !seq.is_empty() && seq.iter().all(Value::is_mapping)
}

fn is_multiset(value: &Value) -> bool {
    matches!(value, Value::Sequence(seq) if is_item_list(seq))
}

fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => scalar_text(other).unwrap_or_default(),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn scalar_kind(value: &Value) -> Option<ScalarKind> {
    match value {
        Value::String(_) => Some(ScalarKind::Text),
        Value::Bool(_) => Some(ScalarKind::Bool),
        Value::Number(n) if n.is_f64() => Some(ScalarKind::Float),
        Value::Number(_) => Some(ScalarKind::Integer),
        _ => None,
    }
}

fn to_value(scalar: Scalar) -> Value {
    match scalar {
        Scalar::Bool(b) => Value::Bool(b),
        Scalar::Integer(i) => Value::Number(i.into()),
        Scalar::Float(f) => Value::Number(f.into()),
        Scalar::Text(s) => Value::String(s),
    }
}

fn is_attribute(value: &Value) -> bool {
    scalar_text(value).is_some()
}

/// Element children of a mapping, in document order.
fn slots(map: &Mapping) -> Vec<Slot> {
    let mut out = Vec::new();
    for (key, value) in map {
        match value {
            Value::Mapping(_) => out.push(Slot::Single(key.clone())),
            Value::Sequence(seq) if is_multiset(value) => {
                out.extend((0..seq.len()).map(|i| Slot::Item(key.clone(), i)))
            }
            Value::Sequence(_) => out.push(Slot::Single(key.clone())),
            _ => {}
        }
    }
    out
}

fn slot_value<'a>(map: &'a Mapping, slot: &Slot) -> Option<&'a Value> {
    match slot {
        Slot::Single(k) => map.get(k),
        Slot::Item(k, i) => map.get(k)?.as_sequence()?.get(*i),
    }
}

fn descend<'a>(value: &'a Value, addr: &[usize]) -> Option<&'a Value> {
    match addr.split_first() {
        None => Some(value),
        Some((&i, rest)) => {
            let map = value.as_mapping()?;
            let slot = slots(map).into_iter().nth(i)?;
            descend(slot_value(map, &slot)?, rest)
        }
    }
}

fn descend_mut<'a>(value: &'a mut Value, addr: &[usize]) -> Option<&'a mut Value> {
    match addr.split_first() {
        None => Some(value),
        Some((&i, rest)) => {
            let map = value.as_mapping_mut()?;
            let slot = slots(map).into_iter().nth(i)?;
            let child = match slot {
                Slot::Single(k) => map.get_mut(&k)?,
                Slot::Item(k, n) => map.get_mut(&k)?.as_sequence_mut()?.get_mut(n)?,
            };
            descend_mut(child, rest)
        }
    }
}

/// Insert `child` under `key`; an existing mapping or multiset under the
/// same key grows into (or by) one more item.
fn push_child(map: &mut Mapping, key: &str, child: Value) -> bool {
    let key = Value::String(key.to_string());
    let Some(existing) = map.get_mut(&key) else {
        map.insert(key, child);
        return true;
    };
    match existing {
        Value::Mapping(_) => {
            let first = std::mem::take(existing);
            *existing = Value::Sequence(vec![first, child]);
            true
        }
        Value::Sequence(seq) if is_item_list(seq) => {
            seq.push(child);
            true
        }
        _ => false,
    }
}

/// Remove `key` keeping the order of the remaining entries.
fn remove_key(map: &mut Mapping, key: &Value) {
    *map = std::mem::take(map)
        .into_iter()
        .filter(|(k, _)| k != key)
        .collect();
}

fn rename_key(map: &mut Mapping, key: &Value, new_key: &str) {
    *map = std::mem::take(map)
        .into_iter()
        .map(|(k, v)| {
            if &k == key {
                (Value::String(new_key.to_string()), v)
            } else {
                (k, v)
            }
        })
        .collect();
}

fn attr_mapping(attrs: &IndexMap<String, String>) -> Value {
    Value::Mapping(
        attrs
            .iter()
            .map(|(k, v)| (Value::String(k.clone()), to_value(Scalar::infer(v))))
            .collect(),
    )
}

impl YamlDefinition {
    pub fn parse(text: &str) -> DomainResult<Self> {
        let root: Value = serde_yaml::from_str(text)
            .map_err(|e| DomainError::InvalidDefinition(format!("YAML error: {e}")))?;
        match root {
            Value::Mapping(_) => Ok(Self { root }),
            Value::Null => Ok(Self {
                root: Value::Mapping(Mapping::new()),
            }),
            _ => Err(DomainError::InvalidDefinition(
                "YAML document must be a mapping at the top level".into(),
            )),
        }
    }

    /// The single target of an edit, or why there is none.
    fn single_match(&self, path: &NodePath) -> DomainResult<Option<NodeAddr>> {
        let mut matches = path.select(self);
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            count => Err(DomainError::AmbiguousMatch {
                path: path.to_string(),
                count,
            }),
        }
    }

    fn mapping_mut(&mut self, addr: &[usize]) -> Option<&mut Mapping> {
        descend_mut(&mut self.root, addr)?.as_mapping_mut()
    }

    fn root_mapping(&self) -> Option<&Mapping> {
        self.root.as_mapping()
    }
}

impl NodeTree for YamlDefinition {
    fn child_tags(&self, addr: &[usize]) -> Vec<String> {
        descend(&self.root, addr)
            .and_then(Value::as_mapping)
            .map(|map| slots(map).iter().map(|s| key_text(s.key())).collect())
            .unwrap_or_default()
    }

    fn node_attr(&self, addr: &[usize], name: &str) -> Option<String> {
        descend(&self.root, addr)?
            .as_mapping()?
            .get(name)
            .and_then(scalar_text)
    }
}

impl DefinitionBackend for YamlDefinition {
    fn format(&self) -> DefinitionFormat {
        DefinitionFormat::Yaml
    }

    fn attr_get(&self, path: &NodePath, attr: &str) -> Option<String> {
        path.select(self)
            .iter()
            .find_map(|addr| self.node_attr(addr, attr))
    }

    fn attr_change(&mut self, path: &NodePath, attr: &str, value: &str) -> bool {
        let mut changed = 0;
        for addr in path.select(&*self) {
            let Some(slot) = self.mapping_mut(&addr).and_then(|m| m.get_mut(attr)) else {
                continue;
            };
            if let Some(kind) = scalar_kind(slot) {
                *slot = to_value(Scalar::coerce(value, kind));
                changed += 1;
            } else if slot.is_null() {
                *slot = to_value(Scalar::infer(value));
                changed += 1;
            }
        }

        if changed == 0 {
            warn!(%path, attr, "attribute not found, change skipped");
        }
        changed > 0
    }

    fn attr_add(&mut self, path: &NodePath, attr: &str, value: &str) -> DomainResult<bool> {
        let Some(addr) = self.single_match(path)? else {
            warn!(%path, attr, "no node to add attribute to");
            return Ok(false);
        };
        let Some(map) = self.mapping_mut(&addr) else {
            warn!(%path, attr, "node cannot hold attributes");
            return Ok(false);
        };
        if map.contains_key(attr) {
            warn!(%path, attr, "attribute already present");
            return Ok(false);
        }
        map.insert(Value::String(attr.to_string()), to_value(Scalar::infer(value)));
        Ok(true)
    }

    fn has_element(&self, path: &NodePath) -> bool {
        !path.select(self).is_empty()
    }

    fn has_attr(&self, path: &NodePath, attr: &str) -> bool {
        path.select(self)
            .iter()
            .any(|addr| self.node_attr(addr, attr).is_some())
    }

    fn element_add(
        &mut self,
        parent: &NodePath,
        tag: &str,
        attrs: &IndexMap<String, String>,
        allow_dup: bool,
    ) -> DomainResult<bool> {
        let Some(addr) = self.single_match(parent)? else {
            warn!(%parent, tag, "parent element not found");
            return Ok(false);
        };
        let Some(map) = self.mapping_mut(&addr) else {
            warn!(%parent, tag, "parent cannot hold elements");
            return Ok(false);
        };

        if let Some(existing) = map.get(tag) {
            if is_attribute(existing) {
                warn!(%parent, tag, "an attribute of that name exists");
                return Ok(false);
            }
            if !allow_dup {
                debug!(%parent, tag, "element already present");
                return Ok(false);
            }
        }

        let added = push_child(map, tag, attr_mapping(attrs));
        if !added {
            warn!(%parent, tag, "existing value cannot become a multiset");
        }
        Ok(added)
    }

    fn element_remove(&mut self, parent: &NodePath, tag: &str, all: bool) -> bool {
        let key = Value::String(tag.to_string());
        let mut removed = false;

        // deepest parents first so earlier addresses stay valid
        for addr in path_matches_reversed(parent, &*self) {
            let Some(map) = self.mapping_mut(&addr) else {
                continue;
            };
            let Some(existing) = map.get_mut(&key) else {
                continue;
            };
            if is_attribute(existing) {
                continue;
            }

            match existing {
                Value::Sequence(seq) if !all && is_item_list(seq) => {
                    seq.remove(0);
                    if seq.is_empty() {
                        remove_key(map, &key);
                    }
                }
                _ => remove_key(map, &key),
            }
            removed = true;
        }

        if !removed {
            warn!(%parent, tag, "no child element to remove");
        }
        removed
    }

    fn element_change(&mut self, parent: &NodePath, tag: &str, new_tag: &str) -> bool {
        let key = Value::String(tag.to_string());
        let mut renamed = false;

        for addr in path_matches_reversed(parent, &*self) {
            let Some(map) = self.mapping_mut(&addr) else {
                continue;
            };
            let is_element = map.get(&key).is_some_and(|v| !is_attribute(v));
            if is_element && !map.contains_key(new_tag) {
                rename_key(map, &key, new_tag);
                renamed = true;
            }
        }

        if !renamed {
            warn!(%parent, tag, new_tag, "cannot rename child element");
        }
        renamed
    }

    fn extract(&self, path: &NodePath) -> Option<Box<dyn DefinitionBackend>> {
        let addr = path.select_first(self)?;
        let Some((&last, parent)) = addr.split_last() else {
            return Some(Box::new(self.clone()));
        };

        let map = descend(&self.root, parent)?.as_mapping()?;
        let slot = slots(map).into_iter().nth(last)?;
        let value = slot_value(map, &slot)?.clone();

        let mut root = Mapping::new();
        root.insert(slot.key().clone(), value);
        Some(Box::new(Self {
            root: Value::Mapping(root),
        }))
    }

    fn rename_root(&mut self, tag: &str) -> bool {
        let Some(map) = self.root.as_mapping_mut() else {
            return false;
        };
        if map.len() != 1 {
            warn!(entries = map.len(), "document has no single top-level element");
            return false;
        }
        let Some(key) = map.iter().next().map(|(k, _)| k.clone()) else {
            return false;
        };
        rename_key(map, &key, tag);
        true
    }

    fn with_root(&self, tag: &str, attrs: &IndexMap<String, String>) -> Box<dyn DefinitionBackend> {
        let mut root = Mapping::new();
        root.insert(Value::String(tag.to_string()), attr_mapping(attrs));
        Box::new(Self {
            root: Value::Mapping(root),
        })
    }

    fn graft(&mut self, dest: &NodePath, subtree: &dyn DefinitionBackend) -> DomainResult<bool> {
        let Some(other) = subtree.as_any().downcast_ref::<Self>() else {
            return Err(DomainError::InvalidWriteSpec(format!(
                "cannot graft a {} subtree into a YAML document",
                subtree.format()
            )));
        };
        let Some(addr) = self.single_match(dest)? else {
            return Ok(false);
        };
        let (Some(map), Some(entries)) = (
            descend_mut(&mut self.root, &addr).and_then(Value::as_mapping_mut),
            other.root_mapping(),
        ) else {
            return Ok(false);
        };

        let mut grafted = false;
        for (key, value) in entries {
            grafted |= push_child(map, &key_text(key), value.clone());
        }
        Ok(grafted)
    }

    fn serialize(&self) -> DomainResult<String> {
        serde_yaml::to_string(&self.root)
            .map_err(|e| DomainError::InvalidDefinition(format!("failed to write YAML: {e}")))
    }

    fn clone_box(&self) -> Box<dyn DefinitionBackend> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn path_matches_reversed<T: NodeTree>(path: &NodePath, tree: &T) -> Vec<NodeAddr> {
    let mut matches = path.select(tree);
    matches.reverse();
    matches
}
