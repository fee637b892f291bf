//! Formatting-preserving path-query backend for TOML definitions.
//!
//! Built on `toml_edit`, so an unmodified document serializes back byte for
//! byte and edits keep comments, ordering and value decor. A table (standard
//! or inline) is an element; an array of tables, or a non-empty array of
//! inline tables, is a multiset; any other array is an opaque element.

use std::any::Any;

use indexmap::IndexMap;
use toml_edit::{Array, ArrayOfTables, Datetime, DocumentMut, Item, Table, TableLike, Value};
use tracing::{debug, warn};

use varia_core::application::ports::DefinitionBackend;
use varia_core::domain::{
    DefinitionFormat, DomainError, DomainResult, NodeAddr, NodePath, NodeTree,
};

use super::scalar::{Scalar, ScalarKind};

#[derive(Debug, Clone)]
pub struct TomlDefinition {
    doc: DocumentMut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Single(String),
    Item(String, usize),
    /// Array that is not a list of tables: addressable, but has no children.
    Opaque(String),
}

impl Slot {
    fn key(&self) -> &str {
        match self {
            Self::Single(k) | Self::Item(k, _) | Self::Opaque(k) => k,
        }
    }
}

fn is_table_array(array: &Array) -> bool {
    !array.is_empty() && array.iter().all(Value::is_inline_table)
}

fn slots(table: &dyn TableLike) -> Vec<Slot> {
    let mut out = Vec::new();
    for (key, item) in table.iter() {
        match item {
            Item::Table(_) | Item::Value(Value::InlineTable(_)) => {
                out.push(Slot::Single(key.to_string()))
            }
            Item::ArrayOfTables(aot) => {
                out.extend((0..aot.len()).map(|i| Slot::Item(key.to_string(), i)))
            }
            Item::Value(Value::Array(array)) if is_table_array(array) => {
                out.extend((0..array.len()).map(|i| Slot::Item(key.to_string(), i)))
            }
            Item::Value(Value::Array(_)) => out.push(Slot::Opaque(key.to_string())),
            _ => {}
        }
    }
    out
}

fn slot_table<'a>(table: &'a dyn TableLike, slot: &Slot) -> Option<&'a dyn TableLike> {
    match slot {
        Slot::Single(k) => table.get(k)?.as_table_like(),
        Slot::Item(k, i) => match table.get(k)? {
            Item::ArrayOfTables(aot) => aot.get(*i).map(|t| t as &dyn TableLike),
            Item::Value(Value::Array(array)) => array
                .get(*i)?
                .as_inline_table()
                .map(|t| t as &dyn TableLike),
            _ => None,
        },
        Slot::Opaque(_) => None,
    }
}

fn slot_table_mut<'a>(table: &'a mut dyn TableLike, slot: &Slot) -> Option<&'a mut dyn TableLike> {
    match slot {
        Slot::Single(k) => table.get_mut(k)?.as_table_like_mut(),
        Slot::Item(k, i) => match table.get_mut(k)? {
            Item::ArrayOfTables(aot) => aot.get_mut(*i).map(|t| t as &mut dyn TableLike),
            Item::Value(Value::Array(array)) => array
                .get_mut(*i)?
                .as_inline_table_mut()
                .map(|t| t as &mut dyn TableLike),
            _ => None,
        },
        Slot::Opaque(_) => None,
    }
}

fn descend<'a>(table: &'a dyn TableLike, addr: &[usize]) -> Option<&'a dyn TableLike> {
    match addr.split_first() {
        None => Some(table),
        Some((&i, rest)) => {
            let slot = slots(table).into_iter().nth(i)?;
            descend(slot_table(table, &slot)?, rest)
        }
    }
}

fn descend_mut<'a>(table: &'a mut dyn TableLike, addr: &[usize]) -> Option<&'a mut dyn TableLike> {
    match addr.split_first() {
        None => Some(table),
        Some((&i, rest)) => {
            let slot = slots(&*table).into_iter().nth(i)?;
            descend_mut(slot_table_mut(table, &slot)?, rest)
        }
    }
}

// ── Scalars ─────────────────────────────────────────────────────────────────

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.value().clone()),
        Value::Integer(i) => Some(i.value().to_string()),
        Value::Float(f) => Some(f.display_repr().into_owned()),
        Value::Boolean(b) => Some(b.value().to_string()),
        Value::Datetime(d) => Some(d.display_repr().into_owned()),
        Value::Array(_) | Value::InlineTable(_) => None,
    }
}

fn is_attribute(item: &Item) -> bool {
    item.as_value().and_then(scalar_text).is_some()
}

fn to_value(scalar: Scalar) -> Value {
    match scalar {
        Scalar::Bool(b) => Value::from(b),
        Scalar::Integer(i) => Value::from(i),
        Scalar::Float(f) => Value::from(f),
        Scalar::Text(s) => Value::from(s),
    }
}

/// Replacement for `current` carrying `raw`, keeping its kind when
/// compatible and its surrounding whitespace and comments always.
fn replacement(current: &Value, raw: &str) -> Value {
    let mut value = match current {
        Value::Datetime(_) => raw
            .parse::<Datetime>()
            .map(Value::from)
            .unwrap_or_else(|_| to_value(Scalar::infer(raw))),
        Value::String(_) => to_value(Scalar::coerce(raw, ScalarKind::Text)),
        Value::Integer(_) => to_value(Scalar::coerce(raw, ScalarKind::Integer)),
        Value::Float(_) => to_value(Scalar::coerce(raw, ScalarKind::Float)),
        Value::Boolean(_) => to_value(Scalar::coerce(raw, ScalarKind::Bool)),
        Value::Array(_) | Value::InlineTable(_) => to_value(Scalar::infer(raw)),
    };
    *value.decor_mut() = current.decor().clone();
    value
}

fn element_table(attrs: &IndexMap<String, String>) -> Table {
    let mut table = Table::new();
    for (key, raw) in attrs {
        table.insert(key, Item::Value(to_value(Scalar::infer(raw))));
    }
    table
}

// ── Structure edits ─────────────────────────────────────────────────────────

/// Add `table` under `key`, turning an existing element into a multiset.
fn push_member(parent: &mut dyn TableLike, key: &str, table: Table) -> bool {
    let Some(existing) = parent.get_mut(key) else {
        parent.insert(key, Item::Table(table));
        return true;
    };

    match std::mem::take(existing) {
        Item::Table(first) => {
            let mut aot = ArrayOfTables::new();
            aot.push(first);
            aot.push(table);
            *existing = Item::ArrayOfTables(aot);
            true
        }
        Item::ArrayOfTables(mut aot) => {
            aot.push(table);
            *existing = Item::ArrayOfTables(aot);
            true
        }
        Item::Value(Value::InlineTable(first)) => {
            let mut array = Array::new();
            array.push(first);
            array.push(table.into_inline_table());
            *existing = Item::Value(Value::Array(array));
            true
        }
        Item::Value(Value::Array(mut array)) if is_table_array(&array) => {
            array.push(table.into_inline_table());
            *existing = Item::Value(Value::Array(array));
            true
        }
        other => {
            *existing = other;
            false
        }
    }
}

fn into_table(item: Item) -> Option<Table> {
    match item {
        Item::Table(t) => Some(t),
        Item::Value(Value::InlineTable(t)) => Some(t.into_table()),
        _ => None,
    }
}

/// Remove the first member of a multiset, or the whole entry.
fn remove_child(parent: &mut dyn TableLike, key: &str, all: bool) {
    let emptied = match parent.get_mut(key) {
        Some(Item::ArrayOfTables(aot)) if !all && aot.len() > 1 => {
            aot.remove(0);
            false
        }
        Some(Item::Value(Value::Array(array))) if !all && is_table_array(array) && array.len() > 1 => {
            array.remove(0);
            false
        }
        _ => true,
    };
    if emptied {
        parent.remove(key);
    }
}

impl TomlDefinition {
    pub fn parse(text: &str) -> DomainResult<Self> {
        let doc = text
            .parse::<DocumentMut>()
            .map_err(|e| DomainError::InvalidDefinition(format!("TOML error: {e}")))?;
        Ok(Self { doc })
    }

    fn root(&self) -> &dyn TableLike {
        self.doc.as_table()
    }

    fn table_mut(&mut self, addr: &[usize]) -> Option<&mut dyn TableLike> {
        descend_mut(self.doc.as_table_mut(), addr)
    }

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

    fn reversed_matches(&self, path: &NodePath) -> Vec<NodeAddr> {
        let mut matches = path.select(self);
        matches.reverse();
        matches
    }
}

impl NodeTree for TomlDefinition {
    fn child_tags(&self, addr: &[usize]) -> Vec<String> {
        descend(self.root(), addr)
            .map(|t| slots(t).iter().map(|s| s.key().to_string()).collect())
            .unwrap_or_default()
    }

    fn node_attr(&self, addr: &[usize], name: &str) -> Option<String> {
        descend(self.root(), addr)?
            .get(name)?
            .as_value()
            .and_then(scalar_text)
    }
}

impl DefinitionBackend for TomlDefinition {
    fn format(&self) -> DefinitionFormat {
        DefinitionFormat::Toml
    }

    fn attr_get(&self, path: &NodePath, attr: &str) -> Option<String> {
        path.select(self)
            .iter()
            .find_map(|addr| self.node_attr(addr, attr))
    }

    fn attr_change(&mut self, path: &NodePath, attr: &str, value: &str) -> bool {
        let mut changed = 0;
        for addr in path.select(&*self) {
            let Some(item) = self.table_mut(&addr).and_then(|t| t.get_mut(attr)) else {
                continue;
            };
            let Some(current) = item.as_value().filter(|v| scalar_text(v).is_some()) else {
                continue;
            };
            let next = replacement(current, value);
            *item = Item::Value(next);
            changed += 1;
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
        let Some(table) = self.table_mut(&addr) else {
            warn!(%path, attr, "node cannot hold attributes");
            return Ok(false);
        };
        if table.contains_key(attr) {
            warn!(%path, attr, "attribute already present");
            return Ok(false);
        }
        table.insert(attr, Item::Value(to_value(Scalar::infer(value))));
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
        let Some(table) = self.table_mut(&addr) else {
            warn!(%parent, tag, "parent cannot hold elements");
            return Ok(false);
        };

        if let Some(existing) = table.get(tag) {
            if is_attribute(existing) {
                warn!(%parent, tag, "an attribute of that name exists");
                return Ok(false);
            }
            if !allow_dup {
                debug!(%parent, tag, "element already present");
                return Ok(false);
            }
        }

        let added = push_member(table, tag, element_table(attrs));
        if !added {
            warn!(%parent, tag, "existing value cannot become a multiset");
        }
        Ok(added)
    }

    fn element_remove(&mut self, parent: &NodePath, tag: &str, all: bool) -> bool {
        let mut removed = false;
        for addr in self.reversed_matches(parent) {
            let Some(table) = self.table_mut(&addr) else {
                continue;
            };
            if table.get(tag).is_some_and(|item| !is_attribute(item)) {
                remove_child(table, tag, all);
                removed = true;
            }
        }

        if !removed {
            warn!(%parent, tag, "no child element to remove");
        }
        removed
    }

    fn element_change(&mut self, parent: &NodePath, tag: &str, new_tag: &str) -> bool {
        let mut renamed = false;
        for addr in self.reversed_matches(parent) {
            let Some(table) = self.table_mut(&addr) else {
                continue;
            };
            let is_element = table.get(tag).is_some_and(|item| !is_attribute(item));
            if !is_element || table.contains_key(new_tag) {
                continue;
            }
            if let Some(item) = table.remove(tag) {
                table.insert(new_tag, item);
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
        let Some((&last, parent_addr)) = addr.split_last() else {
            return Some(Box::new(self.clone()));
        };

        let parent = descend(self.root(), parent_addr)?;
        let slot = slots(parent).into_iter().nth(last)?;
        let item = match &slot {
            Slot::Single(k) | Slot::Opaque(k) => parent.get(k)?.clone(),
            Slot::Item(k, i) => match parent.get(k)? {
                Item::ArrayOfTables(aot) => Item::Table(aot.get(*i)?.clone()),
                Item::Value(Value::Array(array)) => Item::Value(array.get(*i)?.clone()),
                _ => return None,
            },
        };

        let mut doc = DocumentMut::new();
        doc.insert(slot.key(), item);
        Some(Box::new(Self { doc }))
    }

    fn rename_root(&mut self, tag: &str) -> bool {
        let table = self.doc.as_table_mut();
        if table.len() != 1 {
            warn!(entries = table.len(), "document has no single top-level element");
            return false;
        }
        let Some(key) = table.iter().next().map(|(k, _)| k.to_string()) else {
            return false;
        };
        match table.remove(&key) {
            Some(item) => {
                table.insert(tag, item);
                true
            }
            None => false,
        }
    }

    fn with_root(&self, tag: &str, attrs: &IndexMap<String, String>) -> Box<dyn DefinitionBackend> {
        let mut doc = DocumentMut::new();
        doc.insert(tag, Item::Table(element_table(attrs)));
        Box::new(Self { doc })
    }

    fn graft(&mut self, dest: &NodePath, subtree: &dyn DefinitionBackend) -> DomainResult<bool> {
        let Some(other) = subtree.as_any().downcast_ref::<Self>() else {
            return Err(DomainError::InvalidWriteSpec(format!(
                "cannot graft a {} subtree into a TOML document",
                subtree.format()
            )));
        };
        let Some(addr) = self.single_match(dest)? else {
            return Ok(false);
        };
        let Some(table) = self.table_mut(&addr) else {
            return Ok(false);
        };

        let mut grafted = false;
        for (key, item) in other.doc.iter() {
            match into_table(item.clone()) {
                Some(member) => grafted |= push_member(table, key, member),
                None => warn!(key, "only tables can be grafted"),
            }
        }
        Ok(grafted)
    }

    fn serialize(&self) -> DomainResult<String> {
        Ok(self.doc.to_string())
    }

    fn clone_box(&self) -> Box<dyn DefinitionBackend> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEMPLATE: &str = r#"# swarm template
[experiment]
length = 100  # seconds
ticks_per_second = 10.0
name = "foraging"
started = 2024-01-01T00:00:00Z

[arena]
size = "10,10,2"
light = { intensity = 3.0 }
tags = ["a", "b"]

[[arena.box]]
id = "wall_north"
movable = false

[[arena.box]]
id = "wall_south"
movable = false
"#;

    fn doc() -> TomlDefinition {
        TomlDefinition::parse(TEMPLATE).unwrap()
    }

    fn p(s: &str) -> NodePath {
        NodePath::parse(s).unwrap()
    }

    fn reparse(d: &TomlDefinition) -> TomlDefinition {
        TomlDefinition::parse(&d.serialize().unwrap()).unwrap()
    }

    #[test]
    fn untouched_document_round_trips_byte_for_byte() {
        assert_eq!(doc().serialize().unwrap(), TEMPLATE);
    }

    #[test]
    fn changes_keep_comments_and_kinds() {
        let mut d = doc();
        assert!(d.attr_change(&p("./experiment"), "length", "200"));
        assert!(d.attr_change(&p("./experiment"), "ticks_per_second", "5"));
        assert!(d.attr_change(&p("./experiment"), "name", "42"));

        let text = d.serialize().unwrap();
        assert!(text.starts_with("# swarm template\n"));
        assert!(text.contains("length = 200  # seconds"));
        assert!(text.contains("ticks_per_second = 5.0"));
        assert!(text.contains("name = \"42\""));
        assert!(text.contains("[[arena.box]]"));
    }

    #[test]
    fn datetimes_stay_datetimes() {
        let mut d = doc();
        assert!(d.attr_change(&p("./experiment"), "started", "2025-06-01T12:00:00Z"));
        assert_eq!(
            d.attr_get(&p("./experiment"), "started").as_deref(),
            Some("2025-06-01T12:00:00Z")
        );
        assert!(d.serialize().unwrap().contains("started = 2025-06-01T12:00:00Z"));
    }

    #[test]
    fn tables_are_elements_and_scalars_attributes() {
        let d = doc();
        assert!(d.has_element(&p("./arena/light")));
        assert!(d.has_element(&p("./arena/tags")));
        assert!(!d.has_attr(&p("./arena"), "light"));
        assert!(d.has_attr(&p("./arena"), "size"));
        assert_eq!(p(".//box").select(&d).len(), 2);
        assert_eq!(d.attr_get(&p(".//light"), "intensity").as_deref(), Some("3.0"));
    }

    #[test]
    fn change_hits_every_match_add_needs_one() {
        let mut d = doc();
        assert!(d.attr_change(&p(".//box"), "movable", "true"));
        assert_eq!(d.attr_get(&p(".//box[2]"), "movable").as_deref(), Some("true"));
        assert!(!d.attr_change(&p("./arena"), "rotation", "0"));

        assert!(matches!(
            d.attr_add(&p(".//box"), "mass", "1"),
            Err(DomainError::AmbiguousMatch { count: 2, .. })
        ));
        assert!(d.attr_add(&p(".//box[@id='wall_north']"), "mass", "1").unwrap());
        assert!(!d.attr_add(&p(".//box[1]"), "mass", "2").unwrap());
    }

    #[test]
    fn element_add_duplicates_become_an_array_of_tables() {
        let mut d = doc();
        let attrs = IndexMap::from([("quantity".to_string(), "4".to_string())]);

        assert!(d.element_add(&p("./arena"), "distribute", &IndexMap::new(), false).unwrap());
        assert!(!d.element_add(&p("./arena"), "distribute", &IndexMap::new(), false).unwrap());
        assert!(d.element_add(&p("./arena/distribute"), "entity", &attrs, false).unwrap());
        assert!(d.element_add(&p("./arena/distribute"), "entity", &attrs, true).unwrap());

        let d = reparse(&d);
        assert_eq!(p(".//distribute/entity").select(&d).len(), 2);
        assert_eq!(
            d.attr_get(&p(".//distribute/entity"), "quantity").as_deref(),
            Some("4")
        );
    }

    #[test]
    fn inline_duplicates_become_an_array_of_inline_tables() {
        let mut d = doc();
        let attrs = IndexMap::from([("intensity".to_string(), "1.5".to_string())]);
        assert!(d.element_add(&p("./arena"), "light", &attrs, true).unwrap());

        let d = reparse(&d);
        assert_eq!(p(".//light").select(&d).len(), 2);
        assert_eq!(d.attr_get(&p(".//light[2]"), "intensity").as_deref(), Some("1.5"));
    }

    #[test]
    fn remove_and_rename() {
        let mut d = doc();
        assert!(d.element_remove(&p("./arena"), "box", false));
        assert_eq!(d.attr_get(&p(".//box"), "id").as_deref(), Some("wall_south"));
        assert!(!d.element_remove(&p("./arena"), "size", false));

        assert!(d.element_change(&p("./arena"), "light", "lamp"));
        assert!(d.has_element(&p("./arena/lamp")));
        assert!(!d.element_change(&p("./arena"), "lamp", "tags"));

        assert!(d.element_remove(&p("./arena"), "box", true));
        assert!(!reparse(&d).has_element(&p(".//box")));
    }

    #[test]
    fn extract_rename_and_graft() {
        let d = doc();
        let first_box = d.extract(&p(".//box")).unwrap();
        assert_eq!(first_box.attr_get(&p("./box"), "id").as_deref(), Some("wall_north"));

        let mut arena = d.extract(&p("./arena")).unwrap();
        assert!(arena.rename_root("field"));
        assert!(arena.has_attr(&p("./field"), "size"));

        let mut fresh = d.with_root("walls", &IndexMap::new());
        assert!(fresh.graft(&p("./walls"), first_box.as_ref()).unwrap());
        assert!(fresh.graft(&p("./walls"), first_box.as_ref()).unwrap());
        let text = fresh.serialize().unwrap();
        let fresh = TomlDefinition::parse(&text).unwrap();
        assert_eq!(p("./walls/box").select(&fresh).len(), 2);

        let whole = d.extract(&NodePath::root()).unwrap();
        assert_eq!(whole.serialize().unwrap(), TEMPLATE);
    }

    #[test]
    fn grafting_across_formats_is_refused() {
        let mut d = doc();
        let yaml = super::super::yaml::YamlDefinition::parse("a: {b: 1}").unwrap();
        assert!(matches!(
            d.graft(&p("./arena"), &yaml),
            Err(DomainError::InvalidWriteSpec(_))
        ));
    }

    #[test]
    fn invalid_toml_is_rejected() {
        assert!(matches!(
            TomlDefinition::parse("[arena\nsize = 1"),
            Err(DomainError::InvalidDefinition(_))
        ));
    }
}
