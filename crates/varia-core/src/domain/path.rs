//! Node path query language.
//!
//! A [`NodePath`] selects nodes of a hierarchical document. The grammar is a
//! small, backend-neutral subset of XPath:
//!
//! ```text
//! path      := "." | "."? step+ | relative
//! step      := ("/" | "//") test predicate*
//! test      := tag | "*"
//! predicate := "[@" attr "]" | "[@" attr "=" quoted "]" | "[" n "]"
//! ```
//!
//! Every document has an anonymous document node (`.`); the top-level element
//! of a markup document is its single child, so `.//arena` and `./config`
//! mean the same thing for every backend.
//!
//! Evaluation runs over any [`NodeTree`], addressing nodes by their child
//! index path from the document node. Results are deduplicated and returned
//! in document order.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{DomainError, DomainResult};

/// Address of a node: child indices from the document node. `[]` is the
/// document node itself.
pub type NodeAddr = Vec<usize>;

/// Read-only view of a document that a [`NodePath`] can be evaluated against.
///
/// Only *element* nodes are children. Scalar attributes are reached through
/// [`NodeTree::node_attr`].
pub trait NodeTree {
    /// Tags of the element children of the node at `addr`, in document order.
    /// An address that does not resolve has no children.
    fn child_tags(&self, addr: &[usize]) -> Vec<String>;

    /// Scalar attribute `name` of the node at `addr`.
    fn node_attr(&self, addr: &[usize], name: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameTest {
    Any,
    Tag(String),
}

impl NameTest {
    fn matches(&self, tag: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Tag(t) => t == tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    HasAttr(String),
    AttrEquals(String, String),
    /// 1-based position among the nodes matched so far under one parent.
    Position(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    pub axis: Axis,
    pub test: NameTest,
    pub predicates: Vec<Predicate>,
}

/// Parsed node path. Equality and hashing use the canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath {
    steps: Vec<Step>,
}

impl NodePath {
    /// The document node (`.`).
    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn parse(input: &str) -> DomainResult<Self> {
        Parser::new(input).parse()
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Tag tested by the final step, if it names one.
    pub fn last_tag(&self) -> Option<&str> {
        match self.steps.last().map(|s| &s.test) {
            Some(NameTest::Tag(t)) => Some(t),
            _ => None,
        }
    }

    /// A new path selecting the `tag` children of this path's matches.
    pub fn child(&self, tag: &str) -> Self {
        let mut steps = self.steps.clone();
        steps.push(Step {
            axis: Axis::Child,
            test: NameTest::Tag(tag.to_string()),
            predicates: Vec::new(),
        });
        Self { steps }
    }

    /// Evaluate against `tree`, returning matches in document order.
    pub fn select<T: NodeTree + ?Sized>(&self, tree: &T) -> Vec<NodeAddr> {
        let mut current: BTreeSet<NodeAddr> = BTreeSet::from([Vec::new()]);

        for step in &self.steps {
            let mut next = BTreeSet::new();
            for context in &current {
                match step.axis {
                    Axis::Child => next.extend(step.matching_children(tree, context)),
                    Axis::Descendant => {
                        let mut scope = Vec::new();
                        descendants_or_self(tree, context, &mut scope);
                        for node in &scope {
                            next.extend(step.matching_children(tree, node));
                        }
                    }
                }
            }
            if next.is_empty() {
                return Vec::new();
            }
            current = next;
        }

        current.into_iter().collect()
    }

    /// First match in document order.
    pub fn select_first<T: NodeTree + ?Sized>(&self, tree: &T) -> Option<NodeAddr> {
        self.select(tree).into_iter().next()
    }
}

impl Step {
    fn matching_children<T: NodeTree + ?Sized>(&self, tree: &T, parent: &[usize]) -> Vec<NodeAddr> {
        let mut found: Vec<NodeAddr> = tree
            .child_tags(parent)
            .iter()
            .enumerate()
            .filter(|(_, tag)| self.test.matches(tag))
            .map(|(i, _)| {
                let mut addr = parent.to_vec();
                addr.push(i);
                addr
            })
            .collect();

        for predicate in &self.predicates {
            found = match predicate {
                Predicate::Position(n) => found.into_iter().nth(n - 1).into_iter().collect(),
                Predicate::HasAttr(name) => found
                    .into_iter()
                    .filter(|a| tree.node_attr(a, name).is_some())
                    .collect(),
                Predicate::AttrEquals(name, value) => found
                    .into_iter()
                    .filter(|a| tree.node_attr(a, name).as_deref() == Some(value.as_str()))
                    .collect(),
            };
        }
        found
    }
}

fn descendants_or_self<T: NodeTree + ?Sized>(tree: &T, addr: &[usize], out: &mut Vec<NodeAddr>) {
    out.push(addr.to_vec());
    for i in 0..tree.child_tags(addr).len() {
        let mut child = addr.to_vec();
        child.push(i);
        descendants_or_self(tree, &child, out);
    }
}

// ── Parsing ─────────────────────────────────────────────────────────────────

struct Parser<'a> {
    source: &'a str,
    rest: &'a str,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            rest: source.trim(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> DomainError {
        DomainError::InvalidPath {
            path: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn parse(mut self) -> DomainResult<NodePath> {
        if self.rest.is_empty() {
            return Err(self.error("path is empty"));
        }

        let mut steps = Vec::new();
        let mut implicit_child = false;
        if let Some(after_dot) = self.rest.strip_prefix('.') {
            if after_dot.is_empty() {
                return Ok(NodePath::root());
            }
            if !after_dot.starts_with('/') {
                return Err(self.error("expected '/' after '.'"));
            }
            self.rest = after_dot;
        } else if !self.rest.starts_with('/') {
            implicit_child = true;
        }

        while !self.rest.is_empty() || implicit_child {
            let axis = if implicit_child {
                implicit_child = false;
                Axis::Child
            } else if let Some(r) = self.rest.strip_prefix("//") {
                self.rest = r;
                Axis::Descendant
            } else if let Some(r) = self.rest.strip_prefix('/') {
                self.rest = r;
                Axis::Child
            } else {
                return Err(self.error(format!("unexpected '{}'", self.rest)));
            };
            steps.push(self.step(axis)?);
        }

        Ok(NodePath { steps })
    }

    fn step(&mut self, axis: Axis) -> DomainResult<Step> {
        let rest = self.rest;
        let end = rest.find(['/', '[']).unwrap_or(rest.len());
        let name = &rest[..end];
        if name.is_empty() {
            return Err(self.error("empty step"));
        }
        if name.contains(|c: char| c.is_whitespace() || matches!(c, ']' | '@' | '\'' | '"')) {
            return Err(self.error(format!("invalid tag '{}'", name)));
        }
        let test = if name == "*" {
            NameTest::Any
        } else {
            NameTest::Tag(name.to_string())
        };
        self.rest = &rest[end..];

        let mut predicates = Vec::new();
        while self.rest.starts_with('[') {
            let rest = self.rest;
            let close = self.closing_bracket()?;
            predicates.push(self.predicate(rest[1..close].trim())?);
            self.rest = &rest[close + 1..];
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    /// Index of the `]` closing the predicate at the start of `rest`,
    /// skipping over quoted values.
    fn closing_bracket(&self) -> DomainResult<usize> {
        let mut quote: Option<char> = None;
        for (i, c) in self.rest.char_indices().skip(1) {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '\'' | '"') => quote = Some(c),
                (None, ']') => return Ok(i),
                (None, _) => {}
            }
        }
        Err(self.error("unterminated predicate"))
    }

    fn predicate(&self, inner: &str) -> DomainResult<Predicate> {
        if let Some(attr_expr) = inner.strip_prefix('@') {
            let Some((name, value)) = attr_expr.split_once('=') else {
                return Ok(Predicate::HasAttr(self.attr_name(attr_expr)?));
            };
            let name = self.attr_name(name)?;
            let value = value.trim();
            let unquoted = ['\'', '"']
                .iter()
                .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
                .ok_or_else(|| self.error(format!("value for @{} must be quoted", name)))?;
            return Ok(Predicate::AttrEquals(name, unquoted.to_string()));
        }

        match inner.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(Predicate::Position(n)),
            Ok(_) => Err(self.error("positions start at 1")),
            Err(_) => Err(self.error(format!("unsupported predicate '[{}]'", inner))),
        }
    }

    fn attr_name(&self, raw: &str) -> DomainResult<String> {
        let name = raw.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(self.error(format!("invalid attribute name '{}'", name)));
        }
        Ok(name.to_string())
    }
}

// ── Conversions ─────────────────────────────────────────────────────────────

impl FromStr for NodePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodePath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".")?;
        for step in &self.steps {
            match step.axis {
                Axis::Child => write!(f, "/")?,
                Axis::Descendant => write!(f, "//")?,
            }
            match &step.test {
                NameTest::Any => write!(f, "*")?,
                NameTest::Tag(t) => write!(f, "{}", t)?,
            }
            for predicate in &step.predicates {
                match predicate {
                    Predicate::HasAttr(a) => write!(f, "[@{}]", a)?,
                    Predicate::AttrEquals(a, v) if v.contains('\'') => {
                        write!(f, "[@{}=\"{}\"]", a, v)?
                    }
                    Predicate::AttrEquals(a, v) => write!(f, "[@{}='{}']", a, v)?,
                    Predicate::Position(n) => write!(f, "[{}]", n)?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal element tree for exercising the evaluator.
    struct Toy {
        tag: &'static str,
        attrs: Vec<(&'static str, &'static str)>,
        children: Vec<Toy>,
    }

    fn el(tag: &'static str, attrs: &[(&'static str, &'static str)], children: Vec<Toy>) -> Toy {
        Toy {
            tag,
            attrs: attrs.to_vec(),
            children,
        }
    }

    /// Document node wrapping a single top-level element.
    struct Doc(Toy);

    impl Doc {
        fn node(&self, addr: &[usize]) -> Option<&Toy> {
            let (first, rest) = addr.split_first()?;
            if *first != 0 {
                return None;
            }
            rest.iter()
                .try_fold(&self.0, |node, &i| node.children.get(i))
        }
    }

    impl NodeTree for Doc {
        fn child_tags(&self, addr: &[usize]) -> Vec<String> {
            if addr.is_empty() {
                return vec![self.0.tag.to_string()];
            }
            self.node(addr)
                .map(|n| n.children.iter().map(|c| c.tag.to_string()).collect())
                .unwrap_or_default()
        }

        fn node_attr(&self, addr: &[usize], name: &str) -> Option<String> {
            self.node(addr)?
                .attrs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    fn sample() -> Doc {
        Doc(el(
            "config",
            &[],
            vec![
                el("framework", &[("length", "100")], vec![]),
                el(
                    "arena",
                    &[("size", "10,10,2")],
                    vec![
                        el("box", &[("id", "a")], vec![]),
                        el("box", &[("id", "b")], vec![]),
                        el(
                            "distribute",
                            &[],
                            vec![el("entity", &[("quantity", "4")], vec![])],
                        ),
                    ],
                ),
            ],
        ))
    }

    #[test]
    fn dot_selects_document_node() {
        let path = NodePath::parse(".").unwrap();
        assert!(path.is_root());
        assert_eq!(path.select(&sample()), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn child_steps_walk_from_document_node() {
        let path = NodePath::parse("./config/arena").unwrap();
        assert_eq!(path.select(&sample()), vec![vec![0, 1]]);
    }

    #[test]
    fn relative_path_is_child_of_document_node() {
        let relative = NodePath::parse("config/framework").unwrap();
        let explicit = NodePath::parse("./config/framework").unwrap();
        assert_eq!(relative, explicit);
        assert_eq!(relative.to_string(), "./config/framework");
    }

    #[test]
    fn descendant_axis_finds_nested_nodes() {
        let path = NodePath::parse(".//arena/distribute/entity").unwrap();
        assert_eq!(path.select(&sample()), vec![vec![0, 1, 2, 0]]);
    }

    #[test]
    fn multiple_matches_come_back_in_document_order() {
        let path = NodePath::parse(".//box").unwrap();
        assert_eq!(path.select(&sample()), vec![vec![0, 1, 0], vec![0, 1, 1]]);
    }

    #[test]
    fn attribute_predicates_filter_matches() {
        let tree = sample();
        let by_value = NodePath::parse(".//box[@id='b']").unwrap();
        assert_eq!(by_value.select(&tree), vec![vec![0, 1, 1]]);

        let by_presence = NodePath::parse(".//*[@size]").unwrap();
        assert_eq!(by_presence.select(&tree), vec![vec![0, 1]]);
    }

    #[test]
    fn position_predicate_is_one_based() {
        let path = NodePath::parse(".//arena/box[2]").unwrap();
        assert_eq!(path.select(&sample()), vec![vec![0, 1, 1]]);
        assert!(NodePath::parse(".//box[0]").is_err());
    }

    #[test]
    fn wildcard_matches_any_tag() {
        let path = NodePath::parse("./config/*").unwrap();
        assert_eq!(path.select(&sample()).len(), 2);
    }

    #[test]
    fn missing_nodes_select_nothing() {
        let path = NodePath::parse(".//nowhere/entity").unwrap();
        assert!(path.select(&sample()).is_empty());
        assert!(path.select_first(&sample()).is_none());
    }

    #[test]
    fn canonical_form_round_trips() {
        for text in [
            ".",
            ".//arena/distribute/entity",
            "./config/arena/box[@id='a'][1]",
            ".//*[@size]",
            ".//box[@label=\"it's\"]",
        ] {
            let path = NodePath::parse(text).unwrap();
            assert_eq!(path.to_string(), text);
            assert_eq!(NodePath::parse(&path.to_string()).unwrap(), path);
        }
    }

    #[test]
    fn quoted_values_may_contain_brackets() {
        let path = NodePath::parse(".//box[@id='a]b']").unwrap();
        assert_eq!(
            path.steps()[0].predicates,
            vec![Predicate::AttrEquals("id".into(), "a]b".into())]
        );
    }

    #[test]
    fn malformed_paths_are_rejected() {
        for bad in ["", "./", ".x", "a//", ".//box[@id=a]", ".//box[", ".//a b"] {
            assert!(
                matches!(NodePath::parse(bad), Err(DomainError::InvalidPath { .. })),
                "'{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn child_appends_a_step() {
        let arena = NodePath::parse(".//arena").unwrap();
        assert_eq!(arena.child("distribute").to_string(), ".//arena/distribute");
        assert_eq!(arena.last_tag(), Some("arena"));
    }

    #[test]
    fn serializes_as_canonical_string() {
        let path = NodePath::parse("arena/x").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"./arena/x\"");
        let back: NodePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
