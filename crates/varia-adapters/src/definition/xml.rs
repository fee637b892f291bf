//! Markup backend (`.xml`, `.argos`, `.launch`).
//!
//! Attributes are plain strings and every path resolves to its first match.
//! The document node holds exactly one top-level element.

use std::any::Any;
use std::io;

use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::{debug, warn};

use varia_core::application::ports::DefinitionBackend;
use varia_core::domain::{DefinitionFormat, DomainError, DomainResult, NodePath, NodeTree};

#[derive(Debug, Clone, PartialEq)]
struct Element {
    tag: String,
    attrs: IndexMap<String, String>,
    children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq)]
enum XmlNode {
    Element(Element),
    Text(String),
    Comment(String),
    /// Kept verbatim and written back in place.
    DocType(String),
    Instruction(String),
}

impl Element {
    fn new(tag: &str, attrs: &IndexMap<String, String>) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: attrs.clone(),
            children: Vec::new(),
        }
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    fn has_child(&self, tag: &str) -> bool {
        self.elements().any(|e| e.tag == tag)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDefinition {
    declaration: bool,
    /// Misc nodes ahead of the top-level element.
    prolog: Vec<XmlNode>,
    root: Element,
    /// Misc nodes after it.
    epilog: Vec<XmlNode>,
}

impl XmlDefinition {
    pub fn parse(text: &str) -> DomainResult<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut declaration = false;
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                DomainError::InvalidDefinition(format!(
                    "XML error at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            })?;

            match event {
                Event::Decl(_) => declaration = true,
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| invalid("unbalanced closing tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| invalid(e.to_string()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Text(text.into_owned())),
                        None => debug!(text = %text, "text outside the top-level element dropped"),
                    }
                }
                Event::CData(c) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(XmlNode::Text(String::from_utf8_lossy(&c).into_owned()));
                    }
                }
                Event::Comment(c) => {
                    let node = XmlNode::Comment(String::from_utf8_lossy(&c).into_owned());
                    place(&mut stack, &root, &mut prolog, &mut epilog, node);
                }
                Event::DocType(d) => {
                    let node = XmlNode::DocType(String::from_utf8_lossy(&d).into_owned());
                    place(&mut stack, &root, &mut prolog, &mut epilog, node);
                }
                Event::PI(pi) => {
                    let node = XmlNode::Instruction(String::from_utf8_lossy(&pi).into_owned());
                    place(&mut stack, &root, &mut prolog, &mut epilog, node);
                }
                Event::Eof => break,
            }
        }

        if !stack.is_empty() {
            return Err(invalid("unclosed element"));
        }
        let root = root.ok_or_else(|| invalid("document has no top-level element"))?;

        Ok(Self {
            declaration,
            prolog,
            root,
            epilog,
        })
    }

    fn element(&self, addr: &[usize]) -> Option<&Element> {
        let (&first, rest) = addr.split_first()?;
        if first != 0 {
            return None;
        }
        rest.iter()
            .try_fold(&self.root, |node, &i| node.elements().nth(i))
    }

    fn element_mut(&mut self, addr: &[usize]) -> Option<&mut Element> {
        let (&first, rest) = addr.split_first()?;
        if first != 0 {
            return None;
        }
        descend_mut(&mut self.root, rest)
    }

    /// First element `path` selects, excluding the document node.
    fn first_element_mut(&mut self, path: &NodePath) -> Option<&mut Element> {
        let addr = path.select_first(&*self)?;
        self.element_mut(&addr)
    }
}

fn descend_mut<'a>(element: &'a mut Element, addr: &[usize]) -> Option<&'a mut Element> {
    match addr.split_first() {
        None => Some(element),
        Some((&i, rest)) => descend_mut(element.elements_mut().nth(i)?, rest),
    }
}

fn invalid(reason: impl Into<String>) -> DomainError {
    DomainError::InvalidDefinition(reason.into())
}

fn element_from(start: &BytesStart<'_>) -> DomainResult<Element> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = IndexMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| invalid(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| invalid(e.to_string()))?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(Element {
        tag,
        attrs,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> DomainResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(invalid("more than one top-level element")),
    }
    Ok(())
}

/// Non-element node goes to the open element, or around the top-level one.
fn place(
    stack: &mut [Element],
    root: &Option<Element>,
    prolog: &mut Vec<XmlNode>,
    epilog: &mut Vec<XmlNode>,
    node: XmlNode,
) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => prolog.push(node),
        None => epilog.push(node),
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> io::Result<()> {
    match node {
        XmlNode::Element(e) => write_element(writer, e),
        XmlNode::Text(t) => writer.write_event(Event::Text(BytesText::new(t))),
        XmlNode::Comment(c) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(c.as_str())))
        }
        XmlNode::DocType(d) => {
            writer.write_event(Event::DocType(BytesText::from_escaped(d.as_str())))
        }
        XmlNode::Instruction(pi) => writer.write_event(Event::PI(BytesPI::new(pi.as_str()))),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> io::Result<()> {
    let mut start = BytesStart::new(element.tag.as_str());
    for (key, value) in &element.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start));
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.tag.as_str())))
}

impl NodeTree for XmlDefinition {
    fn child_tags(&self, addr: &[usize]) -> Vec<String> {
        if addr.is_empty() {
            return vec![self.root.tag.clone()];
        }
        self.element(addr)
            .map(|e| e.elements().map(|c| c.tag.clone()).collect())
            .unwrap_or_default()
    }

    fn node_attr(&self, addr: &[usize], name: &str) -> Option<String> {
        self.element(addr)?.attrs.get(name).cloned()
    }
}

impl DefinitionBackend for XmlDefinition {
    fn format(&self) -> DefinitionFormat {
        DefinitionFormat::Xml
    }

    fn attr_get(&self, path: &NodePath, attr: &str) -> Option<String> {
        let addr = path.select_first(self)?;
        self.node_attr(&addr, attr)
    }

    fn attr_change(&mut self, path: &NodePath, attr: &str, value: &str) -> bool {
        match self
            .first_element_mut(path)
            .and_then(|e| e.attrs.get_mut(attr))
        {
            Some(slot) => {
                *slot = value.to_string();
                true
            }
            None => {
                warn!(%path, attr, "attribute not found, change skipped");
                false
            }
        }
    }

    fn attr_add(&mut self, path: &NodePath, attr: &str, value: &str) -> DomainResult<bool> {
        let Some(element) = self.first_element_mut(path) else {
            warn!(%path, attr, "no element to add attribute to");
            return Ok(false);
        };
        if element.attrs.contains_key(attr) {
            warn!(%path, attr, "attribute already present");
            return Ok(false);
        }
        element.attrs.insert(attr.to_string(), value.to_string());
        Ok(true)
    }

    fn has_element(&self, path: &NodePath) -> bool {
        path.select_first(self).is_some()
    }

    fn has_attr(&self, path: &NodePath, attr: &str) -> bool {
        self.attr_get(path, attr).is_some()
    }

    fn element_add(
        &mut self,
        parent: &NodePath,
        tag: &str,
        attrs: &IndexMap<String, String>,
        allow_dup: bool,
    ) -> DomainResult<bool> {
        let Some(element) = self.first_element_mut(parent) else {
            warn!(%parent, tag, "parent element not found");
            return Ok(false);
        };
        if !allow_dup && element.has_child(tag) {
            debug!(%parent, tag, "element already present");
            return Ok(false);
        }
        element
            .children
            .push(XmlNode::Element(Element::new(tag, attrs)));
        Ok(true)
    }

    fn element_remove(&mut self, parent: &NodePath, tag: &str, all: bool) -> bool {
        let Some(element) = self.first_element_mut(parent) else {
            warn!(%parent, tag, "parent element not found");
            return false;
        };

        let before = element.children.len();
        let mut removed_one = false;
        element.children.retain(|c| match c {
            XmlNode::Element(e) if e.tag == tag && (all || !removed_one) => {
                removed_one = true;
                false
            }
            _ => true,
        });

        let removed = element.children.len() < before;
        if !removed {
            warn!(%parent, tag, "no child element to remove");
        }
        removed
    }

    fn element_change(&mut self, parent: &NodePath, tag: &str, new_tag: &str) -> bool {
        let Some(element) = self.first_element_mut(parent) else {
            warn!(%parent, tag, "parent element not found");
            return false;
        };
        if !element.has_child(tag) || element.has_child(new_tag) {
            warn!(%parent, tag, new_tag, "cannot rename child element");
            return false;
        }
        for child in element.elements_mut().filter(|e| e.tag == tag) {
            child.tag = new_tag.to_string();
        }
        true
    }

    fn extract(&self, path: &NodePath) -> Option<Box<dyn DefinitionBackend>> {
        let addr = path.select_first(self)?;
        if addr.is_empty() {
            return Some(Box::new(self.clone()));
        }
        let element = self.element(&addr)?.clone();
        Some(Box::new(Self {
            declaration: self.declaration,
            prolog: Vec::new(),
            root: element,
            epilog: Vec::new(),
        }))
    }

    fn rename_root(&mut self, tag: &str) -> bool {
        self.root.tag = tag.to_string();
        true
    }

    fn with_root(&self, tag: &str, attrs: &IndexMap<String, String>) -> Box<dyn DefinitionBackend> {
        Box::new(Self {
            declaration: self.declaration,
            prolog: Vec::new(),
            root: Element::new(tag, attrs),
            epilog: Vec::new(),
        })
    }

    fn graft(&mut self, dest: &NodePath, subtree: &dyn DefinitionBackend) -> DomainResult<bool> {
        let Some(other) = subtree.as_any().downcast_ref::<Self>() else {
            return Err(DomainError::InvalidWriteSpec(format!(
                "cannot graft a {} subtree into an XML document",
                subtree.format()
            )));
        };
        match self.first_element_mut(dest) {
            Some(element) => {
                element.children.push(XmlNode::Element(other.root.clone()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn serialize(&self) -> DomainResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        let written: io::Result<()> = (|| {
            if self.declaration {
                writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
            }
            for node in &self.prolog {
                write_node(&mut writer, node)?;
            }
            write_element(&mut writer, &self.root)?;
            for node in &self.epilog {
                write_node(&mut writer, node)?;
            }
            Ok(())
        })();
        written.map_err(|e| invalid(format!("failed to write XML: {e}")))?;

        let mut text = String::from_utf8(writer.into_inner())
            .map_err(|e| invalid(format!("non UTF-8 output: {e}")))?;
        text.push('\n');
        Ok(text)
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

    const TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- swarm template -->
<argos-configuration>
  <framework>
    <experiment length="100" random_seed="0"/>
  </framework>
  <arena size="10,10,2" center="5,5,1">
    <box id="wall_north" size="10,0.1,0.5"/>
    <box id="wall_south" size="10,0.1,0.5"/>
    <light id="l0" intensity="3.0"/>
  </arena>
  <visualization>note &amp; text</visualization>
</argos-configuration>
"#;

    fn doc() -> XmlDefinition {
        XmlDefinition::parse(TEMPLATE).unwrap()
    }

    fn p(s: &str) -> NodePath {
        NodePath::parse(s).unwrap()
    }

    #[test]
    fn round_trip_is_structurally_identical() {
        let original = doc();
        let text = original.serialize().unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<!-- swarm template -->"));
        assert_eq!(XmlDefinition::parse(&text).unwrap(), original);
    }

    #[test]
    fn doctype_and_instructions_survive_a_round_trip() {
        let text = r#"<?xml version="1.0"?>
<!DOCTYPE launch SYSTEM "launch.dtd">
<?xml-stylesheet type="text/xsl" href="view.xsl"?>
<launch>
  <?robot mode="sim"?>
  <node name="controller"/>
</launch>
<!-- trailer -->
"#;
        let original = XmlDefinition::parse(text).unwrap();
        let out = original.serialize().unwrap();
        assert!(out.contains(r#"<!DOCTYPE launch SYSTEM "launch.dtd">"#));
        assert!(out.contains(r#"<?xml-stylesheet type="text/xsl" href="view.xsl"?>"#));
        assert!(out.contains(r#"<?robot mode="sim"?>"#));
        assert!(out.contains("<!-- trailer -->"));
        assert!(out.find("<!DOCTYPE").unwrap() < out.find("<launch>").unwrap());
        assert_eq!(XmlDefinition::parse(&out).unwrap(), original);

        let node = p("./launch/node");
        assert_eq!(original.attr_get(&node, "name").as_deref(), Some("controller"));
    }

    #[test]
    fn paths_resolve_to_their_first_match() {
        let mut d = doc();
        assert_eq!(d.attr_get(&p(".//box"), "id").as_deref(), Some("wall_north"));
        assert!(d.attr_change(&p(".//box"), "size", "1,1,1"));
        assert_eq!(d.attr_get(&p(".//box[2]"), "size").as_deref(), Some("10,0.1,0.5"));
        assert!(d.attr_add(&p(".//box"), "movable", "false").unwrap());
    }

    #[test]
    fn change_needs_an_existing_attribute_and_add_a_missing_one() {
        let mut d = doc();
        assert!(!d.attr_change(&p(".//arena"), "rotation", "0"));
        assert!(d.attr_add(&p(".//arena"), "rotation", "0").unwrap());
        assert!(!d.attr_add(&p(".//arena"), "rotation", "1").unwrap());
        assert!(d.attr_change(&p(".//arena"), "rotation", "1"));
        assert!(d.has_attr(&p(".//arena"), "rotation"));
        assert!(!d.attr_add(&p(".//nowhere"), "x", "1").unwrap());
    }

    #[test]
    fn elements_and_attributes_are_distinct() {
        let d = doc();
        assert!(d.has_element(&p(".//arena")));
        assert!(!d.has_element(&p(".//arena/size")));
        assert!(d.has_attr(&p(".//arena"), "size"));
        assert!(!d.has_attr(&p(".//arena"), "box"));
    }

    #[test]
    fn duplicate_policy_for_element_add() {
        let mut d = doc();
        let attrs = IndexMap::from([("quantity".to_string(), "4".to_string())]);

        assert!(d.element_add(&p(".//arena"), "distribute", &IndexMap::new(), false).unwrap());
        assert!(!d.element_add(&p(".//arena"), "distribute", &IndexMap::new(), false).unwrap());
        assert!(d.element_add(&p(".//arena/distribute"), "entity", &attrs, false).unwrap());
        assert!(d.element_add(&p(".//arena/distribute"), "entity", &attrs, true).unwrap());

        assert_eq!(p(".//distribute/entity").select(&d).len(), 2);
        assert_eq!(d.attr_get(&p(".//distribute/entity"), "quantity").as_deref(), Some("4"));
    }

    #[test]
    fn remove_and_rename_children() {
        let mut d = doc();
        assert!(d.element_remove(&p(".//arena"), "box", false));
        assert_eq!(d.attr_get(&p(".//box"), "id").as_deref(), Some("wall_south"));
        assert!(d.element_remove(&p(".//arena"), "box", true));
        assert!(!d.has_element(&p(".//box")));
        assert!(!d.element_remove(&p(".//arena"), "box", true));

        assert!(d.element_change(&p(".//arena"), "light", "lamp"));
        assert!(d.has_element(&p(".//arena/lamp")));
        assert!(!d.element_change(&p(".//arena"), "light", "lamp"));
    }

    #[test]
    fn extract_rename_and_graft() {
        let d = doc();
        let mut arena = d.extract(&p(".//arena")).unwrap();
        assert!(arena.has_element(&p("./arena/box")));
        assert!(arena.rename_root("arena_only"));
        assert!(arena.has_element(&p("./arena_only")));

        let light = d.extract(&p(".//light")).unwrap();
        let mut fresh = d.with_root("lights", &IndexMap::new());
        assert!(fresh.graft(&p("./lights"), light.as_ref()).unwrap());
        assert_eq!(
            fresh.attr_get(&p("./lights/light"), "intensity").as_deref(),
            Some("3.0")
        );

        let whole = d.extract(&NodePath::root()).unwrap();
        assert_eq!(whole.serialize().unwrap(), d.serialize().unwrap());
    }

    #[test]
    fn text_is_escaped_on_output() {
        let text = doc().serialize().unwrap();
        assert!(text.contains("note &amp; text"));
    }

    #[test]
    fn malformed_documents_are_rejected() {
        for bad in ["", "<a><b></a>", "<a/><b/>", "<a>"] {
            assert!(
                matches!(XmlDefinition::parse(bad), Err(DomainError::InvalidDefinition(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }
}
