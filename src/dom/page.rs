//! In-memory document for the viewer page.
//!
//! Nodes live in an arena and refer to each other by index, the way a browser DOM hands out
//! node ids. Every element with an `id` attribute is indexed, including elements that arrive
//! later through [`Page::set_inner_html`], so markup injected by the keymap module is
//! addressable straight away.

use crate::dom::markup::{
    Attribute, Token, decode_entities, escape_attribute, escape_text, is_void_element, tokenize,
};
use crate::host_bridge::bridge_errors::BridgeError;
use rustc_hash::FxHashMap;
use std::path::Path;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Element {
        tag: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    Text(String),
    Comment(String),
    Declaration(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Page {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    ids: FxHashMap<String, NodeId>,
}

const ROOT: NodeId = 0;

impl Page {
    pub fn parse(html: &str) -> Self {
        let mut page = Page {
            nodes: vec![Some(Node {
                kind: NodeKind::Document,
                children: Vec::new(),
            })],
            free: Vec::new(),
            ids: FxHashMap::default(),
        };

        page.append_markup(ROOT, html);
        page.reindex();
        page
    }

    pub fn from_file(path: &Path) -> Result<Self, BridgeError> {
        let html = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::file_error(path, format!("Could not read page template: {e}"))
        })?;
        Ok(Page::parse(&html))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    pub fn element_ids(&self) -> impl Iterator<Item = &str> {
        self.ids.keys().map(String::as_str)
    }

    pub fn tag_name(&self, id: &str) -> Result<&str, BridgeError> {
        match &self.node(self.element(id)?).kind {
            NodeKind::Element { tag, .. } => Ok(tag),
            _ => Err(BridgeError::missing_element(id)),
        }
    }

    pub fn get_attribute(&self, id: &str, name: &str) -> Result<Option<&str>, BridgeError> {
        let node = self.element(id)?;
        Ok(self
            .attributes(node)
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| attribute.value.as_str()))
    }

    pub fn set_attribute(&mut self, id: &str, name: &str, value: &str) -> Result<(), BridgeError> {
        let node = self.element(id)?;
        let attributes = self.attributes_mut(node);

        match attributes.iter_mut().find(|attribute| attribute.name == name) {
            Some(attribute) => attribute.value = value.to_string(),
            None => attributes.push(Attribute {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }

        // The id index follows renames
        if name == "id" {
            self.reindex();
        }
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: &str, name: &str) -> Result<(), BridgeError> {
        let node = self.element(id)?;
        self.attributes_mut(node)
            .retain(|attribute| attribute.name != name);
        Ok(())
    }

    /// `element.style.<property>`, empty when the property is not set
    pub fn style_property(&self, id: &str, property: &str) -> Result<String, BridgeError> {
        let style = self.get_attribute(id, "style")?.unwrap_or_default();
        Ok(parse_style(style)
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
            .unwrap_or_default())
    }

    pub fn set_style_property(
        &mut self,
        id: &str,
        property: &str,
        value: &str,
    ) -> Result<(), BridgeError> {
        let style = self.get_attribute(id, "style")?.unwrap_or_default();
        let mut declarations = parse_style(style);

        match declarations.iter_mut().find(|(name, _)| name == property) {
            Some(declaration) => declaration.1 = value.to_string(),
            None => declarations.push((property.to_string(), value.to_string())),
        }

        let serialised = declarations
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("; ");
        self.set_attribute(id, "style", &serialised)
    }

    pub fn is_checked(&self, id: &str) -> Result<bool, BridgeError> {
        Ok(self.get_attribute(id, "checked")?.is_some())
    }

    /// `element.checked = checked`. Checking a radio button unchecks the rest of its group.
    pub fn set_checked(&mut self, id: &str, checked: bool) -> Result<(), BridgeError> {
        if !checked {
            return self.remove_attribute(id, "checked");
        }

        let is_radio = self
            .get_attribute(id, "type")?
            .is_some_and(|kind| kind.eq_ignore_ascii_case("radio"));
        let group = self.get_attribute(id, "name")?.map(str::to_string);

        if let (true, Some(group)) = (is_radio, group) {
            let siblings: Vec<String> = self
                .ids
                .keys()
                .filter(|other| other.as_str() != id)
                .filter(|other| {
                    self.get_attribute(other, "type")
                        .ok()
                        .flatten()
                        .is_some_and(|kind| kind.eq_ignore_ascii_case("radio"))
                        && self.get_attribute(other, "name").ok().flatten() == Some(group.as_str())
                })
                .cloned()
                .collect();

            for sibling in siblings {
                self.remove_attribute(&sibling, "checked")?;
            }
        }

        self.set_attribute(id, "checked", "")
    }

    /// `element.value`. A text area's value is its decoded text content.
    pub fn value(&self, id: &str) -> Result<String, BridgeError> {
        if self.tag_name(id)?.eq_ignore_ascii_case("textarea") {
            return Ok(decode_entities(&self.text_content(id)?));
        }
        Ok(self.get_attribute(id, "value")?.unwrap_or_default().to_string())
    }

    pub fn set_value(&mut self, id: &str, value: &str) -> Result<(), BridgeError> {
        if self.tag_name(id)?.eq_ignore_ascii_case("textarea") {
            return self.set_inner_html(id, &escape_text(value));
        }
        self.set_attribute(id, "value", value)
    }

    /// Replace the children of an element with parsed markup
    pub fn set_inner_html(&mut self, id: &str, markup: &str) -> Result<(), BridgeError> {
        let node = self.element(id)?;

        let old_children = std::mem::take(&mut self.node_mut(node).children);
        for child in old_children {
            self.remove_subtree(child);
        }

        self.append_markup(node, markup);
        self.reindex();
        Ok(())
    }

    pub fn inner_html(&self, id: &str) -> Result<String, BridgeError> {
        let node = self.element(id)?;
        let mut html = String::new();
        for &child in &self.node(node).children {
            self.serialise_node(child, &mut html);
        }
        Ok(html)
    }

    /// Raw text of every text node below the element
    pub fn text_content(&self, id: &str) -> Result<String, BridgeError> {
        let node = self.element(id)?;
        let mut text = String::new();
        self.collect_text(node, &mut text);
        Ok(text)
    }

    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for &child in &self.node(ROOT).children {
            self.serialise_node(child, &mut html);
        }
        html
    }

    /// Number of nodes currently attached to the document
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    fn element(&self, id: &str) -> Result<NodeId, BridgeError> {
        self.ids
            .get(id)
            .copied()
            .ok_or_else(|| BridgeError::missing_element(id))
    }

    // Ids are only ever taken from the live arena, so lookups cannot miss
    fn node(&self, id: NodeId) -> &Node {
        match self.nodes.get(id) {
            Some(Some(node)) => node,
            _ => unreachable!("node {id} is not in the document"),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes.get_mut(id) {
            Some(Some(node)) => node,
            _ => unreachable!("node {id} is not in the document"),
        }
    }

    fn attributes(&self, node: NodeId) -> &[Attribute] {
        match &self.node(node).kind {
            NodeKind::Element { attributes, .. } => attributes.as_slice(),
            _ => &[],
        }
    }

    fn attributes_mut(&mut self, node: NodeId) -> &mut Vec<Attribute> {
        match &mut self.node_mut(node).kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => unreachable!("only elements are indexed by id"),
        }
    }

    fn insert(&mut self, kind: NodeKind, parent: NodeId) -> NodeId {
        let node = Node {
            kind,
            children: Vec::new(),
        };

        let id = match self.free.pop() {
            Some(free) => {
                self.nodes[free] = Some(node);
                free
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };

        self.node_mut(parent).children.push(id);
        id
    }

    fn remove_subtree(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.remove_subtree(child);
        }
        self.nodes[id] = None;
        self.free.push(id);
    }

    fn append_markup(&mut self, parent: NodeId, markup: &str) {
        let mut open: Vec<NodeId> = vec![parent];

        for token in tokenize(markup) {
            let current = open.last().copied().unwrap_or(parent);

            match token {
                Token::StartTag {
                    name,
                    attributes,
                    self_closing,
                } => {
                    let void = is_void_element(&name);
                    let element = self.insert(
                        NodeKind::Element {
                            tag: name,
                            attributes,
                            self_closing,
                        },
                        current,
                    );
                    if !self_closing && !void {
                        open.push(element);
                    }
                }
                Token::EndTag(name) => {
                    // Close the nearest matching element, ignore strays. Never close the parent.
                    let matching = open.iter().skip(1).rposition(|&node| match &self.node(node).kind {
                        NodeKind::Element { tag, .. } => tag.eq_ignore_ascii_case(&name),
                        _ => false,
                    });
                    if let Some(position) = matching {
                        open.truncate(position + 1);
                    }
                }
                Token::Text(text) => {
                    self.insert(NodeKind::Text(text), current);
                }
                Token::Comment(comment) => {
                    self.insert(NodeKind::Comment(comment), current);
                }
                Token::Declaration(declaration) => {
                    self.insert(NodeKind::Declaration(declaration), current);
                }
            }
        }
    }

    fn reindex(&mut self) {
        let mut ids = FxHashMap::default();
        let mut pending = vec![ROOT];

        while let Some(node) = pending.pop() {
            let node_ref = self.node(node);
            if let NodeKind::Element { attributes, .. } = &node_ref.kind {
                if let Some(id) = attributes.iter().find(|attribute| attribute.name == "id") {
                    // First element in document order wins, like getElementById
                    ids.entry(id.value.clone()).or_insert(node);
                }
            }
            pending.extend(node_ref.children.iter().rev());
        }

        self.ids = ids;
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        for &child in &self.node(node).children {
            match &self.node(child).kind {
                NodeKind::Text(text) => out.push_str(text),
                NodeKind::Element { .. } => self.collect_text(child, out),
                _ => {}
            }
        }
    }

    fn serialise_node(&self, node: NodeId, out: &mut String) {
        let node_ref = self.node(node);
        match &node_ref.kind {
            NodeKind::Document => {
                for &child in &node_ref.children {
                    self.serialise_node(child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            NodeKind::Declaration(declaration) => {
                out.push_str("<!");
                out.push_str(declaration);
                out.push('>');
            }
            NodeKind::Element {
                tag,
                attributes,
                self_closing,
            } => {
                out.push('<');
                out.push_str(tag);
                for attribute in attributes {
                    out.push(' ');
                    out.push_str(&attribute.name);
                    if !attribute.value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_attribute(&attribute.value));
                        out.push('"');
                    }
                }

                if *self_closing && node_ref.children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');

                if is_void_element(tag) {
                    return;
                }

                for &child in &node_ref.children {
                    self.serialise_node(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/page_tests.rs"]
mod tests;
