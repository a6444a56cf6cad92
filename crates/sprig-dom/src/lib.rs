//! In-memory host document.
//!
//! [`MemoryDocument`] implements `sprig_core::Host` over a flat node table
//! and records every write as a [`Mutation`], which makes it the host of
//! choice for tests and headless runs:
//!
//! ```rust
//! use sprig_core::*;
//! use sprig_dom::MemoryDocument;
//!
//! let mut doc = MemoryDocument::new();
//! let root = doc.create_root("main");
//! let renderer = Renderer::new(doc);
//!
//! renderer
//!     .render(Some(h("p", Props::new().class("intro"), children!["hi"])), root)
//!     .unwrap();
//! let html = renderer.with_host(|doc| doc.to_html(root)).unwrap();
//! assert_eq!(html, r#"<main><p class="intro">hi</p></main>"#);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use smallvec::SmallVec;
use sprig_core::{EventHandler, EventSource, Host, HostError, HostId};

/// One host write, in the order it was issued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    CreateElement { node: HostId, tag: String },
    CreateText { node: HostId, value: String },
    SetText { node: HostId, value: String },
    SetAttribute { node: HostId, name: String, value: String },
    RemoveAttribute { node: HostId, name: String },
    SetStyle { node: HostId, name: String, value: String },
    ClearStyle { node: HostId, name: String },
    AddListener { node: HostId, event: String },
    RemoveListener { node: HostId, event: String },
    AppendChild { parent: HostId, child: HostId },
    InsertBefore { parent: HostId, child: HostId, reference: HostId },
    RemoveChild { parent: HostId, child: HostId },
}

#[derive(Debug)]
enum NodeData {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        style: BTreeMap<String, String>,
        listeners: SmallVec<[(String, EventHandler); 2]>,
    },
    Text(String),
}

#[derive(Debug)]
struct DomNode {
    data: NodeData,
    parent: Option<HostId>,
    children: Vec<HostId>,
}

/// A detached, single-threaded document. Removed nodes stay addressable
/// (like a DOM node kept alive by a reference) but have no parent.
#[derive(Debug)]
pub struct MemoryDocument {
    nodes: HashMap<HostId, DomNode>,
    next_id: u64,
    log: Vec<Mutation>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: 1,
            log: Vec::new(),
        }
    }

    /// Creates a parentless element to render into. Not logged.
    pub fn create_root(&mut self, tag: &str) -> HostId {
        let id = self.alloc(element_data(tag));
        log::debug!("created root <{tag}> {id}");
        id
    }

    fn alloc(&mut self, data: NodeData) -> HostId {
        let id = HostId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            DomNode {
                data,
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    fn node(&self, id: HostId) -> Result<&DomNode, HostError> {
        self.nodes.get(&id).ok_or(HostError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: HostId) -> Result<&mut DomNode, HostError> {
        self.nodes.get_mut(&id).ok_or(HostError::UnknownNode(id))
    }

    fn element_mut(
        &mut self,
        id: HostId,
    ) -> Result<
        (
            &mut BTreeMap<String, String>,
            &mut BTreeMap<String, String>,
            &mut SmallVec<[(String, EventHandler); 2]>,
        ),
        HostError,
    > {
        match &mut self.node_mut(id)?.data {
            NodeData::Element {
                attributes,
                style,
                listeners,
                ..
            } => Ok((attributes, style, listeners)),
            NodeData::Text(_) => Err(HostError::NotAnElement(id)),
        }
    }

    /// Unlinks `node` from its current parent, if any.
    fn unlink(&mut self, node: HostId) -> Result<(), HostError> {
        if let Some(parent) = self.node(node)?.parent {
            self.node_mut(parent)?.children.retain(|c| *c != node);
            self.node_mut(node)?.parent = None;
        }
        Ok(())
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.log
    }

    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        log::trace!("draining {} mutations", self.log.len());
        std::mem::take(&mut self.log)
    }

    pub fn clear_mutations(&mut self) {
        self.log.clear();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn tag(&self, node: HostId) -> Option<&str> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    pub fn attribute(&self, node: HostId, name: &str) -> Option<&str> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    pub fn style(&self, node: HostId, name: &str) -> Option<&str> {
        match &self.nodes.get(&node)?.data {
            NodeData::Element { style, .. } => style.get(name).map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    pub fn listener_count(&self, node: HostId, event: &str) -> usize {
        match self.nodes.get(&node).map(|n| &n.data) {
            Some(NodeData::Element { listeners, .. }) => {
                listeners.iter().filter(|(e, _)| e == event).count()
            }
            _ => 0,
        }
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: HostId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: HostId, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.data {
            NodeData::Text(value) => out.push_str(value),
            NodeData::Element { .. } => {
                for child in &n.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Descendants of `root` with the given tag, in document order.
    pub fn find_all(&self, root: HostId, tag: &str) -> Vec<HostId> {
        let mut found = Vec::new();
        self.walk(root, &mut |id, data| {
            if let NodeData::Element { tag: t, .. } = data
                && t == tag
            {
                found.push(id);
            }
        });
        found
    }

    /// First descendant of `root` whose `id` attribute is `id`.
    pub fn element_by_id(&self, root: HostId, id: &str) -> Option<HostId> {
        let mut found = None;
        self.walk(root, &mut |node, data| {
            if found.is_none()
                && let NodeData::Element { attributes, .. } = data
                && attributes.get("id").is_some_and(|v| v == id)
            {
                found = Some(node);
            }
        });
        found
    }

    fn walk(&self, node: HostId, f: &mut dyn FnMut(HostId, &NodeData)) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        for child in &n.children {
            if let Some(c) = self.nodes.get(child) {
                f(*child, &c.data);
            }
            self.walk(*child, f);
        }
    }

    /// Serialises `node` and its subtree. Listeners are not shown.
    pub fn to_html(&self, node: HostId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: HostId, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.data {
            NodeData::Text(value) => out.push_str(&escape(value)),
            NodeData::Element {
                tag,
                attributes,
                style,
                ..
            } => {
                let _ = write!(out, "<{tag}");
                for (name, value) in attributes {
                    let _ = write!(out, " {name}=\"{}\"", escape(value));
                }
                if !style.is_empty() {
                    let css: Vec<String> =
                        style.iter().map(|(k, v)| format!("{k}: {v};")).collect();
                    let _ = write!(out, " style=\"{}\"", escape(&css.join(" ")));
                }
                out.push('>');
                for child in &n.children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

fn element_data(tag: &str) -> NodeData {
    NodeData::Element {
        tag: tag.to_string(),
        attributes: BTreeMap::new(),
        style: BTreeMap::new(),
        listeners: SmallVec::new(),
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl Host for MemoryDocument {
    fn create_element(&mut self, tag: &str) -> Result<HostId, HostError> {
        let node = self.alloc(element_data(tag));
        self.log.push(Mutation::CreateElement {
            node,
            tag: tag.to_string(),
        });
        Ok(node)
    }

    fn create_text(&mut self, value: &str) -> Result<HostId, HostError> {
        let node = self.alloc(NodeData::Text(value.to_string()));
        self.log.push(Mutation::CreateText {
            node,
            value: value.to_string(),
        });
        Ok(node)
    }

    fn set_text(&mut self, node: HostId, value: &str) -> Result<(), HostError> {
        match &mut self.node_mut(node)?.data {
            NodeData::Text(text) => *text = value.to_string(),
            NodeData::Element { .. } => return Err(HostError::NotAText(node)),
        }
        self.log.push(Mutation::SetText {
            node,
            value: value.to_string(),
        });
        Ok(())
    }

    fn set_attribute(&mut self, node: HostId, name: &str, value: &str) -> Result<(), HostError> {
        let (attributes, _, _) = self.element_mut(node)?;
        attributes.insert(name.to_string(), value.to_string());
        self.log.push(Mutation::SetAttribute {
            node,
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, node: HostId, name: &str) -> Result<(), HostError> {
        let (attributes, _, _) = self.element_mut(node)?;
        attributes.remove(name);
        self.log.push(Mutation::RemoveAttribute {
            node,
            name: name.to_string(),
        });
        Ok(())
    }

    fn set_style_field(&mut self, node: HostId, name: &str, value: &str) -> Result<(), HostError> {
        let (_, style, _) = self.element_mut(node)?;
        style.insert(name.to_string(), value.to_string());
        self.log.push(Mutation::SetStyle {
            node,
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn clear_style_field(&mut self, node: HostId, name: &str) -> Result<(), HostError> {
        let (_, style, _) = self.element_mut(node)?;
        style.remove(name);
        self.log.push(Mutation::ClearStyle {
            node,
            name: name.to_string(),
        });
        Ok(())
    }

    fn add_event_handler(
        &mut self,
        node: HostId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError> {
        let (_, _, listeners) = self.element_mut(node)?;
        listeners.push((event.to_string(), handler));
        self.log.push(Mutation::AddListener {
            node,
            event: event.to_string(),
        });
        Ok(())
    }

    fn remove_event_handler(
        &mut self,
        node: HostId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError> {
        let (_, _, listeners) = self.element_mut(node)?;
        listeners.retain(|(e, h)| !(e == event && h.ptr_eq(handler)));
        self.log.push(Mutation::RemoveListener {
            node,
            event: event.to_string(),
        });
        Ok(())
    }

    fn append_child(&mut self, parent: HostId, node: HostId) -> Result<(), HostError> {
        if let NodeData::Text(_) = self.node(parent)?.data {
            return Err(HostError::NotAnElement(parent));
        }
        self.unlink(node)?;
        self.node_mut(parent)?.children.push(node);
        self.node_mut(node)?.parent = Some(parent);
        self.log.push(Mutation::AppendChild {
            parent,
            child: node,
        });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: HostId,
        node: HostId,
        reference: HostId,
    ) -> Result<(), HostError> {
        if self.node(reference)?.parent != Some(parent) {
            return Err(HostError::NotAChild {
                parent,
                child: reference,
            });
        }
        self.node(node)?;
        self.unlink(node)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let index = siblings
            .iter()
            .position(|c| *c == reference)
            .unwrap_or(siblings.len());
        siblings.insert(index, node);
        self.node_mut(node)?.parent = Some(parent);
        self.log.push(Mutation::InsertBefore {
            parent,
            child: node,
            reference,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: HostId, node: HostId) -> Result<(), HostError> {
        if self.node(node)?.parent != Some(parent) {
            return Err(HostError::NotAChild {
                parent,
                child: node,
            });
        }
        self.unlink(node)?;
        self.log.push(Mutation::RemoveChild {
            parent,
            child: node,
        });
        Ok(())
    }

    fn contains(&self, node: HostId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn parent(&self, node: HostId) -> Option<HostId> {
        self.nodes.get(&node)?.parent
    }

    fn next_sibling(&self, node: HostId) -> Option<HostId> {
        let parent = self.parent(node)?;
        let siblings = &self.nodes.get(&parent)?.children;
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }

    fn children(&self, node: HostId) -> Vec<HostId> {
        self.nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }
}

impl EventSource for MemoryDocument {
    fn listeners(&self, node: HostId, event: &str) -> Vec<EventHandler> {
        match self.nodes.get(&node).map(|n| &n.data) {
            Some(NodeData::Element { listeners, .. }) => listeners
                .iter()
                .filter(|(e, _)| e == event)
                .map(|(_, h)| h.clone())
                .collect(),
            _ => Vec::new(),
        }
    }
}
