use std::fmt;

use crate::hooks::RenderCx;
use crate::host::HostId;
use crate::props::Props;
use crate::registry::InstanceId;

/// Tag marking an element node as a fragment.
pub const FRAGMENT: &str = "FRAGMENT";

pub type Key = String;

/// Signature of a component function.
pub type ComponentFn = fn(&mut RenderCx<'_>, &Props) -> ViewNode;

/// A named component function. Two components are the same component when
/// their function pointers are equal; the name is only used for identity
/// paths and logs.
#[derive(Clone, Copy)]
pub struct Component {
    name: &'static str,
    render: ComponentFn,
}

impl Component {
    pub const fn new(name: &'static str, render: ComponentFn) -> Self {
        Self { name, render }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render_fn(&self) -> ComponentFn {
        self.render
    }

    pub fn same(&self, other: &Component) -> bool {
        std::ptr::fn_addr_eq(self.render, other.render)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

#[derive(Clone, Debug)]
pub struct TextNode {
    pub value: String,
    pub key: Option<Key>,
    pub(crate) host: Option<HostId>,
}

#[derive(Clone, Debug)]
pub struct ElementNode {
    pub tag: String,
    pub props: Props,
    pub children: Vec<ViewNode>,
    pub key: Option<Key>,
    /// Element host node, or the detached placeholder of a fragment.
    pub(crate) host: Option<HostId>,
}

impl ElementNode {
    pub fn is_fragment(&self) -> bool {
        self.tag == FRAGMENT
    }
}

#[derive(Clone, Debug)]
pub struct ComponentNode {
    pub component: Component,
    pub props: Props,
    pub key: Option<Key>,
    pub(crate) instance: Option<InstanceId>,
}

/// One node of a view tree.
#[derive(Clone, Debug)]
pub enum ViewNode {
    Text(TextNode),
    Element(ElementNode),
    Component(ComponentNode),
}

impl ViewNode {
    pub fn key(&self) -> Option<&str> {
        match self {
            ViewNode::Text(t) => t.key.as_deref(),
            ViewNode::Element(e) => e.key.as_deref(),
            ViewNode::Component(c) => c.key.as_deref(),
        }
    }

    pub fn set_key(&mut self, key: impl Into<Key>) {
        let key = Some(key.into());
        match self {
            ViewNode::Text(t) => t.key = key,
            ViewNode::Element(e) => e.key = key,
            ViewNode::Component(c) => c.key = key,
        }
    }

    /// Host node created by this text/element node. Components do not own
    /// one directly; ask the renderer (`Renderer::host_of`).
    pub fn host(&self) -> Option<HostId> {
        match self {
            ViewNode::Text(t) => t.host,
            ViewNode::Element(e) => e.host,
            ViewNode::Component(_) => None,
        }
    }

    /// Instance backing a mounted component node.
    pub fn instance(&self) -> Option<InstanceId> {
        match self {
            ViewNode::Component(c) => c.instance,
            _ => None,
        }
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self, ViewNode::Element(e) if e.is_fragment())
    }

    pub fn children(&self) -> &[ViewNode] {
        match self {
            ViewNode::Element(e) => &e.children,
            _ => &[],
        }
    }

    /// Same variant and same tag / component function: the engine updates
    /// in place instead of replacing.
    pub fn same_kind(&self, other: &ViewNode) -> bool {
        match (self, other) {
            (ViewNode::Text(_), ViewNode::Text(_)) => true,
            (ViewNode::Element(a), ViewNode::Element(b)) => a.tag == b.tag,
            (ViewNode::Component(a), ViewNode::Component(b)) => a.component.same(&b.component),
            _ => false,
        }
    }

    pub fn kind_name(&self) -> &str {
        match self {
            ViewNode::Text(_) => "#text",
            ViewNode::Element(e) => &e.tag,
            ViewNode::Component(c) => c.component.name(),
        }
    }
}
