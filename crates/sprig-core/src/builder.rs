//! Tree construction.
//!
//! `h`, `fragment` and `component` build [`ViewNode`]s from props and a
//! list of [`Child`]ren. Children are normalised on the way in: `None` and
//! booleans vanish, lists are flattened, strings and numbers become text
//! nodes, and anything without an explicit key gets `_child_<index>`.

use std::fmt;

use crate::props::Props;
use crate::view::{Component, ComponentNode, ElementNode, FRAGMENT, TextNode, ViewNode};

/// One child argument, before normalisation.
#[derive(Clone, Debug)]
pub enum Child {
    Empty,
    Text(String),
    Node(ViewNode),
    List(Vec<Child>),
}

impl Child {
    /// Escape hatch for values with no natural child form: rendered as text
    /// of their debug representation.
    pub fn other(value: impl fmt::Debug) -> Self {
        let text = format!("{value:?}");
        log::warn!("unknown child shape, converting to text: {text}");
        Child::Text(text)
    }
}

impl From<ViewNode> for Child {
    fn from(v: ViewNode) -> Self {
        Child::Node(v)
    }
}
impl From<&str> for Child {
    fn from(v: &str) -> Self {
        Child::Text(v.to_string())
    }
}
impl From<String> for Child {
    fn from(v: String) -> Self {
        Child::Text(v)
    }
}
impl From<&String> for Child {
    fn from(v: &String) -> Self {
        Child::Text(v.clone())
    }
}
impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Empty
    }
}
impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Empty
    }
}
impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(v: Option<T>) -> Self {
        v.map_or(Child::Empty, Into::into)
    }
}
impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(v: Vec<T>) -> Self {
        Child::List(v.into_iter().map(Into::into).collect())
    }
}

macro_rules! child_from_display {
    ($($t:ty),*) => {
        $(impl From<$t> for Child {
            fn from(v: $t) -> Self {
                Child::Text(v.to_string())
            }
        })*
    };
}
child_from_display!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64, char);

/// Builds a `Vec<Child>` from heterogeneous values.
///
/// ```rust
/// use sprig_core::*;
///
/// let show = false;
/// let kids = children!["Count: ", 3, show.then(|| text("hidden"))];
/// assert_eq!(kids.len(), 3);
/// ```
#[macro_export]
macro_rules! children {
    () => { ::std::vec::Vec::<$crate::Child>::new() };
    ($($child:expr),+ $(,)?) => {
        vec![$($crate::Child::from($child)),+]
    };
}

pub fn text(value: impl Into<String>) -> ViewNode {
    ViewNode::Text(TextNode {
        value: value.into(),
        key: None,
        host: None,
    })
}

/// Element node. A `key` set on `props` moves onto the node.
pub fn h(tag: impl Into<String>, mut props: Props, children: Vec<Child>) -> ViewNode {
    let key = props.take_key();
    ViewNode::Element(ElementNode {
        tag: tag.into(),
        props,
        children: normalize(children),
        key,
        host: None,
    })
}

pub fn fragment(props: Props, children: Vec<Child>) -> ViewNode {
    h(FRAGMENT, props, children)
}

/// Component node; the normalised children travel as `props.children`.
pub fn component(component: Component, mut props: Props, children: Vec<Child>) -> ViewNode {
    let key = props.take_key();
    props.children = normalize(children);
    ViewNode::Component(ComponentNode {
        component,
        props,
        key,
        instance: None,
    })
}

pub fn normalize(children: Vec<Child>) -> Vec<ViewNode> {
    let mut out = Vec::with_capacity(children.len());
    for (index, child) in children.into_iter().enumerate() {
        push_child(&mut out, child, format!("_child_{index}"));
    }
    out
}

fn push_child(out: &mut Vec<ViewNode>, child: Child, fallback: String) {
    match child {
        Child::Empty => {}
        Child::Text(value) => out.push(ViewNode::Text(TextNode {
            value,
            key: Some(fallback),
            host: None,
        })),
        Child::Node(mut node) => {
            if node.key().is_none() {
                node.set_key(fallback);
            }
            out.push(node);
        }
        Child::List(items) => {
            for (i, item) in items.into_iter().enumerate() {
                push_child(out, item, format!("{fallback}_{i}"));
            }
        }
    }
}
