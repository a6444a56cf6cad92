//! # Host surface
//!
//! The engine never touches a concrete document. Everything it mutates goes
//! through [`Host`], addressed by opaque [`HostId`] handles that the host
//! hands out from `create_element` / `create_text`.
//!
//! A host only needs to answer a handful of structural queries (`parent`,
//! `next_sibling`, `children`, `contains`); the rest of the trait is the
//! write path. Every method is fallible and failures propagate unchanged to
//! whoever called `patch`.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

/// Opaque handle to a node living in a [`Host`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(pub u64);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Event payload delivered to handlers registered through `on*` props.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Event {
    pub name: String,
    pub value: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Shared event callback. Compared by pointer identity.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &EventHandler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler(<callback>)")
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("host node {0} does not exist")]
    UnknownNode(HostId),
    #[error("host node {0} is not an element")]
    NotAnElement(HostId),
    #[error("host node {0} is not a text node")]
    NotAText(HostId),
    #[error("host node {child} is not a child of {parent}")]
    NotAChild { parent: HostId, child: HostId },
    #[error("{0}")]
    Other(String),
}

/// Minimal mutable presentation tree driven by the engine.
pub trait Host {
    fn create_element(&mut self, tag: &str) -> Result<HostId, HostError>;
    fn create_text(&mut self, value: &str) -> Result<HostId, HostError>;
    fn set_text(&mut self, node: HostId, value: &str) -> Result<(), HostError>;

    fn set_attribute(&mut self, node: HostId, name: &str, value: &str) -> Result<(), HostError>;
    fn remove_attribute(&mut self, node: HostId, name: &str) -> Result<(), HostError>;

    fn set_style_field(&mut self, node: HostId, name: &str, value: &str)
    -> Result<(), HostError>;
    fn clear_style_field(&mut self, node: HostId, name: &str) -> Result<(), HostError>;

    fn add_event_handler(
        &mut self,
        node: HostId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError>;
    fn remove_event_handler(
        &mut self,
        node: HostId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError>;

    fn append_child(&mut self, parent: HostId, node: HostId) -> Result<(), HostError>;
    /// Inserts `node` into `parent` right before `reference`.
    fn insert_before(
        &mut self,
        parent: HostId,
        node: HostId,
        reference: HostId,
    ) -> Result<(), HostError>;
    fn remove_child(&mut self, parent: HostId, node: HostId) -> Result<(), HostError>;

    fn contains(&self, node: HostId) -> bool;
    fn parent(&self, node: HostId) -> Option<HostId>;
    fn next_sibling(&self, node: HostId) -> Option<HostId>;
    fn children(&self, node: HostId) -> Vec<HostId>;
}

/// Hosts that can hand back the listeners registered on a node, so the
/// renderer can dispatch events without holding its own borrow.
pub trait EventSource {
    fn listeners(&self, node: HostId, event: &str) -> Vec<EventHandler>;
}
