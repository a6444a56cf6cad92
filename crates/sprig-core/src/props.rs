use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::host::{Event, EventHandler, Host, HostError, HostId};
use crate::registry::InstanceId;
use crate::view::{Key, ViewNode};

/// Inline style, field name to value.
pub type Style = BTreeMap<String, String>;

/// What a `ref` callback gets attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefTarget {
    Host(HostId),
    Instance(InstanceId),
}

/// `ref` prop. Called with `Some(target)` once the node is live and with
/// `None` when it goes away or the callback is swapped out.
#[derive(Clone)]
pub struct RefCallback(Rc<dyn Fn(Option<RefTarget>)>);

impl RefCallback {
    pub fn new(f: impl Fn(Option<RefTarget>) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, target: Option<RefTarget>) {
        (self.0)(target)
    }

    pub fn ptr_eq(&self, other: &RefCallback) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for RefCallback {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for RefCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefCallback(<callback>)")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Style(Style),
    Handler(EventHandler),
    Ref(RefCallback),
}

impl PropValue {
    /// String form written to the host, or `None` when the attribute should
    /// be absent (`Null`, `false`, callbacks).
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            PropValue::Null | PropValue::Bool(false) => None,
            PropValue::Bool(true) => Some("true".to_string()),
            PropValue::Int(v) => Some(v.to_string()),
            PropValue::Float(v) => Some(v.to_string()),
            PropValue::Str(s) => Some(s.clone()),
            PropValue::Style(style) => Some(
                style
                    .iter()
                    .map(|(k, v)| format!("{k}: {v};"))
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            PropValue::Handler(_) | PropValue::Ref(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Str(v.to_string())
    }
}
impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Str(v)
    }
}
impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}
impl From<i32> for PropValue {
    fn from(v: i32) -> Self {
        PropValue::Int(v.into())
    }
}
impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}
impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Float(v)
    }
}
impl From<Style> for PropValue {
    fn from(v: Style) -> Self {
        PropValue::Style(v)
    }
}
impl From<EventHandler> for PropValue {
    fn from(v: EventHandler) -> Self {
        PropValue::Handler(v)
    }
}
impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(PropValue::Null, Into::into)
    }
}

/// Property bag of an element or component node.
///
/// `key` lives here only until the builder moves it onto the node;
/// `children` is filled for component nodes (children passed as a prop).
#[derive(Clone, Debug, Default)]
pub struct Props {
    entries: BTreeMap<String, PropValue>,
    pub(crate) key: Option<Key>,
    pub children: Vec<ViewNode>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    pub fn class(self, class: impl Into<String>) -> Self {
        self.set("class", class.into())
    }

    pub fn id(self, id: impl Into<String>) -> Self {
        self.set("id", id.into())
    }

    /// Adds one field to the `style` prop.
    pub fn style(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        match self.entries.get_mut("style") {
            Some(PropValue::Style(style)) => {
                style.insert(field.into(), value.into());
            }
            _ => {
                let mut style = Style::new();
                style.insert(field.into(), value.into());
                self.entries.insert("style".to_string(), PropValue::Style(style));
            }
        }
        self
    }

    /// Registers `f` for `event` (stored as `on<event>`).
    pub fn on(self, event: &str, f: impl Fn(&Event) + 'static) -> Self {
        self.handler(event, EventHandler::new(f))
    }

    pub fn handler(self, event: &str, handler: EventHandler) -> Self {
        self.set(format!("on{}", event.to_lowercase()), handler)
    }

    pub fn with_ref(self, f: impl Fn(Option<RefTarget>) + 'static) -> Self {
        self.ref_callback(RefCallback::new(f))
    }

    pub fn ref_callback(mut self, callback: RefCallback) -> Self {
        self.entries
            .insert("ref".to_string(), PropValue::Ref(callback));
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(PropValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(PropValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_ref(&self) -> Option<&RefCallback> {
        match self.entries.get("ref") {
            Some(PropValue::Ref(cb)) => Some(cb),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn take_key(&mut self) -> Option<Key> {
        self.key.take()
    }
}

fn is_reserved(name: &str) -> bool {
    matches!(name, "key" | "children" | "ref")
}

/// `onclick` + handler value -> `Some("click")`.
fn event_name<'a>(name: &'a str, value: &PropValue) -> Option<&'a str> {
    match value {
        PropValue::Handler(_) if name.len() > 2 && name.starts_with("on") => Some(&name[2..]),
        _ => None,
    }
}

/// Applies the difference between `old` and `new` to a live host element.
/// Returns the number of host writes issued.
pub(crate) fn reconcile_props<H: Host + ?Sized>(
    host: &mut H,
    node: HostId,
    old: &Props,
    new: &Props,
) -> Result<usize, HostError> {
    let mut writes = 0;

    for (name, old_value) in old.iter() {
        if is_reserved(name) || new.entries.contains_key(name) {
            continue;
        }
        writes += remove_prop(host, node, name, old_value)?;
    }

    for (name, value) in new.iter() {
        if is_reserved(name) {
            continue;
        }
        let old_value = old.get(name);
        if old_value == Some(value) {
            continue;
        }

        // Whatever the old value registered or styled goes first, unless the
        // new value takes over the same slot.
        match (old_value, value) {
            (Some(PropValue::Style(_)), PropValue::Style(_)) => {}
            (Some(prev @ PropValue::Handler(_)), _) if event_name(name, prev).is_some() => {
                writes += remove_prop(host, node, name, prev)?;
            }
            (Some(prev @ PropValue::Style(_)), _) if name == "style" => {
                writes += remove_prop(host, node, name, prev)?;
            }
            _ => {}
        }

        if let Some(event) = event_name(name, value) {
            if old_value.is_some_and(|o| o.to_attribute().is_some()) {
                host.remove_attribute(node, name)?;
                writes += 1;
            }
            if let PropValue::Handler(handler) = value {
                host.add_event_handler(node, event, handler.clone())?;
                writes += 1;
            }
            continue;
        }

        if let (PropValue::Style(style), "style") = (value, name) {
            let previous = match old_value {
                Some(PropValue::Style(prev)) => Some(prev),
                Some(other) if other.to_attribute().is_some() => {
                    host.remove_attribute(node, name)?;
                    writes += 1;
                    None
                }
                _ => None,
            };
            if let Some(prev) = previous {
                for field in prev.keys().filter(|f| !style.contains_key(*f)) {
                    host.clear_style_field(node, field)?;
                    writes += 1;
                }
            }
            for (field, v) in style {
                if previous.and_then(|p| p.get(field)) != Some(v) {
                    host.set_style_field(node, field, v)?;
                    writes += 1;
                }
            }
            continue;
        }

        match value.to_attribute() {
            Some(v) => {
                host.set_attribute(node, name, &v)?;
                writes += 1;
            }
            None if old_value.is_some_and(|o| o.to_attribute().is_some()) => {
                host.remove_attribute(node, name)?;
                writes += 1;
            }
            None => {}
        }
    }

    Ok(writes)
}

fn remove_prop<H: Host + ?Sized>(
    host: &mut H,
    node: HostId,
    name: &str,
    value: &PropValue,
) -> Result<usize, HostError> {
    if let (Some(event), PropValue::Handler(handler)) = (event_name(name, value), value) {
        host.remove_event_handler(node, event, handler)?;
        return Ok(1);
    }
    match value {
        PropValue::Style(style) if name == "style" => {
            for field in style.keys() {
                host.clear_style_field(node, field)?;
            }
            Ok(style.len())
        }
        v if v.to_attribute().is_some() => {
            host.remove_attribute(node, name)?;
            Ok(1)
        }
        _ => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_builder_merges_fields() {
        let props = Props::new().style("color", "red").style("width", "10px");
        match props.get("style") {
            Some(PropValue::Style(style)) => {
                assert_eq!(style.get("color").map(String::as_str), Some("red"));
                assert_eq!(style.len(), 2);
            }
            other => panic!("unexpected style prop: {other:?}"),
        }
    }

    #[test]
    fn falsy_values_have_no_attribute_form() {
        assert_eq!(PropValue::Null.to_attribute(), None);
        assert_eq!(PropValue::Bool(false).to_attribute(), None);
        assert_eq!(PropValue::Bool(true).to_attribute().as_deref(), Some("true"));
        assert_eq!(PropValue::Int(3).to_attribute().as_deref(), Some("3"));
    }

    #[test]
    fn handlers_compare_by_identity() {
        let a = EventHandler::new(|_| {});
        let b = EventHandler::new(|_| {});
        assert_eq!(PropValue::Handler(a.clone()), PropValue::Handler(a.clone()));
        assert_ne!(PropValue::Handler(a), PropValue::Handler(b));
    }

    #[test]
    fn on_lowercases_event_names() {
        let props = Props::new().on("Click", |_| {});
        let value = props.get("onclick").expect("handler stored");
        assert_eq!(event_name("onclick", value), Some("click"));
    }
}
