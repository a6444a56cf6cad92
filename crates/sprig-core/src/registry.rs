//! Arena of component instances.
//!
//! View nodes never own an instance; a mounted component node carries an
//! [`InstanceId`] and everything else (props, hook slots, the last rendered
//! subtree) lives here. Ids are generational, so a handle kept past
//! `release` simply stops resolving.

use std::collections::HashMap;
use std::fmt;

use slotmap::{SlotMap, new_key_type};

use crate::hooks::HookSlots;
use crate::host::HostId;
use crate::props::Props;
use crate::view::{Component, Key, ViewNode};

new_key_type! {
    pub struct InstanceId;
}

/// Stable identity of an instance: the key path from the render root down
/// to the component node, suffixed with the component name.
///
/// Built by the engine as `#<root>/<key>/<key>...:<Name>`, where each key is
/// the node's explicit key or its `_child_<index>` fallback, and siblings
/// sharing a key get a `#<n>` ordinal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceKey(String);

impl InstanceKey {
    pub fn new(path: &str, component: &str) -> Self {
        Self(format!("{path}:{component}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct Instance {
    pub(crate) key: InstanceKey,
    pub(crate) component: Component,
    pub(crate) props: Props,
    pub(crate) hooks: HookSlots,
    /// Child tree returned by the last render.
    pub(crate) rendered: Option<ViewNode>,
    /// Host node the rendered subtree is attached to.
    pub(crate) parent: Option<HostId>,
    /// Key of the component node currently representing this instance.
    pub(crate) node_key: Option<Key>,
    pub(crate) renders: u64,
}

impl Instance {
    pub fn key(&self) -> &InstanceKey {
        &self.key
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn rendered(&self) -> Option<&ViewNode> {
        self.rendered.as_ref()
    }

    pub fn parent(&self) -> Option<HostId> {
        self.parent
    }

    pub fn node_key(&self) -> Option<&str> {
        self.node_key.as_deref()
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("key", &self.key)
            .field("component", &self.component)
            .field("hooks", &self.hooks.len())
            .field("parent", &self.parent)
            .field("renders", &self.renders)
            .finish()
    }
}

#[derive(Default)]
pub struct Registry {
    instances: SlotMap<InstanceId, Instance>,
    by_key: HashMap<InstanceKey, InstanceId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create-or-reuse. `existing` (the handle a node already carries) wins
    /// when it is still live; otherwise the identity index is consulted.
    ///
    /// An instance whose output is still mounted belongs to another node and
    /// is never handed out again: a component moving between sibling slots
    /// gets a fresh instance, and the old one is released with its node.
    pub fn resolve(
        &mut self,
        component: Component,
        props: &Props,
        parent: Option<HostId>,
        key: InstanceKey,
        existing: Option<InstanceId>,
    ) -> InstanceId {
        let reuse = existing
            .filter(|id| self.instances.contains_key(*id))
            .or_else(|| self.by_key.get(&key).copied())
            .filter(|id| {
                self.instances.get(*id).is_some_and(|inst| {
                    inst.component.same(&component) && inst.rendered.is_none()
                })
            });

        if let Some(id) = reuse
            && let Some(inst) = self.instances.get_mut(id)
        {
            inst.props = props.clone();
            if parent.is_some() {
                inst.parent = parent;
            }
            return id;
        }

        if self.by_key.contains_key(&key) {
            log::debug!("instance key '{key}' is still held; the new instance shadows it");
        }

        let id = self.instances.insert(Instance {
            key: key.clone(),
            component,
            props: props.clone(),
            hooks: HookSlots::new(),
            rendered: None,
            parent,
            node_key: None,
            renders: 0,
        });
        log::debug!("created instance {key}");
        self.by_key.insert(key, id);
        id
    }

    /// Drops an instance. Only the engine's unmount path calls this.
    pub fn release(&mut self, id: InstanceId) -> Option<Instance> {
        let inst = self.instances.remove(id)?;
        if self.by_key.get(&inst.key) == Some(&id) {
            self.by_key.remove(&inst.key);
        }
        log::debug!("released instance {}", inst.key);
        Some(inst)
    }

    pub fn get(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.instances.get_mut(id)
    }

    pub fn lookup(&self, key: &InstanceKey) -> Option<InstanceId> {
        self.by_key.get(key).copied()
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.instances.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::text;
    use crate::hooks::RenderCx;

    #[allow(non_snake_case)]
    fn Label(_cx: &mut RenderCx<'_>, _props: &Props) -> ViewNode {
        text("label")
    }

    #[allow(non_snake_case)]
    fn Other(_cx: &mut RenderCx<'_>, _props: &Props) -> ViewNode {
        text("other")
    }

    const LABEL: Component = Component::new("Label", Label);
    const OTHER: Component = Component::new("Other", Other);

    #[test]
    fn resolve_reuses_by_identity() {
        let mut reg = Registry::new();
        let key = InstanceKey::new("#1/_child_0", "Label");
        let a = reg.resolve(LABEL, &Props::new(), Some(HostId(1)), key.clone(), None);
        let b = reg.resolve(LABEL, &Props::new().id("x"), None, key, None);
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
        let inst = reg.get(a).unwrap();
        assert_eq!(inst.props().get_str("id"), Some("x"));
        // a missing parent does not clobber the known one
        assert_eq!(inst.parent(), Some(HostId(1)));
    }

    #[test]
    fn distinct_paths_get_distinct_instances() {
        let mut reg = Registry::new();
        let a = reg.resolve(LABEL, &Props::new(), None, InstanceKey::new("#1/a", "Label"), None);
        let b = reg.resolve(LABEL, &Props::new(), None, InstanceKey::new("#1/b", "Label"), None);
        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn released_handles_do_not_resolve() {
        let mut reg = Registry::new();
        let key = InstanceKey::new("#1/a", "Label");
        let a = reg.resolve(LABEL, &Props::new(), None, key.clone(), None);
        assert!(reg.release(a).is_some());
        assert!(!reg.contains(a));
        assert_eq!(reg.lookup(&key), None);

        let b = reg.resolve(LABEL, &Props::new(), None, key, Some(a));
        assert_ne!(a, b);
        assert!(reg.release(a).is_none());
    }

    #[test]
    fn mounted_instances_are_not_shared() {
        let mut reg = Registry::new();
        let key = InstanceKey::new("#1/k", "Label");
        let a = reg.resolve(LABEL, &Props::new(), None, key.clone(), None);
        reg.get_mut(a).unwrap().rendered = Some(text("label"));

        let b = reg.resolve(LABEL, &Props::new(), None, key.clone(), None);
        assert_ne!(a, b);
        assert_eq!(reg.lookup(&key), Some(b));
        // a copied node carrying the mounted handle does not get it either
        let c = reg.resolve(LABEL, &Props::new(), None, key.clone(), Some(a));
        assert_ne!(c, a);

        reg.release(a);
        assert_eq!(reg.lookup(&key), Some(c));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn different_component_is_not_reused() {
        let mut reg = Registry::new();
        let key = InstanceKey::new("#1/a", "Label");
        let a = reg.resolve(LABEL, &Props::new(), None, key.clone(), None);
        let b = reg.resolve(OTHER, &Props::new(), None, key.clone(), None);
        assert_ne!(a, b);
        assert_eq!(reg.lookup(&key), Some(b));

        // releasing the shadowed instance leaves the newer index entry alone
        reg.release(a);
        assert_eq!(reg.lookup(&key), Some(b));
    }
}
