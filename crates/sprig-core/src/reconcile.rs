//! # Reconciliation
//!
//! `Engine::reconcile` compares a previous view tree with the next one and
//! brings the host in line, in four cases:
//!
//! 1. unmount (`next` is `None`)
//! 2. mount (`previous` is `None`)
//! 3. replace (variant, tag or component function differs)
//! 4. update in place (same kind)
//!
//! Children are matched by position only. Keys feed instance identity, not
//! reordering: `[A, B, C] -> [A, C]` updates slot 1 with C's content and
//! removes slot 2.

use std::collections::HashMap;
use std::rc::Weak;
use std::cell::RefCell;

use web_time::Instant;

use crate::error::{Error, Result};
use crate::hooks::{RenderCx, Rerender};
use crate::host::{Host, HostId};
use crate::props::{Props, RefCallback, RefTarget, reconcile_props};
use crate::registry::{Instance, InstanceId, InstanceKey, Registry};
use crate::renderer::{Options, PatchStats};
use crate::view::{ComponentNode, ElementNode, TextNode, ViewNode};

pub(crate) struct Engine<H: Host> {
    pub(crate) host: H,
    pub(crate) registry: Registry,
    pub(crate) options: Options,
    pub(crate) stats: PatchStats,
    /// Trees mounted through `Renderer::render`, by target.
    pub(crate) roots: HashMap<HostId, ViewNode>,
    this: Weak<RefCell<Engine<H>>>,
}

/// Identity path of the render root under `parent`.
pub(crate) fn root_path(parent: Option<HostId>) -> String {
    match parent {
        Some(id) => id.to_string(),
        None => "#detached".to_string(),
    }
}

/// Hands out child paths for one sibling list, numbering repeated keys.
struct SiblingPaths<'a> {
    parent: &'a str,
    seen: HashMap<String, usize>,
    warn_duplicates: bool,
}

impl<'a> SiblingPaths<'a> {
    fn new(parent: &'a str, warn_duplicates: bool) -> Self {
        Self {
            parent,
            seen: HashMap::new(),
            warn_duplicates,
        }
    }

    fn path_for(&mut self, node: &ViewNode, index: usize) -> String {
        let segment = match node.key() {
            Some(key) => key.to_string(),
            None => format!("_child_{index}"),
        };
        let seen = self.seen.entry(segment.clone()).or_insert(0);
        let ordinal = *seen;
        *seen += 1;
        if ordinal == 0 {
            format!("{}/{segment}", self.parent)
        } else {
            if self.warn_duplicates {
                log::warn!(
                    "duplicate key '{segment}' under {}; keys should be unique among siblings",
                    self.parent
                );
            }
            format!("{}/{segment}#{ordinal}", self.parent)
        }
    }
}

fn notify_ref_change(old: Option<&RefCallback>, new: Option<&RefCallback>, target: RefTarget) {
    if let (Some(a), Some(b)) = (old, new)
        && a.ptr_eq(b)
    {
        return;
    }
    if let Some(old) = old {
        old.call(None);
    }
    if let Some(new) = new {
        new.call(Some(target));
    }
}

impl<H: Host + 'static> Engine<H> {
    pub(crate) fn new(host: H, options: Options, this: Weak<RefCell<Engine<H>>>) -> Self {
        Self {
            host,
            registry: Registry::new(),
            options,
            stats: PatchStats::default(),
            roots: HashMap::new(),
            this,
        }
    }

    fn record(&mut self, f: impl FnOnce(&mut PatchStats)) {
        if self.options.collect_stats {
            f(&mut self.stats);
        }
    }

    /// One top-level pass: timing and a summary log around `reconcile`.
    pub(crate) fn run_pass(
        &mut self,
        previous: Option<ViewNode>,
        next: Option<&mut ViewNode>,
        parent: Option<HostId>,
    ) -> Result<Option<HostId>> {
        let started = Instant::now();
        let path = root_path(parent);
        let result = self.reconcile(previous, next, parent, None, &path);
        let elapsed = started.elapsed();
        self.record(|s| {
            s.passes += 1;
            s.last_pass = elapsed;
        });
        log::debug!(
            "patch under {path} took {:.3} ms ({} live instances)",
            elapsed.as_secs_f64() * 1000.0,
            self.registry.len()
        );
        result
    }

    /// Re-renders one instance after its state changed.
    pub(crate) fn rerender(&mut self, id: InstanceId) -> Result<()> {
        let started = Instant::now();
        let Some(inst) = self.registry.get(id) else {
            return Err(Error::InvalidContext(id));
        };
        log::debug!("re-rendering {} after a state change", inst.key);
        self.render_instance(id, None)?;
        let elapsed = started.elapsed();
        self.record(|s| {
            s.state_renders += 1;
            s.last_pass = elapsed;
        });
        Ok(())
    }

    /// `anchor` is the host node that follows this slot in `parent` (`None`
    /// for the end). It places new nodes when `previous` left nothing in the
    /// host to position against, such as an empty fragment.
    pub(crate) fn reconcile(
        &mut self,
        previous: Option<ViewNode>,
        next: Option<&mut ViewNode>,
        parent: Option<HostId>,
        anchor: Option<HostId>,
        path: &str,
    ) -> Result<Option<HostId>> {
        let Some(next) = next else {
            if let Some(previous) = previous {
                log::trace!("unmount {} at {path}", previous.kind_name());
                self.unmount(previous, true)?;
            }
            return Ok(None);
        };

        let Some(previous) = previous else {
            let parent = parent.ok_or(Error::MissingTarget)?;
            log::trace!("mount {} at {path}", next.kind_name());
            return self.mount(next, parent, anchor, path);
        };

        let parent = parent.or_else(|| {
            self.trailing_host(&previous)
                .and_then(|h| self.host.parent(h))
        });

        if !previous.same_kind(next) {
            return self.replace(previous, next, parent, anchor, path);
        }

        match (previous, next) {
            (ViewNode::Text(prev), ViewNode::Text(next)) => self.update_text(prev, next),
            (ViewNode::Element(prev), ViewNode::Element(next)) if next.is_fragment() => {
                self.update_fragment(prev, next, parent, anchor, path)
            }
            (ViewNode::Element(prev), ViewNode::Element(next)) => {
                self.update_element(prev, next, path)
            }
            (ViewNode::Component(prev), ViewNode::Component(next)) => {
                self.update_component(prev, next, parent, anchor)
            }
            (previous, next) => self.replace(previous, next, parent, anchor, path),
        }
    }

    fn insert(&mut self, parent: HostId, node: HostId, anchor: Option<HostId>) -> Result<()> {
        match anchor {
            Some(reference) => self.host.insert_before(parent, node, reference)?,
            None => self.host.append_child(parent, node)?,
        }
        Ok(())
    }

    fn mount(
        &mut self,
        node: &mut ViewNode,
        parent: HostId,
        anchor: Option<HostId>,
        path: &str,
    ) -> Result<Option<HostId>> {
        match node {
            ViewNode::Text(text) => {
                let id = self.host.create_text(&text.value)?;
                text.host = Some(id);
                self.insert(parent, id, anchor)?;
                self.record(|s| s.nodes_created += 1);
                Ok(Some(id))
            }
            ViewNode::Element(el) if el.is_fragment() => {
                // Bookkeeping only; never attached.
                let placeholder = self.host.create_text("")?;
                el.host = Some(placeholder);
                self.record(|s| s.nodes_created += 1);
                self.mount_children(&mut el.children, parent, anchor, path)?;
                Ok(Some(placeholder))
            }
            ViewNode::Element(el) => {
                let id = self.host.create_element(&el.tag)?;
                el.host = Some(id);
                let writes = reconcile_props(&mut self.host, id, &Props::default(), &el.props)?;
                self.mount_children(&mut el.children, id, None, path)?;
                self.insert(parent, id, anchor)?;
                self.record(|s| {
                    s.nodes_created += 1;
                    s.props_written += writes as u64;
                });
                notify_ref_change(None, el.props.get_ref(), RefTarget::Host(id));
                Ok(Some(id))
            }
            ViewNode::Component(c) => self.mount_component(c, parent, anchor, path),
        }
    }

    fn mount_children(
        &mut self,
        children: &mut [ViewNode],
        parent: HostId,
        anchor: Option<HostId>,
        path: &str,
    ) -> Result<()> {
        let mut paths = SiblingPaths::new(path, self.options.warn_on_duplicate_keys);
        for (index, child) in children.iter_mut().enumerate() {
            let child_path = paths.path_for(child, index);
            self.mount(child, parent, anchor, &child_path)?;
        }
        Ok(())
    }

    fn mount_component(
        &mut self,
        node: &mut ComponentNode,
        parent: HostId,
        anchor: Option<HostId>,
        path: &str,
    ) -> Result<Option<HostId>> {
        let key = InstanceKey::new(path, node.component.name());
        let id = self.registry.resolve(
            node.component,
            &node.props,
            Some(parent),
            key,
            node.instance,
        );
        node.instance = Some(id);
        if let Some(inst) = self.registry.get_mut(id) {
            inst.node_key = node.key.clone();
        }
        let host = self.render_instance(id, anchor)?;
        notify_ref_change(None, node.props.get_ref(), RefTarget::Instance(id));
        Ok(host)
    }

    /// Invokes the component function under a fresh `RenderCx` and patches
    /// the instance's previous output against the new one.
    fn render_instance(&mut self, id: InstanceId, anchor: Option<HostId>) -> Result<Option<HostId>> {
        let renderer: Weak<dyn Rerender> = self.this.clone();
        let Some(inst) = self.registry.get_mut(id) else {
            return Err(Error::InvalidContext(id));
        };

        let mut next = {
            let Instance {
                component,
                props,
                hooks,
                ..
            } = &mut *inst;
            let mut cx = RenderCx::new(id, hooks, renderer);
            (component.render_fn())(&mut cx, props)
        };
        inst.renders += 1;
        let previous = inst.rendered.take();
        let parent = inst.parent;
        let path = format!("{}/{}", inst.key, next.key().unwrap_or("_render"));
        log::trace!("rendered {} ({} hooks)", inst.key, inst.hooks.len());
        self.record(|s| s.components_rendered += 1);

        let result = self.reconcile(previous, Some(&mut next), parent, anchor, &path);
        if let Some(inst) = self.registry.get_mut(id) {
            inst.rendered = Some(next);
        }
        result
    }

    fn replace(
        &mut self,
        previous: ViewNode,
        next: &mut ViewNode,
        parent: Option<HostId>,
        anchor: Option<HostId>,
        path: &str,
    ) -> Result<Option<HostId>> {
        let parent = parent.ok_or(Error::MissingTarget)?;
        let anchor = self.anchor_after(&previous, parent, anchor);
        log::trace!(
            "replace {} with {} at {path}",
            previous.kind_name(),
            next.kind_name()
        );
        self.unmount(previous, true)?;
        self.mount(next, parent, anchor, path)
    }

    fn update_text(&mut self, prev: TextNode, next: &mut TextNode) -> Result<Option<HostId>> {
        let id = prev.host.ok_or_else(|| Error::NotMounted("#text".into()))?;
        next.host = Some(id);
        if prev.value != next.value {
            self.host.set_text(id, &next.value)?;
            self.record(|s| s.text_updates += 1);
        }
        Ok(Some(id))
    }

    fn update_element(
        &mut self,
        prev: ElementNode,
        next: &mut ElementNode,
        path: &str,
    ) -> Result<Option<HostId>> {
        let id = prev.host.ok_or_else(|| Error::NotMounted(prev.tag.clone()))?;
        next.host = Some(id);
        let writes = reconcile_props(&mut self.host, id, &prev.props, &next.props)?;
        self.record(|s| s.props_written += writes as u64);
        self.patch_children(prev.children, &mut next.children, Some(id), None, path)?;
        notify_ref_change(prev.props.get_ref(), next.props.get_ref(), RefTarget::Host(id));
        Ok(Some(id))
    }

    fn update_fragment(
        &mut self,
        prev: ElementNode,
        next: &mut ElementNode,
        parent: Option<HostId>,
        anchor: Option<HostId>,
        path: &str,
    ) -> Result<Option<HostId>> {
        next.host = prev.host;
        self.patch_children(prev.children, &mut next.children, parent, anchor, path)?;
        Ok(next.host)
    }

    fn update_component(
        &mut self,
        prev: ComponentNode,
        next: &mut ComponentNode,
        parent: Option<HostId>,
        anchor: Option<HostId>,
    ) -> Result<Option<HostId>> {
        let id = prev
            .instance
            .filter(|id| self.registry.contains(*id))
            .ok_or_else(|| Error::NotMounted(prev.component.name().to_string()))?;
        next.instance = Some(id);
        if let Some(inst) = self.registry.get_mut(id) {
            inst.props = next.props.clone();
            if parent.is_some() {
                inst.parent = parent;
            }
            inst.node_key = next.key.clone();
        }
        notify_ref_change(
            prev.props.get_ref(),
            next.props.get_ref(),
            RefTarget::Instance(id),
        );
        self.render_instance(id, anchor)
    }

    /// Pairwise by position, then mount the surplus of `next` or unmount the
    /// surplus of `previous`. `anchor` is the host node following the whole
    /// list; it is `None` for an element's own children and the fragment's
    /// successor for fragment children.
    fn patch_children(
        &mut self,
        previous: Vec<ViewNode>,
        next: &mut [ViewNode],
        parent: Option<HostId>,
        anchor: Option<HostId>,
        path: &str,
    ) -> Result<()> {
        let common = previous.len().min(next.len());

        // Host node after each previous slot, taken before anything moves.
        let mut following = vec![anchor; previous.len()];
        let mut after = anchor;
        for (index, node) in previous.iter().enumerate().rev() {
            following[index] = after;
            if let Some(leading) = self.leading_host(node) {
                after = Some(leading);
            }
        }

        let mut previous = previous.into_iter();
        let mut paths = SiblingPaths::new(path, self.options.warn_on_duplicate_keys);

        for (index, child) in next.iter_mut().enumerate().take(common) {
            let child_path = paths.path_for(child, index);
            self.reconcile(
                previous.next(),
                Some(child),
                parent,
                following[index],
                &child_path,
            )?;
        }

        if next.len() > common {
            let parent = parent.ok_or(Error::MissingTarget)?;
            let last = next[..common]
                .iter()
                .rev()
                .find_map(|c| self.trailing_host(c));
            let anchor = match last {
                Some(last) => self.host.next_sibling(last),
                None => anchor,
            };
            for (index, child) in next.iter_mut().enumerate().skip(common) {
                let child_path = paths.path_for(child, index);
                self.mount(child, parent, anchor, &child_path)?;
            }
        }

        for surplus in previous {
            self.unmount(surplus, true)?;
        }
        Ok(())
    }

    /// `detach` is false below an element that is itself being removed: its
    /// subtree leaves the host together with it.
    fn unmount(&mut self, node: ViewNode, detach: bool) -> Result<()> {
        match node {
            ViewNode::Text(text) => {
                if detach {
                    self.detach(text.host)?;
                }
            }
            ViewNode::Element(el) if el.is_fragment() => {
                for child in el.children {
                    self.unmount(child, detach)?;
                }
            }
            ViewNode::Element(el) => {
                for child in el.children {
                    self.unmount(child, false)?;
                }
                if let Some(cb) = el.props.get_ref() {
                    cb.call(None);
                }
                if detach {
                    self.detach(el.host)?;
                }
            }
            ViewNode::Component(c) => {
                if let Some(id) = c.instance {
                    let rendered = self.registry.get_mut(id).and_then(|i| i.rendered.take());
                    if let Some(rendered) = rendered {
                        self.unmount(rendered, detach)?;
                    }
                    self.registry.release(id);
                }
                if let Some(cb) = c.props.get_ref() {
                    cb.call(None);
                }
            }
        }
        Ok(())
    }

    fn detach(&mut self, host: Option<HostId>) -> Result<()> {
        if let Some(id) = host
            && let Some(parent) = self.host.parent(id)
        {
            self.host.remove_child(parent, id)?;
            self.record(|s| s.nodes_removed += 1);
        }
        Ok(())
    }

    /// Host node produced by `node`: its own for text/elements (a fragment's
    /// placeholder included), the rendered subtree's for components.
    pub(crate) fn host_of(&self, node: &ViewNode) -> Option<HostId> {
        match node {
            ViewNode::Text(t) => t.host,
            ViewNode::Element(e) => e.host,
            ViewNode::Component(c) => c
                .instance
                .and_then(|id| self.registry.get(id))
                .and_then(|inst| inst.rendered.as_ref())
                .and_then(|r| self.host_of(r)),
        }
    }

    /// Where to insert in place of `previous`: after its last host node when
    /// it has one under `parent`, else at `fallback`.
    fn anchor_after(
        &self,
        previous: &ViewNode,
        parent: HostId,
        fallback: Option<HostId>,
    ) -> Option<HostId> {
        match self
            .trailing_host(previous)
            .filter(|h| self.host.parent(*h) == Some(parent))
        {
            Some(last) => self.host.next_sibling(last),
            None => fallback,
        }
    }

    /// First host node `node` placed into its parent.
    fn leading_host(&self, node: &ViewNode) -> Option<HostId> {
        match node {
            ViewNode::Text(t) => t.host,
            ViewNode::Element(e) if e.is_fragment() => {
                e.children.iter().find_map(|c| self.leading_host(c))
            }
            ViewNode::Element(e) => e.host,
            ViewNode::Component(c) => c
                .instance
                .and_then(|id| self.registry.get(id))
                .and_then(|inst| inst.rendered.as_ref())
                .and_then(|r| self.leading_host(r)),
        }
    }

    /// Last host node `node` placed into its parent, looking through
    /// fragments and components.
    fn trailing_host(&self, node: &ViewNode) -> Option<HostId> {
        match node {
            ViewNode::Text(t) => t.host,
            ViewNode::Element(e) if e.is_fragment() => {
                e.children.iter().rev().find_map(|c| self.trailing_host(c))
            }
            ViewNode::Element(e) => e.host,
            ViewNode::Component(c) => c
                .instance
                .and_then(|id| self.registry.get(id))
                .and_then(|inst| inst.rendered.as_ref())
                .and_then(|r| self.trailing_host(r)),
        }
    }
}

impl<H: Host + 'static> Rerender for RefCell<Engine<H>> {
    fn is_busy(&self) -> bool {
        self.try_borrow_mut().is_err()
    }

    fn is_live(&self, instance: InstanceId) -> bool {
        self.try_borrow()
            .is_ok_and(|engine| engine.registry.contains(instance))
    }

    fn rerender(&self, instance: InstanceId) -> Result<()> {
        let mut engine = self
            .try_borrow_mut()
            .map_err(|_| Error::ReentrantUpdate(instance))?;
        engine.rerender(instance)
    }
}
