use std::cell::RefCell;
use std::rc::Rc;

use web_time::Duration;

use crate::error::{Error, Result};
use crate::host::{Event, EventSource, Host, HostId};
use crate::reconcile::Engine;
use crate::registry::InstanceId;
use crate::view::ViewNode;

#[derive(Clone, Debug)]
pub struct Options {
    /// Count host work into [`PatchStats`].
    pub collect_stats: bool,
    /// Log a warning when siblings share an explicit key.
    pub warn_on_duplicate_keys: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            collect_stats: true,
            warn_on_duplicate_keys: true,
        }
    }
}

/// Running totals since the renderer was created (or `reset_stats`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatchStats {
    /// Top-level `patch` / `render` / `unmount_root` calls.
    pub passes: u64,
    /// Re-renders triggered by setters.
    pub state_renders: u64,
    pub nodes_created: u64,
    pub nodes_removed: u64,
    pub text_updates: u64,
    pub props_written: u64,
    pub components_rendered: u64,
    pub last_pass: Duration,
}

/// Owns a host, the instance registry and the trees mounted into it.
///
/// Setters created during a render hold a weak handle to the same engine and
/// re-enter it synchronously. The plain read accessors (`stats`,
/// `instance_count`, `is_live`, `host_of`) panic when called from inside a
/// render.
pub struct Renderer<H: Host + 'static> {
    engine: Rc<RefCell<Engine<H>>>,
}

impl<H: Host + 'static> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self::with_options(host, Options::default())
    }

    pub fn with_options(host: H, options: Options) -> Self {
        let engine =
            Rc::new_cyclic(|this| RefCell::new(Engine::new(host, options, this.clone())));
        Self { engine }
    }

    fn engine(&self) -> Result<std::cell::RefMut<'_, Engine<H>>> {
        self.engine
            .try_borrow_mut()
            .map_err(|_| Error::RenderInProgress)
    }

    /// Brings the host from `previous` to `next`.
    ///
    /// `previous: None` mounts `next` under `parent`; `next: None` unmounts
    /// `previous`. `next` is annotated in place (host links, instance
    /// handles) and must be passed back as `previous` on the following call.
    /// Returns the host node `next` now maps to.
    pub fn patch(
        &self,
        previous: Option<ViewNode>,
        next: Option<&mut ViewNode>,
        parent: Option<HostId>,
    ) -> Result<Option<HostId>> {
        self.engine()?.run_pass(previous, next, parent)
    }

    /// Renders `tree` into `target`, diffing against whatever was rendered
    /// there before. A first render clears the target's existing children;
    /// `None` unmounts.
    pub fn render(&self, tree: Option<ViewNode>, target: HostId) -> Result<()> {
        let mut engine = self.engine()?;
        if !engine.host.contains(target) {
            return Err(Error::MissingTarget);
        }
        let previous = engine.roots.remove(&target);

        let Some(mut tree) = tree else {
            engine.run_pass(previous, None, Some(target))?;
            return Ok(());
        };

        if previous.is_none() {
            for child in engine.host.children(target) {
                engine.host.remove_child(target, child)?;
            }
        }
        let result = engine.run_pass(previous, Some(&mut tree), Some(target));
        engine.roots.insert(target, tree);
        result.map(|_| ())
    }

    pub fn unmount_root(&self, target: HostId) -> Result<()> {
        let mut engine = self.engine()?;
        if let Some(previous) = engine.roots.remove(&target) {
            engine.run_pass(Some(previous), None, Some(target))?;
        }
        Ok(())
    }

    /// Calls every listener for `event.name` on `node` and returns how many
    /// ran. The engine is not borrowed while handlers run, so they may call
    /// setters.
    pub fn dispatch(&self, node: HostId, event: &Event) -> Result<usize>
    where
        H: EventSource,
    {
        let listeners = self.with_host(|host| host.listeners(node, &event.name))?;
        for listener in &listeners {
            listener.call(event);
        }
        Ok(listeners.len())
    }

    /// Host node a (mounted) view node maps to; for components, the node
    /// produced by their rendered subtree.
    pub fn host_of(&self, node: &ViewNode) -> Option<HostId> {
        self.engine.borrow().host_of(node)
    }

    /// Fails with [`Error::RenderInProgress`] inside a component body or ref
    /// callback.
    pub fn with_host<R>(&self, f: impl FnOnce(&H) -> R) -> Result<R> {
        let engine = self
            .engine
            .try_borrow()
            .map_err(|_| Error::RenderInProgress)?;
        Ok(f(&engine.host))
    }

    pub fn with_host_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> Result<R> {
        Ok(f(&mut self.engine()?.host))
    }

    pub fn stats(&self) -> PatchStats {
        self.engine.borrow().stats.clone()
    }

    pub fn reset_stats(&self) {
        self.engine.borrow_mut().stats = PatchStats::default();
    }

    pub fn instance_count(&self) -> usize {
        self.engine.borrow().registry.len()
    }

    pub fn is_live(&self, instance: InstanceId) -> bool {
        self.engine.borrow().registry.contains(instance)
    }

    /// One line per live instance: identity, render count, hook slots.
    #[cfg(feature = "inspector")]
    pub fn describe_instances(&self) -> Vec<String> {
        let engine = self.engine.borrow();
        let mut lines: Vec<String> = engine
            .registry
            .iter()
            .map(|(_, inst)| {
                format!(
                    "{} renders={} hooks={} parent={}",
                    inst.key(),
                    inst.render_count(),
                    inst.hook_count(),
                    inst.parent().map_or("-".to_string(), |p| p.to_string())
                )
            })
            .collect();
        lines.sort();
        lines
    }
}
