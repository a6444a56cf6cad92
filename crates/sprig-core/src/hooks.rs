//! # Hooks
//!
//! Component functions get a [`RenderCx`] for the duration of one call.
//! Hooks are methods on it, so they cannot be reached outside a render.
//!
//! ```rust
//! use sprig_core::*;
//!
//! #[allow(non_snake_case)]
//! fn Counter(cx: &mut RenderCx<'_>, _props: &Props) -> ViewNode {
//!     let (count, set_count) = cx.use_value(0);
//!     h(
//!         "button",
//!         Props::new().on("click", move |_| {
//!             if let Err(err) = set_count.update(|c| c + 1) {
//!                 log::error!("increment failed: {err}");
//!             }
//!         }),
//!         children![format!("Count: {count}")],
//!     )
//! }
//! ```
//!
//! Slots are order based: the Nth `use_value*` call in a render always
//! refers to the Nth slot of the instance. Calling hooks conditionally breaks
//! that pairing; when a slot turns out to hold a different type it is
//! re-initialised and a warning is logged.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::error::Error;
use crate::registry::InstanceId;

pub(crate) type HookSlots = SmallVec<[Box<dyn Any>; 4]>;

/// Back-channel from setters into the renderer that owns the instance.
pub(crate) trait Rerender {
    /// A render or patch is on the call stack.
    fn is_busy(&self) -> bool;
    fn is_live(&self, instance: InstanceId) -> bool;
    fn rerender(&self, instance: InstanceId) -> Result<(), Error>;
}

/// Render context for one component invocation.
pub struct RenderCx<'a> {
    instance: InstanceId,
    slots: &'a mut HookSlots,
    cursor: usize,
    renderer: Weak<dyn Rerender>,
}

impl<'a> RenderCx<'a> {
    pub(crate) fn new(
        instance: InstanceId,
        slots: &'a mut HookSlots,
        renderer: Weak<dyn Rerender>,
    ) -> Self {
        Self {
            instance,
            slots,
            cursor: 0,
            renderer,
        }
    }

    /// Instance being rendered.
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Number of hook calls made so far in this render.
    pub fn hook_index(&self) -> usize {
        self.cursor
    }

    /// State slot. Returns the current value and a setter; `initial` is only
    /// used the first time this slot is reached.
    pub fn use_value<T>(&mut self, initial: T) -> (T, SetValue<T>)
    where
        T: Clone + PartialEq + 'static,
    {
        self.use_value_with(|| initial)
    }

    /// Like [`use_value`](Self::use_value) with a lazily computed initial value.
    pub fn use_value_with<T>(&mut self, init: impl FnOnce() -> T) -> (T, SetValue<T>)
    where
        T: Clone + PartialEq + 'static,
    {
        let cursor = self.cursor;
        self.cursor += 1;

        let cell = if cursor >= self.slots.len() {
            let cell = Rc::new(RefCell::new(init()));
            self.slots.push(Box::new(cell.clone()));
            cell
        } else if let Some(cell) = self.slots[cursor].downcast_ref::<Rc<RefCell<T>>>() {
            cell.clone()
        } else {
            log::warn!(
                "use_value: slot {} of {:?} changed type; re-initialising. \
                 Hooks must be called in the same order on every render.",
                cursor,
                self.instance
            );
            let cell = Rc::new(RefCell::new(init()));
            self.slots[cursor] = Box::new(cell.clone());
            cell
        };

        let value = cell.borrow().clone();
        (
            value,
            SetValue {
                cell,
                instance: self.instance,
                renderer: self.renderer.clone(),
            },
        )
    }
}

impl fmt::Debug for RenderCx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCx")
            .field("instance", &self.instance)
            .field("cursor", &self.cursor)
            .field("slots", &self.slots.len())
            .finish()
    }
}

/// Setter returned by [`RenderCx::use_value`].
///
/// A change re-renders the owning component synchronously, before the call
/// returns. Setting a value equal to the current one does nothing.
pub struct SetValue<T> {
    cell: Rc<RefCell<T>>,
    instance: InstanceId,
    renderer: Weak<dyn Rerender>,
}

impl<T> Clone for SetValue<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            instance: self.instance,
            renderer: self.renderer.clone(),
        }
    }
}

impl<T: PartialEq + 'static> SetValue<T> {
    pub fn set(&self, value: T) -> Result<(), Error> {
        self.update(move |_| value)
    }

    /// Computes the next value from the current one.
    ///
    /// Fails with [`Error::ReentrantUpdate`] while a render is in progress
    /// and with [`Error::InvalidContext`] once the instance is unmounted; in
    /// both cases nothing is stored.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<(), Error> {
        let Some(renderer) = self.renderer.upgrade() else {
            return Err(Error::InvalidContext(self.instance));
        };
        if renderer.is_busy() {
            return Err(Error::ReentrantUpdate(self.instance));
        }
        if !renderer.is_live(self.instance) {
            log::warn!("state update for unmounted instance {:?}", self.instance);
            return Err(Error::InvalidContext(self.instance));
        }

        let next = f(&self.cell.borrow());
        if *self.cell.borrow() == next {
            log::trace!("state of {:?} unchanged; skipping render", self.instance);
            return Ok(());
        }
        *self.cell.borrow_mut() = next;
        renderer.rerender(self.instance)
    }

    /// Current value of the slot (not the value captured at render time).
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.cell.borrow().clone()
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }
}

impl<T> fmt::Debug for SetValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetValue")
            .field("instance", &self.instance)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    struct Idle;

    impl Rerender for Idle {
        fn is_busy(&self) -> bool {
            false
        }
        fn is_live(&self, _instance: InstanceId) -> bool {
            true
        }
        fn rerender(&self, _instance: InstanceId) -> Result<(), Error> {
            Ok(())
        }
    }

    fn id() -> InstanceId {
        InstanceId::from(KeyData::from_ffi(1))
    }

    #[test]
    fn slots_persist_by_call_order() {
        let mut slots = HookSlots::new();
        let renderer: Rc<dyn Rerender> = Rc::new(Idle);

        {
            let mut cx = RenderCx::new(id(), &mut slots, Rc::downgrade(&renderer));
            let (a, set_a) = cx.use_value(1);
            let (b, _) = cx.use_value("x".to_string());
            assert_eq!((a, b.as_str()), (1, "x"));
            set_a.set(5).unwrap();
        }

        let mut cx = RenderCx::new(id(), &mut slots, Rc::downgrade(&renderer));
        let (a, _) = cx.use_value(1);
        let (b, _) = cx.use_value("y".to_string());
        assert_eq!(a, 5);
        assert_eq!(b, "x");
        assert_eq!(cx.hook_index(), 2);
    }

    #[test]
    fn changed_slot_type_is_reinitialised() {
        let mut slots = HookSlots::new();
        let renderer: Rc<dyn Rerender> = Rc::new(Idle);
        {
            let mut cx = RenderCx::new(id(), &mut slots, Rc::downgrade(&renderer));
            cx.use_value(1u8);
        }
        let mut cx = RenderCx::new(id(), &mut slots, Rc::downgrade(&renderer));
        let (v, _) = cx.use_value_with(|| "fresh".to_string());
        assert_eq!(v, "fresh");
    }

    #[test]
    fn setter_without_renderer_is_invalid() {
        let mut slots = HookSlots::new();
        let setter = {
            let renderer: Rc<dyn Rerender> = Rc::new(Idle);
            let mut cx = RenderCx::new(id(), &mut slots, Rc::downgrade(&renderer));
            cx.use_value(0).1
        };
        assert!(matches!(setter.set(1), Err(Error::InvalidContext(_))));
        assert_eq!(setter.get(), 0);
    }
}
