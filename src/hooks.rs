//! Ordered hook slots and the per-render hook context.
//!
//! Hook state is addressed positionally: the Nth hook call in a render reads
//! and writes the Nth slot created by the first render. Conditional hook
//! calls therefore corrupt the slot mapping; slot kind and value types are
//! checked on every access and a mismatch panics rather than silently
//! reading another hook's state.

use crate::context::Context;
use crate::effects::{Cleanup, EffectSlot};
use crate::element::EventHandler;
use crate::fiber::{ComponentCell, FiberId, FiberTree};
use crate::host::Host;
use crate::scheduler::SchedulerState;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// Hook-slot storage for one component fiber.
#[derive(Default)]
pub(crate) struct HookState {
    slots: Vec<HookSlot>,
    cursor: usize,
}

enum HookSlot {
    State {
        /// `Rc<RefCell<T>>` behind `dyn Any`.
        cell: Rc<dyn Any>,
        /// The typed setter handed out on the first render; identity is
        /// stable for the fiber's lifetime.
        setter: Rc<dyn Any>,
    },
    Memo {
        deps: Box<dyn Any>,
        value: Rc<dyn Any>,
    },
    Effect {
        layout: bool,
        slot: Rc<RefCell<EffectSlot>>,
    },
}

impl HookState {
    pub(crate) fn begin(&mut self) {
        self.cursor = 0;
    }

    pub(crate) fn finish(&self) {
        debug_assert_eq!(
            self.cursor,
            self.slots.len(),
            "fewer hooks called than in the previous render"
        );
    }

    fn advance(&mut self) -> usize {
        let index = self.cursor;
        self.cursor += 1;
        index
    }

    /// Tear down every effect slot. Called once when the owning fiber
    /// unmounts.
    pub(crate) fn teardown_effects(&self) {
        for slot in &self.slots {
            if let HookSlot::Effect { slot, .. } = slot {
                EffectSlot::teardown(slot);
            }
        }
    }
}

/// Setter half of [`Cx::use_state`]. Cloneable, callable from anywhere; a
/// set after the component unmounts is silently dropped by the scheduler.
pub struct UseState<T> {
    cell: Rc<RefCell<T>>,
    comp: Rc<ComponentCell>,
    shared: Rc<RefCell<SchedulerState>>,
    fiber: FiberId,
}

impl<T: PartialEq + 'static> UseState<T> {
    /// Replace the state. Setting a value equal to the current one is a
    /// no-op and schedules nothing.
    pub fn set(&self, value: T) {
        let changed = {
            let mut current = self.cell.borrow_mut();
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        };
        if changed {
            SchedulerState::enqueue(&self.shared, self.fiber, &self.comp);
        }
    }

    /// Replace the state with a function of the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = {
            let current = self.cell.borrow();
            f(&current)
        };
        self.set(next);
    }
}

impl<T: Clone> UseState<T> {
    /// Read the current value outside a render.
    pub fn get(&self) -> T {
        self.cell.borrow().clone()
    }
}

impl<T> Clone for UseState<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            comp: self.comp.clone(),
            shared: self.shared.clone(),
            fiber: self.fiber,
        }
    }
}

/// Dispatcher half of [`Cx::use_reducer`].
pub struct Dispatch<A>(Rc<dyn Fn(A)>);

impl<A> Dispatch<A> {
    /// Feed an action through the reducer. A reduction yielding a state
    /// equal to the current one schedules nothing.
    pub fn call(&self, action: A) {
        (self.0)(action);
    }
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// The hook context passed to a component render function.
///
/// Hook methods must be called unconditionally and in the same order on
/// every render of the component.
pub struct Cx<'a, H: Host> {
    pub(crate) fiber: FiberId,
    pub(crate) hooks: &'a mut HookState,
    pub(crate) cell: Rc<ComponentCell>,
    pub(crate) shared: Rc<RefCell<SchedulerState>>,
    pub(crate) tree: &'a mut FiberTree<H>,
}

impl<H: Host> Cx<'_, H> {
    /// Component-local state. `init` runs only on the first render. The
    /// returned setter has stable identity across renders.
    pub fn use_state<T: Clone + PartialEq + 'static>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> (T, UseState<T>) {
        let index = self.hooks.advance();
        if index == self.hooks.slots.len() {
            let cell = Rc::new(RefCell::new(init()));
            let setter = UseState {
                cell: cell.clone(),
                comp: self.cell.clone(),
                shared: self.shared.clone(),
                fiber: self.fiber,
            };
            self.hooks.slots.push(HookSlot::State {
                cell: cell.clone() as Rc<dyn Any>,
                setter: Rc::new(setter.clone()) as Rc<dyn Any>,
            });
            let value = cell.borrow().clone();
            return (value, setter);
        }
        match &self.hooks.slots[index] {
            HookSlot::State { cell, setter } => {
                let cell = cell
                    .clone()
                    .downcast::<RefCell<T>>()
                    .unwrap_or_else(|_| panic!("state type changed between renders"));
                let setter = setter
                    .clone()
                    .downcast::<UseState<T>>()
                    .unwrap_or_else(|_| panic!("state type changed between renders"));
                let value = cell.borrow().clone();
                (value, (*setter).clone())
            }
            _ => panic!("hook order changed between renders"),
        }
    }

    /// Reducer-driven state. The dispatcher has stable identity across
    /// renders; `reducer` is captured once on the first render.
    pub fn use_reducer<S, A>(
        &mut self,
        reducer: impl Fn(&S, A) -> S + 'static,
        init: impl FnOnce() -> S,
    ) -> (S, Dispatch<A>)
    where
        S: Clone + PartialEq + 'static,
        A: 'static,
    {
        let index = self.hooks.advance();
        if index == self.hooks.slots.len() {
            let cell = Rc::new(RefCell::new(init()));
            let dispatch = {
                let cell = cell.clone();
                let comp = self.cell.clone();
                let shared = self.shared.clone();
                let fiber = self.fiber;
                Dispatch(Rc::new(move |action: A| {
                    let changed = {
                        let mut current = cell.borrow_mut();
                        let next = reducer(&current, action);
                        if *current == next {
                            false
                        } else {
                            *current = next;
                            true
                        }
                    };
                    if changed {
                        SchedulerState::enqueue(&shared, fiber, &comp);
                    }
                }))
            };
            self.hooks.slots.push(HookSlot::State {
                cell: cell.clone() as Rc<dyn Any>,
                setter: Rc::new(dispatch.clone()) as Rc<dyn Any>,
            });
            let value = cell.borrow().clone();
            return (value, dispatch);
        }
        match &self.hooks.slots[index] {
            HookSlot::State { cell, setter } => {
                let cell = cell
                    .clone()
                    .downcast::<RefCell<S>>()
                    .unwrap_or_else(|_| panic!("reducer state type changed between renders"));
                let dispatch = setter
                    .clone()
                    .downcast::<Dispatch<A>>()
                    .unwrap_or_else(|_| panic!("reducer action type changed between renders"));
                let value = cell.borrow().clone();
                (value, (*dispatch).clone())
            }
            _ => panic!("hook order changed between renders"),
        }
    }

    /// Memoized value: `factory` reruns only when `deps` differ from the
    /// previous render's deps (or the deps type changed).
    pub fn use_memo<D, T>(&mut self, deps: D, factory: impl FnOnce() -> T) -> Rc<T>
    where
        D: PartialEq + 'static,
        T: 'static,
    {
        let index = self.hooks.advance();
        if index == self.hooks.slots.len() {
            let value = Rc::new(factory());
            self.hooks.slots.push(HookSlot::Memo {
                deps: Box::new(deps),
                value: value.clone() as Rc<dyn Any>,
            });
            return value;
        }
        match &mut self.hooks.slots[index] {
            HookSlot::Memo { deps: stored, value } => {
                let unchanged = stored
                    .downcast_ref::<D>()
                    .is_some_and(|stored| *stored == deps);
                if unchanged {
                    value
                        .clone()
                        .downcast::<T>()
                        .unwrap_or_else(|_| panic!("memo value type changed between renders"))
                } else {
                    let next = Rc::new(factory());
                    *stored = Box::new(deps);
                    *value = next.clone() as Rc<dyn Any>;
                    next
                }
            }
            _ => panic!("hook order changed between renders"),
        }
    }

    /// Memoized event handler; the returned handler keeps its identity while
    /// `deps` are unchanged, so attribute diffing skips re-registration.
    pub fn use_callback<D: PartialEq + 'static>(
        &mut self,
        deps: D,
        f: impl Fn(&H::Event) + 'static,
    ) -> EventHandler<H> {
        (*self.use_memo(deps, || EventHandler::new(f))).clone()
    }

    /// A mutable cell with stable identity for the fiber's lifetime.
    /// Writing it schedules nothing.
    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
        self.use_memo((), || RefCell::new(init()))
    }

    /// Deferred effect: runs after the commit settles, when `deps` differ
    /// from the previous render's. Unit deps run the effect once per mount.
    pub fn use_effect<D: PartialEq + 'static>(
        &mut self,
        deps: D,
        effect: impl FnOnce() -> Cleanup + 'static,
    ) {
        self.effect_impl(false, deps, effect);
    }

    /// Layout effect: runs synchronously at the end of the current commit,
    /// batched with other layout effects (all cleanups, then all effects).
    pub fn use_layout_effect<D: PartialEq + 'static>(
        &mut self,
        deps: D,
        effect: impl FnOnce() -> Cleanup + 'static,
    ) {
        self.effect_impl(true, deps, effect);
    }

    fn effect_impl<D: PartialEq + 'static>(
        &mut self,
        layout: bool,
        deps: D,
        effect: impl FnOnce() -> Cleanup + 'static,
    ) {
        let index = self.hooks.advance();
        if index == self.hooks.slots.len() {
            self.hooks.slots.push(HookSlot::Effect {
                layout,
                slot: Rc::new(RefCell::new(EffectSlot::new())),
            });
        }
        let slot = match &self.hooks.slots[index] {
            HookSlot::Effect {
                layout: stored,
                slot,
            } => {
                debug_assert_eq!(*stored, layout, "effect timing changed between renders");
                slot.clone()
            }
            _ => panic!("hook order changed between renders"),
        };
        let changed = {
            let slot = slot.borrow();
            match &slot.deps {
                Some(stored) => !stored
                    .downcast_ref::<D>()
                    .is_some_and(|stored| *stored == deps),
                None => true,
            }
        };
        if !changed {
            return;
        }
        let needs_queue = {
            let mut slot = slot.borrow_mut();
            slot.deps = Some(Box::new(deps));
            slot.schedule(Box::new(effect))
        };
        if needs_queue {
            let mut shared = self.shared.borrow_mut();
            if layout {
                shared.push_layout(slot);
            } else {
                shared.push_deferred(slot);
            }
        }
    }

    /// Read the nearest provided value for `context`, or its default. The
    /// component re-renders when the provider's value identity changes,
    /// even across memoized ancestors.
    pub fn use_context<T: 'static>(&mut self, context: &Context<T>) -> Rc<T> {
        match self.tree.resolve_context(self.fiber, context.id()) {
            Some(value) => value
                .downcast::<T>()
                .unwrap_or_else(|_| panic!("context value type mismatch")),
            None => context.default_value(),
        }
    }
}
