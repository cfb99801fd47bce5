//! Shared scheduling state between the renderer and the hook setters.
//!
//! Setters and dispatchers outlive the render pass that created them, so the
//! scheduler lives behind a shared cell rather than on the renderer. An
//! enqueue outside a batch arms the embedder-supplied wake callback once;
//! the embedder responds by calling the renderer's flush on its own cadence
//! (an animation frame, an event-loop tick, or immediately in tests).

use crate::effects::EffectSlot;
use crate::fiber::{CompFlags, ComponentCell, FiberId};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Default bound on same-component re-render passes within one flush.
pub const DEFAULT_RETRY_LIMIT: u32 = 25;

pub(crate) struct SchedulerState {
    /// Components awaiting a re-render, unordered; the flush sorts by depth.
    pending: Vec<(FiberId, Rc<ComponentCell>)>,
    /// Effect slots awaiting the deferred flush, in schedule order.
    deferred: VecDeque<Rc<RefCell<EffectSlot>>>,
    /// Effect slots awaiting the layout flush at the end of the current
    /// commit.
    layout: Vec<Rc<RefCell<EffectSlot>>>,
    /// Embedder callback invoked when work becomes pending outside a batch.
    wake: Option<Rc<dyn Fn()>>,
    /// Set between arming the wake and the next flush, so a burst of
    /// enqueues wakes the embedder once.
    wake_armed: bool,
    /// Non-zero while inside `act`; suppresses the wake callback.
    batch_depth: u32,
    /// Bound on same-component re-render passes within one flush.
    pub(crate) retry_limit: u32,
}

impl SchedulerState {
    pub(crate) fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            pending: Vec::new(),
            deferred: VecDeque::new(),
            layout: Vec::new(),
            wake: None,
            wake_armed: false,
            batch_depth: 0,
            retry_limit: DEFAULT_RETRY_LIMIT,
        }))
    }

    pub(crate) fn set_wake(&mut self, wake: Option<Rc<dyn Fn()>>) {
        self.wake = wake;
        self.wake_armed = false;
    }

    /// Request a re-render of `fiber`. Duplicate requests while the
    /// component is already dirty are dropped; requests arriving mid-render
    /// only mark the component for another pass; requests for unmounted
    /// components are dropped.
    pub(crate) fn enqueue(shared: &Rc<RefCell<Self>>, fiber: FiberId, cell: &Rc<ComponentCell>) {
        let wake = {
            let mut state = shared.borrow_mut();
            if cell.contains(CompFlags::DIRTY) {
                return;
            }
            if cell.contains(CompFlags::RENDERING) {
                cell.set(CompFlags::DIRTY, true);
                return;
            }
            if !cell.contains(CompFlags::MOUNTED) {
                log::trace!("[SCHED] drop enqueue for unmounted {fiber:?}");
                return;
            }
            cell.set(CompFlags::DIRTY, true);
            state.pending.push((fiber, cell.clone()));
            log::trace!("[SCHED] enqueue {fiber:?} depth={}", cell.depth());
            if state.batch_depth == 0 && !state.wake_armed && state.wake.is_some() {
                state.wake_armed = true;
                state.wake.clone()
            } else {
                None
            }
        };
        // The borrow is released before the callback runs; the embedder may
        // re-enter the scheduler from it.
        if let Some(wake) = wake {
            wake();
        }
    }

    /// Take the pending component set, sorted shallowest-first so parents
    /// render before the children they might replace.
    pub(crate) fn take_pending(&mut self) -> Vec<(FiberId, Rc<ComponentCell>)> {
        self.wake_armed = false;
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(|(_, cell)| cell.depth());
        pending
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn push_deferred(&mut self, slot: Rc<RefCell<EffectSlot>>) {
        self.deferred.push_back(slot);
    }

    pub(crate) fn push_layout(&mut self, slot: Rc<RefCell<EffectSlot>>) {
        self.layout.push(slot);
    }

    pub(crate) fn pop_deferred(&mut self) -> Option<Rc<RefCell<EffectSlot>>> {
        self.deferred.pop_front()
    }

    pub(crate) fn take_layout(&mut self) -> Vec<Rc<RefCell<EffectSlot>>> {
        std::mem::take(&mut self.layout)
    }

    pub(crate) fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    pub(crate) fn enter_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Returns whether this was the outermost batch.
    pub(crate) fn exit_batch(&mut self) -> bool {
        debug_assert!(self.batch_depth > 0, "unbalanced batch exit");
        self.batch_depth -= 1;
        self.batch_depth == 0
    }
}
