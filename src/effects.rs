//! Effect slots and the two flush disciplines.
//!
//! An effect hook owns one [`EffectSlot`] for the lifetime of its fiber. A
//! render pass that observes changed deps stores the effect closure in the
//! slot and queues the slot; re-rendering before the flush replaces the
//! stored closure without queuing the slot twice, so at most one run happens
//! per flush and it uses the latest captures.
//!
//! Deferred effects flush one at a time, each running its previous cleanup
//! immediately before the new closure. Layout effects flush as a batch: every
//! pending cleanup runs before any new closure, so a layout effect reading
//! shared host state never observes a half-updated sibling.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// The teardown returned by an effect closure.
pub struct Cleanup(Option<Box<dyn FnOnce()>>);

impl Cleanup {
    /// No teardown.
    pub fn none() -> Self {
        Self(None)
    }

    /// Run `f` before the next execution of the effect and on unmount.
    pub fn run(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    fn into_inner(self) -> Option<Box<dyn FnOnce()>> {
        self.0
    }
}

pub(crate) struct EffectSlot {
    /// Deps observed by the most recent render.
    pub(crate) deps: Option<Box<dyn Any>>,
    /// Teardown from the last executed run.
    cleanup: Option<Box<dyn FnOnce()>>,
    /// Closure awaiting execution; replaced by re-renders before the flush.
    pending: Option<Box<dyn FnOnce() -> Cleanup>>,
    /// Cleared on unmount; inactive slots drop their pending closure.
    active: bool,
}

impl EffectSlot {
    pub(crate) fn new() -> Self {
        Self {
            deps: None,
            cleanup: None,
            pending: None,
            active: true,
        }
    }

    /// Store a closure for the next flush. Returns whether the slot needs to
    /// be queued (false when a run was already pending).
    pub(crate) fn schedule(&mut self, run: Box<dyn FnOnce() -> Cleanup>) -> bool {
        let needs_queue = self.pending.is_none();
        self.pending = Some(run);
        needs_queue
    }

    /// Deactivate the slot and run its teardown. Called once on unmount.
    pub(crate) fn teardown(slot: &Rc<RefCell<Self>>) {
        let cleanup = {
            let mut slot = slot.borrow_mut();
            slot.active = false;
            slot.pending = None;
            slot.cleanup.take()
        };
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }
}

/// Run one queued slot: previous cleanup first, then the pending closure.
/// Slot borrows are released before either closure runs, so effects may
/// freely schedule further work.
pub(crate) fn run_deferred(slot: &Rc<RefCell<EffectSlot>>) {
    let (pending, cleanup) = {
        let mut slot = slot.borrow_mut();
        if !slot.active {
            return;
        }
        match slot.pending.take() {
            Some(pending) => (pending, slot.cleanup.take()),
            None => return,
        }
    };
    if let Some(cleanup) = cleanup {
        cleanup();
    }
    let next_cleanup = pending().into_inner();
    let mut slot = slot.borrow_mut();
    if slot.active {
        slot.cleanup = next_cleanup;
    } else if let Some(cleanup) = next_cleanup {
        // Unmounted while the effect ran; tear down immediately.
        drop(slot);
        cleanup();
    }
}

/// Run a batch of queued slots with the layout discipline: all cleanups,
/// then all effects, preserving queue order within each phase.
pub(crate) fn run_layout_batch(slots: Vec<Rc<RefCell<EffectSlot>>>) {
    let mut runs: Vec<(Rc<RefCell<EffectSlot>>, Box<dyn FnOnce() -> Cleanup>)> =
        Vec::with_capacity(slots.len());
    for slot in slots {
        let (pending, cleanup) = {
            let mut borrowed = slot.borrow_mut();
            if !borrowed.active {
                continue;
            }
            match borrowed.pending.take() {
                Some(pending) => (pending, borrowed.cleanup.take()),
                None => continue,
            }
        };
        if let Some(cleanup) = cleanup {
            cleanup();
        }
        runs.push((slot, pending));
    }
    for (slot, pending) in runs {
        let next_cleanup = pending().into_inner();
        let mut borrowed = slot.borrow_mut();
        if borrowed.active {
            borrowed.cleanup = next_cleanup;
        } else if let Some(cleanup) = next_cleanup {
            drop(borrowed);
            cleanup();
        }
    }
}
