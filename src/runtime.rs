//! The renderer: render roots, the flush loop, and batched updates.

use crate::effects;
use crate::element::VNode;
use crate::fiber::{CompFlags, FiberId, FiberTree};
use crate::host::Host;
use crate::scheduler::SchedulerState;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// Counters accumulated across reconciliation passes; drained with
/// [`Renderer::take_stats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Fibers created.
    pub created: usize,
    /// Fibers removed (with their subtrees).
    pub removed: usize,
    /// Fibers moved among their siblings.
    pub moved: usize,
    /// Fibers patched in place.
    pub patched: usize,
    /// Component and consumer render passes executed.
    pub renders: usize,
    /// Component renders skipped by the memo barrier.
    pub memo_skips: usize,
}

/// Drives a fiber tree against one host document.
///
/// Single-threaded by construction: descriptors, hook state and the host all
/// stay on the creating thread. State setters created by hooks may outlive a
/// flush and re-enter the scheduler at any time; the renderer picks the work
/// up on the next [`flush`](Renderer::flush).
pub struct Renderer<H: Host> {
    pub(crate) host: H,
    pub(crate) tree: FiberTree<H>,
    pub(crate) shared: Rc<RefCell<SchedulerState>>,
    /// One root fiber per rendered container node.
    roots: FxHashMap<H::Node, FiberId>,
    pub(crate) stats: ReconcileStats,
}

impl<H: Host> Renderer<H> {
    /// Wrap a host document.
    pub fn new(host: H) -> Self {
        Self {
            host,
            tree: FiberTree::new(),
            shared: SchedulerState::new(),
            roots: FxHashMap::default(),
            stats: ReconcileStats::default(),
        }
    }

    /// The wrapped host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the wrapped host.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The live fiber tree.
    pub fn tree(&self) -> &FiberTree<H> {
        &self.tree
    }

    /// Install the callback invoked when work becomes pending outside a
    /// batch. The embedder responds by calling [`flush`](Renderer::flush)
    /// on its own cadence.
    pub fn set_wake(&mut self, wake: impl Fn() + 'static) {
        self.shared.borrow_mut().set_wake(Some(Rc::new(wake)));
    }

    /// Remove the wake callback.
    pub fn clear_wake(&mut self) {
        self.shared.borrow_mut().set_wake(None);
    }

    /// Override the bound on same-component re-render passes per flush.
    pub fn set_retry_limit(&mut self, limit: u32) {
        self.shared.borrow_mut().retry_limit = limit.max(1);
    }

    /// Drain and reset the reconciliation counters.
    pub fn take_stats(&mut self) -> ReconcileStats {
        std::mem::take(&mut self.stats)
    }

    /// Reconcile `node` into `container`, creating a render root for the
    /// container on first use. Rendering into a node inside an existing tree
    /// nests the new root at the surrounding depth. Outside a batch this
    /// drains all resulting work before returning.
    pub fn render(&mut self, node: VNode<H>, container: &H::Node) {
        let root = self.root_for(container);
        let children = match node {
            VNode::Empty => Vec::new(),
            node => vec![node],
        };
        self.reconcile_children(root, children);
        self.flush_layout();
        if !self.shared.borrow().in_batch() {
            self.flush();
        }
    }

    fn root_for(&mut self, container: &H::Node) -> FiberId {
        if let Some(root) = self.roots.get(container) {
            if self.tree.contains(*root) {
                return *root;
            }
        }
        let depth = self
            .tree
            .ancestor_fiber(&self.host, container)
            .map(|ancestor| self.tree.fiber(ancestor).depth + 1)
            .unwrap_or(0);
        let root = self.tree.create(VNode::Empty, depth);
        self.tree.fiber_mut(root).dom = Some(container.clone());
        self.tree.register_node(container.clone(), root);
        self.roots.insert(container.clone(), root);
        log::trace!("[RENDER] new root {root:?} at depth {depth}");
        root
    }

    /// Tear down the tree rendered into `container`. Returns whether a root
    /// existed there.
    pub fn unmount(&mut self, container: &H::Node) -> bool {
        let Some(root) = self.roots.remove(container) else {
            return false;
        };
        if self.tree.contains(root) {
            self.reconcile_children(root, Vec::new());
            self.tree.free_subtree(root);
        }
        self.flush_layout();
        if !self.shared.borrow().in_batch() {
            self.flush();
        }
        true
    }

    /// Run all pending work to quiescence: dirty components in depth order
    /// (shallowest first), layout effects after each commit wave, then
    /// deferred effects one at a time, looping while effects schedule more
    /// renders.
    pub fn flush(&mut self) {
        loop {
            self.flush_dirty();
            let slot = self.shared.borrow_mut().pop_deferred();
            match slot {
                Some(slot) => effects::run_deferred(&slot),
                None => {
                    if !self.shared.borrow().has_pending() {
                        break;
                    }
                }
            }
        }
    }

    fn flush_dirty(&mut self) {
        loop {
            let pending = self.shared.borrow_mut().take_pending();
            if pending.is_empty() {
                break;
            }
            for (fiber, cell) in pending {
                if !cell.contains(CompFlags::DIRTY) || !cell.contains(CompFlags::MOUNTED) {
                    continue;
                }
                if !self.tree.contains(fiber) {
                    continue;
                }
                self.render_fiber(fiber);
            }
            self.flush_layout();
        }
    }

    pub(crate) fn flush_layout(&mut self) {
        let slots = self.shared.borrow_mut().take_layout();
        if !slots.is_empty() {
            effects::run_layout_batch(slots);
        }
    }

    /// Run `f` with update batching: all renders and effects triggered
    /// inside are deferred to one drain at the end. Batches nest; only the
    /// outermost drains. If `f` panics, pending work is still drained before
    /// the panic resumes, so interleaved assertions see a settled tree.
    pub fn act<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.shared.borrow_mut().enter_batch();
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(self)));
        let outermost = self.shared.borrow_mut().exit_batch();
        if outermost {
            self.flush();
        }
        match result {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

#[cfg(test)]
mod tests;
