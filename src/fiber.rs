//! The persistent fiber tree and its structural operations.
//!
//! One fiber exists per rendered output unit (element, text node, component
//! invocation, fragment, template instantiation). Fibers are stored in a
//! slotmap arena; `parent`/`child`/`next` links are arena keys forming an
//! intrusive singly-linked sibling list, so single-item insert, removal and
//! reordering are pointer rewrites rather than array splices. Component-only
//! state (hook slots, provider holders, context subscriptions) lives in
//! secondary maps keyed by fiber id.
//!
//! Structural operations assert their linkage preconditions in debug builds
//! only; release builds trust the caller and a violation corrupts the tree
//! silently rather than panicking.

use crate::element::{Ref, VNode};
use crate::hooks::HookState;
use crate::host::Host;
use crate::identity::VKey;
use bitflags::bitflags;
use rustc_hash::FxHashMap;
use slotmap::{SecondaryMap, SlotMap};
use smallvec::SmallVec;
use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

slotmap::new_key_type! {
    /// Stable handle to one fiber in the arena.
    pub struct FiberId;
}

bitflags! {
    /// Per-component scheduling flags.
    ///
    /// These live in a shared cell (not on the fiber itself) so state setters
    /// and dispatchers created during a render can reach them without access
    /// to the tree.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CompFlags: u8 {
        /// A re-render is pending for this component.
        const DIRTY = 1 << 0;
        /// The component has rendered at least once and has not been
        /// unmounted. Unmounted components are skipped by the flush loop.
        const MOUNTED = 1 << 1;
        /// The component function is currently executing. Enqueues arriving
        /// while set only mark `DIRTY`; the render loop handles the redo.
        const RENDERING = 1 << 2;
    }
}

/// Shared scheduling state for one component fiber.
///
/// Cloned into setters and dispatchers; identity is stable for the fiber's
/// lifetime.
pub(crate) struct ComponentCell {
    flags: Cell<CompFlags>,
    depth: Cell<u32>,
}

impl ComponentCell {
    pub(crate) fn new(depth: u32) -> Rc<Self> {
        Rc::new(Self {
            flags: Cell::new(CompFlags::empty()),
            depth: Cell::new(depth),
        })
    }

    pub(crate) fn contains(&self, flags: CompFlags) -> bool {
        self.flags.get().contains(flags)
    }

    pub(crate) fn set(&self, flags: CompFlags, value: bool) {
        let mut current = self.flags.get();
        current.set(flags, value);
        self.flags.set(current);
    }

    pub(crate) fn depth(&self) -> u32 {
        self.depth.get()
    }
}

/// A fiber: the persistent node shadowing one position in the rendered
/// output tree.
pub struct Fiber<H: Host> {
    /// The descriptor this fiber currently renders; replaced wholesale on
    /// update.
    pub data: VNode<H>,
    /// Reconciliation key; `VKey::None` when absent.
    pub key: VKey,
    /// The host node this fiber directly materializes. `None` for
    /// transparent fibers (components, fragments, providers, consumers,
    /// templates), whose host presence is the union of their descendants'.
    pub dom: Option<H::Node>,
    /// Back reference to the owning fiber; traversal only, never ownership.
    pub parent: Option<FiberId>,
    /// First child in render order.
    pub child: Option<FiberId>,
    /// Following sibling; siblings form a singly-linked list.
    pub next: Option<FiberId>,
    /// Position among siblings, maintained incrementally.
    pub index: u32,
    /// Distance from the render root; used for depth-ordered diff flushes.
    pub depth: u32,
    /// Mount/unmount notification target carried by the descriptor.
    pub host_ref: Option<Ref<H>>,
    /// Scheduling cell for component-like fibers (components, consumers).
    pub(crate) component: Option<Rc<ComponentCell>>,
}

/// The fiber arena plus the per-fiber side tables.
pub struct FiberTree<H: Host> {
    fibers: SlotMap<FiberId, Fiber<H>>,
    /// Ordered hook-slot storage for component fibers.
    pub(crate) hooks: SecondaryMap<FiberId, HookState>,
    /// Context value holders for provider fibers.
    pub(crate) providers: SecondaryMap<FiberId, crate::context::ProviderSlot>,
    /// Provider fibers this fiber is registered with as a consumer.
    pub(crate) subscriptions: SecondaryMap<FiberId, Vec<FiberId>>,
    /// Non-owning host-node-to-fiber association for ancestor lookups.
    node_fibers: FxHashMap<H::Node, FiberId>,
    /// Fibers freed during reconciliation, drained by the embedder.
    removed: Vec<FiberId>,
}

impl<H: Host> Default for FiberTree<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Host> FiberTree<H> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            fibers: SlotMap::with_key(),
            hooks: SecondaryMap::new(),
            providers: SecondaryMap::new(),
            subscriptions: SecondaryMap::new(),
            node_fibers: FxHashMap::default(),
            removed: Vec::new(),
        }
    }

    /// Create a fresh fiber wrapping `data` with all links null.
    pub fn create(&mut self, data: VNode<H>, depth: u32) -> FiberId {
        let key = data.key();
        let id = self.fibers.insert(Fiber {
            data,
            key,
            dom: None,
            parent: None,
            child: None,
            next: None,
            index: 0,
            depth,
            host_ref: None,
            component: None,
        });
        log::trace!("[FIBER] create {id:?} depth={depth}");
        id
    }

    /// Get a fiber by id.
    pub fn get(&self, id: FiberId) -> Option<&Fiber<H>> {
        self.fibers.get(id)
    }

    /// Get a mutable fiber by id.
    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<H>> {
        self.fibers.get_mut(id)
    }

    /// Whether `id` still names a live fiber.
    pub fn contains(&self, id: FiberId) -> bool {
        self.fibers.contains_key(id)
    }

    /// Number of live fibers.
    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    pub(crate) fn fiber(&self, id: FiberId) -> &Fiber<H> {
        &self.fibers[id]
    }

    pub(crate) fn fiber_mut(&mut self, id: FiberId) -> &mut Fiber<H> {
        &mut self.fibers[id]
    }

    /// The live children of `parent`, in render order.
    pub fn children(&self, parent: FiberId) -> SmallVec<[FiberId; 8]> {
        let mut out = SmallVec::new();
        let mut cursor = self.fibers[parent].child;
        while let Some(id) = cursor {
            out.push(id);
            cursor = self.fibers[id].next;
        }
        out
    }

    /// Associate a host node with the fiber that materializes it.
    pub(crate) fn register_node(&mut self, node: H::Node, id: FiberId) {
        self.node_fibers.insert(node, id);
    }

    /// The fiber materializing `node`, if any.
    pub fn fiber_for_node(&self, node: &H::Node) -> Option<FiberId> {
        self.node_fibers.get(node).copied()
    }

    /// Walk the host tree upward from `node` to the nearest host node that
    /// carries a fiber back-reference. Resolves ownership for nested render
    /// roots (a render call targeting a node inside an existing tree).
    pub fn ancestor_fiber(&self, host: &H, node: &H::Node) -> Option<FiberId> {
        let mut cursor = Some(node.clone());
        while let Some(current) = cursor {
            if let Some(id) = self.node_fibers.get(&current) {
                return Some(*id);
            }
            cursor = host.parent_node(&current);
        }
        None
    }

    /// Drain the fibers freed since the last call.
    pub fn take_removed(&mut self) -> Vec<FiberId> {
        std::mem::take(&mut self.removed)
    }

    // === Structural operations ===

    /// Link `fiber` into `parent`'s child chain immediately after `prev`
    /// (or as first child when `prev` is `None`). Does not touch the host
    /// tree. Subsequent sibling indices are shifted up by one.
    pub fn mark(&mut self, fiber: FiberId, parent: FiberId, prev: Option<FiberId>) {
        debug_assert!(
            prev.map_or(true, |p| self.fibers[p].parent == Some(parent)),
            "mark: prev is not a child of parent"
        );
        debug_assert!(
            self.fibers[fiber].parent.is_none(),
            "mark: fiber is already linked"
        );
        self.fibers[fiber].parent = Some(parent);
        match prev {
            Some(prev) => {
                let after = self.fibers[prev].next;
                self.fibers[fiber].next = after;
                self.fibers[fiber].index = self.fibers[prev].index + 1;
                self.fibers[prev].next = Some(fiber);
            }
            None => {
                let after = self.fibers[parent].child;
                self.fibers[fiber].next = after;
                self.fibers[fiber].index = 0;
                self.fibers[parent].child = Some(fiber);
            }
        }
        let after = self.fibers[fiber].next;
        self.increment(after, 1);
        log::trace!("[FIBER] mark {fiber:?} under {parent:?} after {prev:?}");
        self.debug_verify_children(parent);
    }

    /// Walk a sibling chain starting at `start`, adjusting `index` by
    /// `delta`. O(k) in the affected run length.
    pub fn increment(&mut self, start: Option<FiberId>, delta: i32) {
        let mut cursor = start;
        while let Some(id) = cursor {
            let fiber = &mut self.fibers[id];
            fiber.index = (fiber.index as i32 + delta) as u32;
            cursor = fiber.next;
        }
    }

    /// Linear scan of `parent`'s child chain for the fiber immediately
    /// preceding `fiber`. The chain carries no back-pointers by design.
    pub fn previous_fiber(&self, fiber: FiberId, parent: FiberId) -> Option<FiberId> {
        let mut prev = None;
        let mut cursor = self.fibers[parent].child;
        while let Some(id) = cursor {
            if id == fiber {
                return prev;
            }
            prev = Some(id);
            cursor = self.fibers[id].next;
        }
        debug_assert!(false, "previous_fiber: fiber is not a child of parent");
        None
    }

    /// Move an already-linked `fiber` to immediately follow `prev` (or to
    /// the head when `prev` is `None`) without touching the host tree.
    /// Returns whether a move actually occurred. Indices along the shifted
    /// range are recomputed.
    pub fn reorder_after(&mut self, fiber: FiberId, parent: FiberId, prev: Option<FiberId>) -> bool {
        debug_assert_eq!(self.fibers[fiber].parent, Some(parent));
        let in_place = match prev {
            Some(prev) => self.fibers[prev].next == Some(fiber),
            None => self.fibers[parent].child == Some(fiber),
        };
        if in_place {
            return false;
        }

        let old_prev = self.previous_fiber(fiber, parent);
        let after = self.fibers[fiber].next;
        match old_prev {
            Some(old_prev) => self.fibers[old_prev].next = after,
            None => self.fibers[parent].child = after,
        }
        match prev {
            Some(prev) => {
                let next = self.fibers[prev].next;
                self.fibers[fiber].next = next;
                self.fibers[prev].next = Some(fiber);
            }
            None => {
                let head = self.fibers[parent].child;
                self.fibers[fiber].next = head;
                self.fibers[parent].child = Some(fiber);
            }
        }
        self.renumber_children(parent);
        log::trace!("[FIBER] reorder {fiber:?} after {prev:?} under {parent:?}");
        self.debug_verify_children(parent);
        true
    }

    fn renumber_children(&mut self, parent: FiberId) {
        let mut index = 0;
        let mut cursor = self.fibers[parent].child;
        while let Some(id) = cursor {
            let fiber = &mut self.fibers[id];
            fiber.index = index;
            index += 1;
            cursor = fiber.next;
        }
    }

    /// Detach `fiber` from the sibling chain, remove every host node owned
    /// by its subtree from `container`, free the subtree, and return the
    /// fiber that followed it. Subsequent sibling indices are shifted down.
    pub fn remove(
        &mut self,
        host: &mut H,
        fiber: FiberId,
        parent: FiberId,
        prev: Option<FiberId>,
        container: &H::Node,
    ) -> Option<FiberId> {
        debug_assert_eq!(self.fibers[fiber].parent, Some(parent));
        debug_assert!(
            prev.map_or(true, |p| self.fibers[p].next == Some(fiber)),
            "remove: prev does not precede fiber"
        );
        let next = self.fibers[fiber].next;
        match prev {
            Some(prev) => self.fibers[prev].next = next,
            None => self.fibers[parent].child = next,
        }
        self.increment(next, -1);

        let mut tops: SmallVec<[H::Node; 4]> = SmallVec::new();
        self.collect_top_host_nodes(fiber, &mut tops);
        for node in &tops {
            host.remove_child(container, node);
        }
        self.free_subtree(fiber);
        self.debug_verify_children(parent);
        next
    }

    /// Recursively invoke every ref in `fiber`'s subtree with `None`. Host
    /// removal and component-state teardown are the caller's concern.
    pub fn unmount(&self, fiber: FiberId) {
        if let Some(host_ref) = &self.fibers[fiber].host_ref {
            host_ref.notify(None);
        }
        let mut cursor = self.fibers[fiber].child;
        while let Some(id) = cursor {
            self.unmount(id);
            cursor = self.fibers[id].next;
        }
    }

    pub(crate) fn free_subtree(&mut self, fiber: FiberId) {
        let mut stack = vec![fiber];
        while let Some(id) = stack.pop() {
            let mut cursor = self.fibers[id].child;
            while let Some(child) = cursor {
                stack.push(child);
                cursor = self.fibers[child].next;
            }
            if let Some(node) = self.fibers[id].dom.take() {
                self.node_fibers.remove(&node);
            }
            self.hooks.remove(id);
            self.providers.remove(id);
            self.subscriptions.remove(id);
            self.fibers.remove(id);
            self.removed.push(id);
            log::trace!("[FIBER] free {id:?}");
        }
    }

    /// Recursively insert every host node owned by `fiber` and its sibling
    /// chain into `container` before `before`, preserving render order.
    /// Transparent fibers recurse into their children without creating a
    /// host node. Callers mounting a single new fiber invoke this before
    /// linking it, so the chain walk sees only the new range.
    pub fn mount(&self, host: &mut H, fiber: FiberId, container: &H::Node, before: Option<&H::Node>) {
        let mut cursor = Some(fiber);
        while let Some(id) = cursor {
            self.mount_fiber(host, id, container, before);
            cursor = self.fibers[id].next;
        }
    }

    fn mount_fiber(&self, host: &mut H, fiber: FiberId, container: &H::Node, before: Option<&H::Node>) {
        if let Some(node) = &self.fibers[fiber].dom {
            host.insert_before(container, node, before);
        } else if let Some(child) = self.fibers[fiber].child {
            self.mount(host, child, container, before);
        }
    }

    /// Idempotent mount: when `fiber`'s host range already sits immediately
    /// before `before` inside `container`, no host mutation occurs.
    /// Otherwise the fiber's subtree is (re)inserted at that position.
    pub fn insert(&self, host: &mut H, fiber: FiberId, container: &H::Node, before: Option<&H::Node>) {
        if let Some(first) = self.first_host_node(fiber) {
            if host.parent_node(&first).as_ref() == Some(container) {
                let range_next = self
                    .last_host_node(fiber)
                    .and_then(|last| host.next_sibling(&last));
                if range_next.as_ref() == before {
                    return;
                }
            }
        }
        self.mount_fiber(host, fiber, container, before);
    }

    /// The first host node materialized inside `fiber`'s subtree, in
    /// document order.
    pub fn first_host_node(&self, fiber: FiberId) -> Option<H::Node> {
        if let Some(node) = &self.fibers[fiber].dom {
            return Some(node.clone());
        }
        let mut cursor = self.fibers[fiber].child;
        while let Some(id) = cursor {
            if let Some(node) = self.first_host_node(id) {
                return Some(node);
            }
            cursor = self.fibers[id].next;
        }
        None
    }

    fn last_host_node(&self, fiber: FiberId) -> Option<H::Node> {
        let mut tops: SmallVec<[H::Node; 4]> = SmallVec::new();
        self.collect_top_host_nodes(fiber, &mut tops);
        tops.last().cloned()
    }

    /// Collect the top-level host nodes of `fiber`'s subtree: nodes directly
    /// owned by `fiber` or, for transparent fibers, by the nearest owning
    /// descendants. Removing these from their container removes the whole
    /// subtree's host presence.
    pub(crate) fn collect_top_host_nodes(&self, fiber: FiberId, out: &mut SmallVec<[H::Node; 4]>) {
        if let Some(node) = &self.fibers[fiber].dom {
            out.push(node.clone());
            return;
        }
        let mut cursor = self.fibers[fiber].child;
        while let Some(id) = cursor {
            self.collect_top_host_nodes(id, out);
            cursor = self.fibers[id].next;
        }
    }

    /// The host node that is the logical next sibling of `fiber` in the host
    /// tree, walking up through transparent ancestors until an owning
    /// ancestor (the container boundary) is reached. With `skip_self` false,
    /// a host node inside `fiber`'s own subtree counts, yielding the node
    /// currently occupying `fiber`'s position.
    pub fn next_host_sibling(&self, fiber: FiberId, skip_self: bool) -> Option<H::Node> {
        if !skip_self {
            if let Some(node) = self.first_host_node(fiber) {
                return Some(node);
            }
        }
        let mut cursor = fiber;
        loop {
            // Advance to the next sibling, climbing through transparent
            // ancestors when the chain is exhausted.
            loop {
                if let Some(next) = self.fibers[cursor].next {
                    cursor = next;
                    break;
                }
                let parent = self.fibers[cursor].parent?;
                if self.fibers[parent].dom.is_some() {
                    return None;
                }
                cursor = parent;
            }
            if let Some(node) = self.first_host_node(cursor) {
                return Some(node);
            }
        }
    }

    /// The nearest ancestor with a non-null `dom`, or `None` if the fiber is
    /// the document root.
    pub fn container_of(&self, fiber: FiberId) -> Option<H::Node> {
        let mut cursor = self.fibers[fiber].parent;
        while let Some(id) = cursor {
            if let Some(node) = &self.fibers[id].dom {
                return Some(node.clone());
            }
            cursor = self.fibers[id].parent;
        }
        None
    }

    /// The host container that `fiber`'s children mount into: the fiber's
    /// own node when it owns one, else the nearest owning ancestor's.
    pub(crate) fn child_container(&self, fiber: FiberId) -> Option<H::Node> {
        if let Some(node) = &self.fibers[fiber].dom {
            return Some(node.clone());
        }
        self.container_of(fiber)
    }

    /// Resolve the nearest provider for `context_id` above `fiber`,
    /// registering `fiber` as a consumer so a later value change enqueues
    /// it. Returns `None` when no provider is in scope.
    pub(crate) fn resolve_context(
        &mut self,
        fiber: FiberId,
        context_id: crate::context::ContextId,
    ) -> Option<Rc<dyn Any>> {
        let mut found = None;
        let mut cursor = self.fibers[fiber].parent;
        while let Some(id) = cursor {
            if let Some(slot) = self.providers.get(id) {
                if slot.context_id == context_id {
                    found = Some((id, slot.value.clone()));
                    break;
                }
            }
            cursor = self.fibers[id].parent;
        }
        let (provider, value) = found?;
        self.providers[provider].subscribe(fiber);
        match self.subscriptions.get_mut(fiber) {
            Some(subs) => {
                if !subs.contains(&provider) {
                    subs.push(provider);
                }
            }
            None => {
                self.subscriptions.insert(fiber, vec![provider]);
            }
        }
        Some(value)
    }

    #[cfg(debug_assertions)]
    fn debug_verify_children(&self, parent: FiberId) {
        let mut expected = 0;
        let mut cursor = self.fibers[parent].child;
        while let Some(id) = cursor {
            let fiber = &self.fibers[id];
            debug_assert_eq!(
                fiber.index, expected,
                "index drift at {id:?} under {parent:?}"
            );
            debug_assert_eq!(
                fiber.parent,
                Some(parent),
                "parent back-link mismatch at {id:?}"
            );
            expected += 1;
            cursor = fiber.next;
        }
    }

    #[cfg(not(debug_assertions))]
    fn debug_verify_children(&self, _parent: FiberId) {}
}
