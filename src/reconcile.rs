//! Keyed child reconciliation and in-place patching.
//!
//! Matching is two-tier: keyed descriptors match the fiber with the same key
//! anywhere in the old sibling run; unkeyed descriptors match old unkeyed
//! fibers positionally. A matched fiber of a compatible kind is moved and
//! patched in place; an incompatible match is torn down and rebuilt at the
//! position; leftovers are removed. Host mutations are confined to fibers
//! whose observable output actually changed.

use crate::context::ProviderSlot;
use crate::element::{AttrValue, VNode};
use crate::fiber::{CompFlags, ComponentCell, FiberId};
use crate::hooks::Cx;
use crate::host::Host;
use crate::runtime::Renderer;
use crate::scheduler::SchedulerState;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// Clears `RENDERING` when dropped, including during an unwind, so a
/// panicking component is still schedulable once the panic is caught.
struct ClearRendering(Rc<ComponentCell>);

impl Drop for ClearRendering {
    fn drop(&mut self) {
        self.0.set(CompFlags::RENDERING, false);
    }
}

impl<H: Host> Renderer<H> {
    /// Reconcile `parent`'s child fibers against `new_children`.
    pub(crate) fn reconcile_children(&mut self, parent: FiberId, new_children: Vec<VNode<H>>) {
        let existing = self.tree.children(parent);
        let mut keyed: FxHashMap<crate::identity::VKey, VecDeque<FiberId>> = FxHashMap::default();
        let mut unkeyed: VecDeque<FiberId> = VecDeque::new();
        for id in existing {
            let key = self.tree.fiber(id).key.clone();
            if key.is_keyed() {
                keyed.entry(key).or_default().push_back(id);
            } else {
                unkeyed.push_back(id);
            }
        }

        let mut prev: Option<FiberId> = None;
        for new in new_children {
            let key = new.key();
            let candidate = if key.is_keyed() {
                keyed.get_mut(&key).and_then(|queue| queue.pop_front())
            } else {
                unkeyed.pop_front()
            };
            prev = Some(match candidate {
                Some(matched) if self.tree.fiber(matched).data.same_kind(&new) => {
                    if self.tree.reorder_after(matched, parent, prev) {
                        if let Some(container) = self.tree.child_container(parent) {
                            let before = self.tree.next_host_sibling(matched, true);
                            self.tree
                                .insert(&mut self.host, matched, &container, before.as_ref());
                        }
                        self.stats.moved += 1;
                    }
                    self.patch_fiber(matched, new);
                    matched
                }
                Some(stale) => self.replace_fiber(stale, parent, prev, new),
                None => self.create_and_mount(parent, prev, new),
            });
        }

        for (_, queue) in keyed {
            for id in queue {
                self.drop_child(id, parent);
            }
        }
        for id in unkeyed {
            self.drop_child(id, parent);
        }
    }

    /// Create a fiber for `new` linked after `prev`, build its subtree, and
    /// splice its host nodes into place. New subtrees are assembled inside
    /// their own (still detached) host nodes, so the live container sees one
    /// insertion per top-level node.
    fn create_and_mount(&mut self, parent: FiberId, prev: Option<FiberId>, new: VNode<H>) -> FiberId {
        let depth = self.tree.fiber(parent).depth + 1;
        log::trace!("[FIBER_CHILDREN] create {} under {parent:?}", new.kind_name());
        let id = self.tree.create(new, depth);
        self.tree.mark(id, parent, prev);
        self.populate(id);
        if let Some(container) = self.tree.child_container(parent) {
            let before = self.tree.next_host_sibling(id, true);
            self.tree
                .insert(&mut self.host, id, &container, before.as_ref());
        }
        self.stats.created += 1;
        id
    }

    /// Materialize the content of a freshly created fiber: host nodes for
    /// elements and text, child fibers for containers, an initial render for
    /// components and consumers.
    fn populate(&mut self, id: FiberId) {
        let data = self.tree.fiber(id).data.clone();
        let depth = self.tree.fiber(id).depth;
        match data {
            VNode::Element(element) => {
                let node = self.host.create_element(&element.tag);
                self.apply_attrs(&node, &element.attrs);
                self.tree.fiber_mut(id).dom = Some(node.clone());
                self.tree.register_node(node.clone(), id);
                let mut prev = None;
                for child in &element.children {
                    prev = Some(self.create_and_mount(id, prev, child.clone()));
                }
                if let Some(node_ref) = &element.node_ref {
                    self.tree.fiber_mut(id).host_ref = Some(node_ref.clone());
                    node_ref.notify(Some(&node));
                }
            }
            VNode::Text(text) => {
                let node = self.host.create_text(&text);
                self.tree.fiber_mut(id).dom = Some(node.clone());
                self.tree.register_node(node, id);
            }
            VNode::Fragment(fragment) => {
                let mut prev = None;
                for child in &fragment.children {
                    prev = Some(self.create_and_mount(id, prev, child.clone()));
                }
            }
            VNode::Provider(provider) => {
                self.tree
                    .providers
                    .insert(id, ProviderSlot::new(provider.context_id, provider.value.clone()));
                let mut prev = None;
                for child in &provider.children {
                    prev = Some(self.create_and_mount(id, prev, child.clone()));
                }
            }
            VNode::Template(template) => {
                let mut prev = None;
                for child in template.expand() {
                    prev = Some(self.create_and_mount(id, prev, child));
                }
            }
            VNode::Component(_) | VNode::Consumer(_) => {
                let cell = ComponentCell::new(depth);
                self.tree.fiber_mut(id).component = Some(cell);
                self.render_fiber(id);
            }
            VNode::Empty => {}
        }
    }

    /// Update a matched fiber in place from `new`. The fiber's retained
    /// descriptor is swapped first so render paths observe the new one.
    pub(crate) fn patch_fiber(&mut self, id: FiberId, new: VNode<H>) {
        let old = std::mem::replace(&mut self.tree.fiber_mut(id).data, new.clone());
        self.stats.patched += 1;
        match (old, new) {
            (VNode::Text(old), VNode::Text(new)) => {
                if old != new {
                    if let Some(dom) = self.tree.fiber(id).dom.clone() {
                        self.host.set_text(&dom, &new);
                    }
                }
            }
            (VNode::Element(old), VNode::Element(new)) => {
                let Some(dom) = self.tree.fiber(id).dom.clone() else {
                    debug_assert!(false, "element fiber without a host node");
                    return;
                };
                self.patch_attrs(&dom, &old.attrs, &new.attrs);
                let same_ref = match (&old.node_ref, &new.node_ref) {
                    (None, None) => true,
                    (Some(a), Some(b)) => a.same(b),
                    _ => false,
                };
                if !same_ref {
                    if let Some(old_ref) = &old.node_ref {
                        old_ref.notify(None);
                    }
                    self.tree.fiber_mut(id).host_ref = new.node_ref.clone();
                    if let Some(new_ref) = &new.node_ref {
                        new_ref.notify(Some(&dom));
                    }
                }
                self.reconcile_children(id, new.children.clone());
            }
            (VNode::Fragment(_), VNode::Fragment(new)) => {
                self.reconcile_children(id, new.children.clone());
            }
            (VNode::Component(old), VNode::Component(new)) => {
                let dirty = self
                    .tree
                    .fiber(id)
                    .component
                    .as_ref()
                    .is_some_and(|cell| cell.contains(CompFlags::DIRTY));
                if new.memo && !dirty && old.props.shallow_eq(&new.props) {
                    self.stats.memo_skips += 1;
                    log::trace!("[RENDER] memo skip {id:?}");
                } else {
                    self.render_fiber(id);
                }
            }
            (VNode::Provider(old), VNode::Provider(new)) => {
                if !Rc::ptr_eq(&old.value, &new.value) {
                    let consumers = {
                        let slot = &mut self.tree.providers[id];
                        slot.value = new.value.clone();
                        slot.consumers.clone()
                    };
                    log::trace!(
                        "[CONTEXT] provider {id:?} changed; enqueueing {} consumers",
                        consumers.len()
                    );
                    for consumer in consumers {
                        let cell = self
                            .tree
                            .get(consumer)
                            .and_then(|fiber| fiber.component.clone());
                        if let Some(cell) = cell {
                            SchedulerState::enqueue(&self.shared, consumer, &cell);
                        }
                    }
                }
                self.reconcile_children(id, new.children.clone());
            }
            (VNode::Consumer(_), VNode::Consumer(_)) => {
                self.render_fiber(id);
            }
            (VNode::Template(old), VNode::Template(new)) => {
                if !old.same_dynamics(&new) {
                    self.reconcile_children(id, new.expand());
                }
            }
            (VNode::Empty, VNode::Empty) => {}
            _ => debug_assert!(false, "patch between incompatible descriptors"),
        }
    }

    /// Run a component or consumer fiber and reconcile its output, looping
    /// while the render marks itself dirty (a state set during render) up to
    /// the retry limit.
    pub(crate) fn render_fiber(&mut self, id: FiberId) {
        let Some(cell) = self.tree.fiber(id).component.clone() else {
            debug_assert!(false, "render on a fiber without a component cell");
            return;
        };
        cell.set(CompFlags::RENDERING, true);
        let rendering = ClearRendering(cell.clone());
        let retry_limit = self.shared.borrow().retry_limit;
        let mut passes = 0u32;
        let out = loop {
            passes += 1;
            cell.set(CompFlags::DIRTY, false);
            let out = self.invoke(id, &cell);
            self.stats.renders += 1;
            if !cell.contains(CompFlags::DIRTY) {
                break out;
            }
            if passes >= retry_limit {
                log::warn!(
                    "[RENDER] {id:?} re-marked itself dirty {passes} times in one pass; \
                     committing the latest output"
                );
                cell.set(CompFlags::DIRTY, false);
                break out;
            }
        };
        drop(rendering);
        cell.set(CompFlags::MOUNTED, true);
        self.reconcile_children(id, vec![out]);
    }

    fn invoke(&mut self, id: FiberId, cell: &Rc<ComponentCell>) -> VNode<H> {
        match self.tree.fiber(id).data.clone() {
            VNode::Component(component) => {
                let mut hooks = self.tree.hooks.remove(id).unwrap_or_default();
                hooks.begin();
                let shared = self.shared.clone();
                let out = panic::catch_unwind(AssertUnwindSafe(|| {
                    let mut cx = Cx {
                        fiber: id,
                        hooks: &mut hooks,
                        cell: cell.clone(),
                        shared,
                        tree: &mut self.tree,
                    };
                    component.component.render(&component.props, &mut cx)
                }));
                // Hook slots go back into the tree even when the render
                // panics; the component stays renderable after the unwind
                // is caught downstream.
                match out {
                    Ok(out) => {
                        hooks.finish();
                        self.tree.hooks.insert(id, hooks);
                        out
                    }
                    Err(payload) => {
                        self.tree.hooks.insert(id, hooks);
                        panic::resume_unwind(payload)
                    }
                }
            }
            VNode::Consumer(consumer) => {
                let value = self
                    .tree
                    .resolve_context(id, consumer.context_id)
                    .unwrap_or_else(|| consumer.default.clone());
                (consumer.render)(value.as_ref())
            }
            _ => {
                debug_assert!(false, "invoke on a non-component fiber");
                VNode::Empty
            }
        }
    }

    /// Tear down a subtree's engine-side state without touching the host
    /// tree: refs fire `None`, effect cleanups run, scheduling cells are
    /// deactivated, context subscriptions are dropped.
    fn unmount_subtree(&mut self, id: FiberId) {
        self.tree.unmount(id);
        let mut stack = vec![id];
        while let Some(fiber) = stack.pop() {
            for child in self.tree.children(fiber) {
                stack.push(child);
            }
            if let Some(cell) = self.tree.fiber(fiber).component.clone() {
                cell.set(CompFlags::MOUNTED, false);
                cell.set(CompFlags::DIRTY, false);
            }
            if let Some(hooks) = self.tree.hooks.remove(fiber) {
                hooks.teardown_effects();
            }
            if let Some(subscriptions) = self.tree.subscriptions.remove(fiber) {
                for provider in subscriptions {
                    if let Some(slot) = self.tree.providers.get_mut(provider) {
                        slot.unsubscribe(fiber);
                    }
                }
            }
        }
    }

    fn replace_fiber(
        &mut self,
        stale: FiberId,
        parent: FiberId,
        prev: Option<FiberId>,
        new: VNode<H>,
    ) -> FiberId {
        log::trace!(
            "[FIBER_CHILDREN] replace {stale:?} ({} -> {})",
            self.tree.fiber(stale).data.kind_name(),
            new.kind_name()
        );
        self.unmount_subtree(stale);
        let stale_prev = self.tree.previous_fiber(stale, parent);
        if let Some(container) = self.tree.child_container(parent) {
            self.tree
                .remove(&mut self.host, stale, parent, stale_prev, &container);
        }
        self.stats.removed += 1;
        self.create_and_mount(parent, prev, new)
    }

    fn drop_child(&mut self, id: FiberId, parent: FiberId) {
        log::trace!("[FIBER_CHILDREN] drop {id:?}");
        self.unmount_subtree(id);
        let prev = self.tree.previous_fiber(id, parent);
        if let Some(container) = self.tree.child_container(parent) {
            self.tree.remove(&mut self.host, id, parent, prev, &container);
        } else {
            debug_assert!(false, "drop below a detached fiber");
        }
        self.stats.removed += 1;
    }

    fn apply_attrs(&mut self, node: &H::Node, attrs: &[(Rc<str>, AttrValue<H>)]) {
        for (name, value) in attrs {
            match value {
                AttrValue::Handler(handler) => self.host.add_listener(node, name, handler.clone()),
                value => self.host.set_attribute(node, name, value),
            }
        }
    }

    fn patch_attrs(
        &mut self,
        node: &H::Node,
        old: &[(Rc<str>, AttrValue<H>)],
        new: &[(Rc<str>, AttrValue<H>)],
    ) {
        for (name, old_value) in old {
            if !new.iter().any(|(new_name, _)| new_name == name) {
                if old_value.is_handler() {
                    self.host.remove_listener(node, name);
                } else {
                    self.host.remove_attribute(node, name);
                }
            }
        }
        for (name, new_value) in new {
            let old_value = old
                .iter()
                .find(|(old_name, _)| old_name == name)
                .map(|(_, value)| value);
            if old_value.is_some_and(|old_value| old_value.shallow_eq(new_value)) {
                continue;
            }
            if let Some(old_value) = old_value {
                // The slot changed category; clear the stale registration.
                if old_value.is_handler() && !new_value.is_handler() {
                    self.host.remove_listener(node, name);
                } else if !old_value.is_handler() && new_value.is_handler() {
                    self.host.remove_attribute(node, name);
                }
            }
            match new_value {
                AttrValue::Handler(handler) => self.host.add_listener(node, name, handler.clone()),
                value => self.host.set_attribute(node, name, value),
            }
        }
    }
}
