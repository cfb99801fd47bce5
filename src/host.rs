//! The abstract host-document surface the renderer mutates.
//!
//! The engine never assumes a concrete document implementation; anything that
//! supports ordered child insertion, removal and node creation can be a host.
//! Host node handles are cheap to clone and identity-comparable so the fiber
//! tree can keep a non-owning node-to-fiber side table for ancestor lookups.

use crate::element::{AttrValue, EventHandler};
use std::fmt;
use std::hash::Hash;

/// Capability set consumed by the renderer.
///
/// All operations are assumed infallible; the engine performs no retries for
/// host mutations. Handles returned by the creation methods stay valid until
/// the host is told to remove them.
pub trait Host: 'static {
    /// A cheap, identity-comparable handle to one host node.
    type Node: Clone + Eq + Hash + fmt::Debug + 'static;
    /// The event payload delivered to registered callbacks.
    type Event: 'static;

    /// Create a detached element node for `tag`.
    fn create_element(&mut self, tag: &str) -> Self::Node;
    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> Self::Node;

    /// Insert `node` into `parent` immediately before `before`, or at the end
    /// when `before` is `None`. Re-inserting an attached node moves it.
    fn insert_before(&mut self, parent: &Self::Node, node: &Self::Node, before: Option<&Self::Node>);
    /// Detach `node` from `parent`.
    fn remove_child(&mut self, parent: &Self::Node, node: &Self::Node);

    /// The node currently containing `node`, if attached.
    fn parent_node(&self, node: &Self::Node) -> Option<Self::Node>;
    /// The first child of `node`, if any.
    fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;
    /// The sibling following `node` within its parent, if any.
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Replace the content of a text node.
    fn set_text(&mut self, node: &Self::Node, text: &str);
    /// Set or update a non-listener attribute.
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &AttrValue<Self>)
    where
        Self: Sized;
    /// Remove a non-listener attribute.
    fn remove_attribute(&mut self, node: &Self::Node, name: &str);

    /// Register an event-style callback under `name`, replacing any previous
    /// callback registered under the same name.
    fn add_listener(&mut self, node: &Self::Node, name: &str, handler: EventHandler<Self>)
    where
        Self: Sized;
    /// Remove the callback registered under `name`, if any.
    fn remove_listener(&mut self, node: &Self::Node, name: &str);
}

#[cfg(any(test, feature = "test-support"))]
pub use test_host::{TestEvent, TestHost, TestNode};

#[cfg(any(test, feature = "test-support"))]
mod test_host {
    use super::Host;
    use crate::element::{AttrValue, EventHandler};
    use rustc_hash::FxHashMap;
    use slotmap::{SecondaryMap, SlotMap};
    use std::collections::BTreeMap;

    slotmap::new_key_type! {
        /// Handle to a node in the in-memory test document.
        pub struct TestNode;
    }

    /// Event payload delivered by [`TestHost::emit`].
    #[derive(Clone, Debug, Default)]
    pub struct TestEvent {
        /// Free-form detail string for assertions.
        pub detail: String,
    }

    enum TestNodeData {
        Element { tag: String },
        Text { text: String },
    }

    #[derive(Default)]
    struct TestNodeLinks {
        parent: Option<TestNode>,
        children: Vec<TestNode>,
    }

    /// An in-memory host double with enough introspection for tests: every
    /// mutation is recorded so assertions can count host operations, and
    /// listeners can be fired through [`TestHost::emit`].
    #[derive(Default)]
    pub struct TestHost {
        nodes: SlotMap<TestNode, TestNodeData>,
        links: SecondaryMap<TestNode, TestNodeLinks>,
        attrs: SecondaryMap<TestNode, BTreeMap<String, String>>,
        listeners: SecondaryMap<TestNode, FxHashMap<String, EventHandler<TestHost>>>,
        /// Count of structural host mutations (inserts + removals).
        pub mutations: usize,
    }

    impl TestHost {
        /// Create an empty test document.
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a detached container node to render into.
        pub fn create_container(&mut self) -> TestNode {
            self.create_element("root")
        }

        /// The element tag of `node`, or `None` for text nodes.
        pub fn tag(&self, node: TestNode) -> Option<&str> {
            match self.nodes.get(node)? {
                TestNodeData::Element { tag } => Some(tag),
                TestNodeData::Text { .. } => None,
            }
        }

        /// The text content of `node`, or `None` for element nodes.
        pub fn text(&self, node: TestNode) -> Option<&str> {
            match self.nodes.get(node)? {
                TestNodeData::Text { text } => Some(text),
                TestNodeData::Element { .. } => None,
            }
        }

        /// The ordered children of `node`.
        pub fn children(&self, node: TestNode) -> &[TestNode] {
            self.links
                .get(node)
                .map(|links| links.children.as_slice())
                .unwrap_or(&[])
        }

        /// Look up an attribute value rendered onto `node`.
        pub fn attr(&self, node: TestNode, name: &str) -> Option<&str> {
            self.attrs.get(node)?.get(name).map(String::as_str)
        }

        /// Whether a listener is registered under `name`.
        pub fn has_listener(&self, node: TestNode, name: &str) -> bool {
            self.listeners
                .get(node)
                .is_some_and(|map| map.contains_key(name))
        }

        /// Fire the listener registered under `name`, if any.
        pub fn emit(&self, node: TestNode, name: &str, event: &TestEvent) {
            let handler = self
                .listeners
                .get(node)
                .and_then(|map| map.get(name))
                .cloned();
            if let Some(handler) = handler {
                handler.call(event);
            }
        }

        /// Render the subtree under `node` as a compact string, e.g.
        /// `div[id=a](span(), "hi")`, for order-sensitive assertions.
        pub fn render_to_string(&self, node: TestNode) -> String {
            match &self.nodes[node] {
                TestNodeData::Text { text } => format!("{text:?}"),
                TestNodeData::Element { tag } => {
                    let mut out = tag.clone();
                    if let Some(attrs) = self.attrs.get(node) {
                        if !attrs.is_empty() {
                            out.push('[');
                            for (i, (name, value)) in attrs.iter().enumerate() {
                                if i > 0 {
                                    out.push(' ');
                                }
                                out.push_str(name);
                                out.push('=');
                                out.push_str(value);
                            }
                            out.push(']');
                        }
                    }
                    out.push('(');
                    for (i, child) in self.children(node).iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(&self.render_to_string(*child));
                    }
                    out.push(')');
                    out
                }
            }
        }

        fn detach(&mut self, node: TestNode) {
            if let Some(parent) = self.links.get(node).and_then(|links| links.parent) {
                if let Some(parent_links) = self.links.get_mut(parent) {
                    parent_links.children.retain(|child| *child != node);
                }
            }
            if let Some(links) = self.links.get_mut(node) {
                links.parent = None;
            }
        }

        fn insert_node(&mut self, node: TestNode) -> TestNode {
            self.links.insert(node, TestNodeLinks::default());
            self.attrs.insert(node, BTreeMap::new());
            self.listeners.insert(node, FxHashMap::default());
            node
        }
    }

    impl Host for TestHost {
        type Node = TestNode;
        type Event = TestEvent;

        fn create_element(&mut self, tag: &str) -> TestNode {
            let node = self.nodes.insert(TestNodeData::Element {
                tag: tag.to_owned(),
            });
            self.insert_node(node)
        }

        fn create_text(&mut self, text: &str) -> TestNode {
            let node = self.nodes.insert(TestNodeData::Text {
                text: text.to_owned(),
            });
            self.insert_node(node)
        }

        fn insert_before(&mut self, parent: &TestNode, node: &TestNode, before: Option<&TestNode>) {
            self.detach(*node);
            let links = &mut self.links[*parent];
            let position = before
                .and_then(|before| links.children.iter().position(|child| child == before))
                .unwrap_or(links.children.len());
            links.children.insert(position, *node);
            self.links[*node].parent = Some(*parent);
            self.mutations += 1;
        }

        fn remove_child(&mut self, parent: &TestNode, node: &TestNode) {
            debug_assert_eq!(
                self.links.get(*node).and_then(|links| links.parent),
                Some(*parent),
                "remove_child: node is not a child of the given parent"
            );
            self.detach(*node);
            self.mutations += 1;
        }

        fn parent_node(&self, node: &TestNode) -> Option<TestNode> {
            self.links.get(*node)?.parent
        }

        fn first_child(&self, node: &TestNode) -> Option<TestNode> {
            self.links.get(*node)?.children.first().copied()
        }

        fn next_sibling(&self, node: &TestNode) -> Option<TestNode> {
            let parent = self.parent_node(node)?;
            let children = &self.links.get(parent)?.children;
            let position = children.iter().position(|child| child == node)?;
            children.get(position + 1).copied()
        }

        fn set_text(&mut self, node: &TestNode, text: &str) {
            if let Some(TestNodeData::Text { text: stored }) = self.nodes.get_mut(*node) {
                *stored = text.to_owned();
            }
        }

        fn set_attribute(&mut self, node: &TestNode, name: &str, value: &AttrValue<Self>) {
            let rendered = match value {
                AttrValue::Text(text) => text.to_string(),
                AttrValue::Bool(flag) => flag.to_string(),
                AttrValue::Number(number) => number.to_string(),
                AttrValue::Handler(_) => return,
            };
            self.attrs[*node].insert(name.to_owned(), rendered);
        }

        fn remove_attribute(&mut self, node: &TestNode, name: &str) {
            self.attrs[*node].remove(name);
        }

        fn add_listener(&mut self, node: &TestNode, name: &str, handler: EventHandler<Self>) {
            self.listeners[*node].insert(name.to_owned(), handler);
        }

        fn remove_listener(&mut self, node: &TestNode, name: &str) {
            self.listeners[*node].remove(name);
        }
    }
}
