//! Declarative descriptors consumed by the reconciler.
//!
//! Descriptors are immutable values describing one render pass's desired
//! output. They are cheap to clone (payloads sit behind `Rc`) and carry no
//! engine state; the persistent state lives in the fiber tree. Components are
//! plain functions from props to a descriptor, invoked with a hook context.

use crate::context::ContextId;
use crate::hooks::Cx;
use crate::host::Host;
use crate::identity::VKey;
use crate::template::VTemplate;
use crate::Error;
use std::cell::RefCell;
use std::rc::Rc;

/// An attribute value on a host element.
///
/// Handlers are routed to the host's listener registry; every other variant
/// is routed to the attribute surface. Shallow equality compares handlers by
/// callback identity and everything else by value.
pub enum AttrValue<H: Host> {
    /// String-valued attribute.
    Text(Rc<str>),
    /// Boolean attribute (presence toggle on DOM-like hosts).
    Bool(bool),
    /// Numeric attribute.
    Number(f64),
    /// Event-style callback.
    Handler(EventHandler<H>),
}

impl<H: Host> AttrValue<H> {
    /// Shallow equality: by value for data variants, by callback identity
    /// for handlers.
    pub fn shallow_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttrValue::Text(a), AttrValue::Text(b)) => a == b,
            (AttrValue::Bool(a), AttrValue::Bool(b)) => a == b,
            (AttrValue::Number(a), AttrValue::Number(b)) => a == b,
            (AttrValue::Handler(a), AttrValue::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Whether this value is an event handler.
    pub fn is_handler(&self) -> bool {
        matches!(self, AttrValue::Handler(_))
    }
}

impl<H: Host> Clone for AttrValue<H> {
    fn clone(&self) -> Self {
        match self {
            AttrValue::Text(text) => AttrValue::Text(text.clone()),
            AttrValue::Bool(flag) => AttrValue::Bool(*flag),
            AttrValue::Number(number) => AttrValue::Number(*number),
            AttrValue::Handler(handler) => AttrValue::Handler(handler.clone()),
        }
    }
}

impl<H: Host> std::fmt::Debug for AttrValue<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Text(text) => write!(f, "Text({text:?})"),
            AttrValue::Bool(flag) => write!(f, "Bool({flag})"),
            AttrValue::Number(number) => write!(f, "Number({number})"),
            AttrValue::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

impl<H: Host> From<&str> for AttrValue<H> {
    fn from(value: &str) -> Self {
        AttrValue::Text(Rc::from(value))
    }
}

impl<H: Host> From<String> for AttrValue<H> {
    fn from(value: String) -> Self {
        AttrValue::Text(Rc::from(value.as_str()))
    }
}

impl<H: Host> From<bool> for AttrValue<H> {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl<H: Host> From<f64> for AttrValue<H> {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

/// An event callback with stable identity, compared by pointer during
/// attribute diffing so unchanged handlers are not re-registered.
pub struct EventHandler<H: Host>(Rc<dyn Fn(&H::Event)>);

impl<H: Host> EventHandler<H> {
    /// Wrap a callback.
    pub fn new(f: impl Fn(&H::Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the callback.
    pub fn call(&self, event: &H::Event) {
        (self.0)(event);
    }

    /// Callback identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<H: Host> Clone for EventHandler<H> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// A ref-object populated with the host node on mount and cleared on unmount.
pub struct NodeRef<H: Host>(Rc<RefCell<Option<H::Node>>>);

impl<H: Host> NodeRef<H> {
    /// Create an empty ref.
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(None)))
    }

    /// The current host node, if mounted.
    pub fn get(&self) -> Option<H::Node> {
        self.0.borrow().clone()
    }

    pub(crate) fn set(&self, node: Option<H::Node>) {
        *self.0.borrow_mut() = node;
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<H: Host> Default for NodeRef<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Host> Clone for NodeRef<H> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// A mount/unmount notification target attached to an element descriptor.
///
/// A ref is invoked with `None` exactly once per unmount and with the
/// materialized node on mount; a ref identity carried across renders
/// unchanged is not re-invoked.
pub enum Ref<H: Host> {
    /// Callback ref.
    Callback(Rc<dyn Fn(Option<&H::Node>)>),
    /// Ref-object populated in place.
    Object(NodeRef<H>),
}

impl<H: Host> Ref<H> {
    pub(crate) fn notify(&self, node: Option<&H::Node>) {
        match self {
            Ref::Callback(callback) => callback(node),
            Ref::Object(node_ref) => node_ref.set(node.cloned()),
        }
    }

    /// Identity comparison; equal refs are not re-invoked across renders.
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Ref::Callback(a), Ref::Callback(b)) => Rc::ptr_eq(a, b),
            (Ref::Object(a), Ref::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl<H: Host> Clone for Ref<H> {
    fn clone(&self) -> Self {
        match self {
            Ref::Callback(callback) => Ref::Callback(callback.clone()),
            Ref::Object(node_ref) => Ref::Object(node_ref.clone()),
        }
    }
}

/// Props passed to a component: named values plus nested children.
pub struct Props<H: Host> {
    attrs: Vec<(Rc<str>, AttrValue<H>)>,
    children: Vec<VNode<H>>,
    forwarded: Option<Ref<H>>,
}

impl<H: Host> Props<H> {
    /// Empty props.
    pub fn new() -> Self {
        Self {
            attrs: Vec::new(),
            children: Vec::new(),
            forwarded: None,
        }
    }

    /// Add a named value.
    pub fn attr(mut self, name: impl Into<Rc<str>>, value: impl Into<AttrValue<H>>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Add a named event handler.
    pub fn handler(mut self, name: impl Into<Rc<str>>, f: impl Fn(&H::Event) + 'static) -> Self {
        self.attrs
            .push((name.into(), AttrValue::Handler(EventHandler::new(f))));
        self
    }

    /// Append a child descriptor.
    pub fn child(mut self, child: VNode<H>) -> Self {
        self.children.push(child);
        self
    }

    /// Append several child descriptors.
    pub fn children(mut self, children: impl IntoIterator<Item = VNode<H>>) -> Self {
        self.children.extend(children);
        self
    }

    /// Look up a named value.
    pub fn get(&self, name: &str) -> Option<&AttrValue<H>> {
        self.attrs
            .iter()
            .find(|(attr, _)| attr.as_ref() == name)
            .map(|(_, value)| value)
    }

    /// The nested children.
    pub fn child_nodes(&self) -> &[VNode<H>] {
        &self.children
    }

    /// The single nested child; a misuse error when zero or several children
    /// are present.
    pub fn only_child(&self) -> Result<&VNode<H>, Error> {
        if self.children.len() == 1 {
            Ok(&self.children[0])
        } else {
            Err(Error::NotExactlyOneChild {
                found: self.children.len(),
            })
        }
    }

    /// The ref forwarded through [`forward_ref`], if any.
    pub fn forwarded(&self) -> Option<&Ref<H>> {
        self.forwarded.as_ref()
    }

    pub(crate) fn forwarded_ref(mut self, node_ref: Ref<H>) -> Self {
        self.forwarded = Some(node_ref);
        self
    }

    /// Shallow equality used by `memo`: named values compare shallowly,
    /// children by descriptor identity.
    pub fn shallow_eq(&self, other: &Self) -> bool {
        let forwarded_eq = match (&self.forwarded, &other.forwarded) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same(b),
            _ => false,
        };
        forwarded_eq
            && self.attrs.len() == other.attrs.len()
            && self.children.len() == other.children.len()
            && self
                .attrs
                .iter()
                .zip(&other.attrs)
                .all(|((a_name, a), (b_name, b))| a_name == b_name && a.shallow_eq(b))
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.loose_eq(b))
    }
}

impl<H: Host> Default for Props<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Host> Clone for Props<H> {
    fn clone(&self) -> Self {
        Self {
            attrs: self.attrs.clone(),
            children: self.children.clone(),
            forwarded: self.forwarded.clone(),
        }
    }
}

/// A component function with stable identity.
///
/// Reconciliation matches component fibers by function identity, so a
/// component should be created once and cloned into descriptors; a closure
/// wrapped on every render will never match its previous fiber.
pub struct Component<H: Host>(Rc<dyn Fn(&Props<H>, &mut Cx<'_, H>) -> VNode<H>>);

impl<H: Host> Component<H> {
    /// Wrap a render function.
    pub fn new(f: impl Fn(&Props<H>, &mut Cx<'_, H>) -> VNode<H> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub(crate) fn render(&self, props: &Props<H>, cx: &mut Cx<'_, H>) -> VNode<H> {
        (self.0)(props, cx)
    }

    /// Function identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Build a descriptor invoking this component with `props`.
    pub fn with(&self, props: Props<H>) -> VNode<H> {
        VNode::Component(Rc::new(VComponent {
            component: self.clone(),
            key: VKey::None,
            props,
            memo: false,
        }))
    }

    /// Build a keyed descriptor invoking this component with `props`.
    pub fn with_key(&self, key: impl Into<VKey>, props: Props<H>) -> VNode<H> {
        VNode::Component(Rc::new(VComponent {
            component: self.clone(),
            key: key.into(),
            props,
            memo: false,
        }))
    }
}

impl<H: Host> Clone for Component<H> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// Shallow-prop-equality skip wrapper: the returned component renders `f`,
/// but reconciliation skips re-invoking it when props are shallowly equal
/// and the fiber is not otherwise dirty. Context changes still reach its
/// descendants through the consumer lists.
pub fn memo<H: Host>(component: Component<H>) -> MemoComponent<H> {
    MemoComponent(component)
}

/// A memoized component handle; see [`memo`].
pub struct MemoComponent<H: Host>(Component<H>);

impl<H: Host> MemoComponent<H> {
    /// Build a descriptor invoking the wrapped component with `props`.
    pub fn with(&self, props: Props<H>) -> VNode<H> {
        VNode::Component(Rc::new(VComponent {
            component: self.0.clone(),
            key: VKey::None,
            props,
            memo: true,
        }))
    }

    /// Build a keyed memoized descriptor.
    pub fn with_key(&self, key: impl Into<VKey>, props: Props<H>) -> VNode<H> {
        VNode::Component(Rc::new(VComponent {
            component: self.0.clone(),
            key: key.into(),
            props,
            memo: true,
        }))
    }
}

impl<H: Host> Clone for MemoComponent<H> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// Wrap a render function that receives the element ref destined for one of
/// its descendants. The ref travels through props under the `"ref"` slot.
pub fn forward_ref<H: Host>(
    f: impl Fn(&Props<H>, Option<&Ref<H>>, &mut Cx<'_, H>) -> VNode<H> + 'static,
) -> ForwardRefComponent<H> {
    ForwardRefComponent {
        component: Component::new(move |props, cx| f(props, props.forwarded(), cx)),
    }
}

/// A component handle produced by [`forward_ref`].
pub struct ForwardRefComponent<H: Host> {
    component: Component<H>,
}

impl<H: Host> ForwardRefComponent<H> {
    /// Build a descriptor forwarding `node_ref` into the render function.
    pub fn with(&self, node_ref: Ref<H>, props: Props<H>) -> VNode<H> {
        VNode::Component(Rc::new(VComponent {
            component: self.component.clone(),
            key: VKey::None,
            props: props.forwarded_ref(node_ref),
            memo: false,
        }))
    }
}

impl<H: Host> Clone for ForwardRefComponent<H> {
    fn clone(&self) -> Self {
        Self {
            component: self.component.clone(),
        }
    }
}

/// A host element descriptor.
pub struct VElement<H: Host> {
    /// Host tag name.
    pub tag: Rc<str>,
    /// Reconciliation key.
    pub key: VKey,
    /// Mount/unmount notification target.
    pub node_ref: Option<Ref<H>>,
    /// Attributes and listeners, in declaration order.
    pub attrs: Vec<(Rc<str>, AttrValue<H>)>,
    /// Child descriptors.
    pub children: Vec<VNode<H>>,
}

/// A component invocation descriptor.
pub struct VComponent<H: Host> {
    /// The component function; matched by identity.
    pub component: Component<H>,
    /// Reconciliation key.
    pub key: VKey,
    /// Props for this invocation.
    pub props: Props<H>,
    /// Whether shallow-equal props skip re-rendering.
    pub memo: bool,
}

/// A transparent grouping descriptor (fragment or array).
pub struct VFragment<H: Host> {
    /// Reconciliation key.
    pub key: VKey,
    /// Child descriptors.
    pub children: Vec<VNode<H>>,
}

/// A context provider descriptor; see [`crate::context::Context`].
pub struct VProvider<H: Host> {
    /// Identity of the provided context.
    pub context_id: ContextId,
    /// The provided value, compared by reference across renders.
    pub value: Rc<dyn std::any::Any>,
    /// Child descriptors.
    pub children: Vec<VNode<H>>,
}

/// A context consumer descriptor; its render prop receives the nearest
/// provided value (or the context default).
pub struct VConsumer<H: Host> {
    /// Identity of the consumed context.
    pub context_id: ContextId,
    /// Fallback value when no provider is in scope.
    pub default: Rc<dyn std::any::Any>,
    /// Render prop invoked with the resolved value.
    pub render: Rc<dyn Fn(&dyn std::any::Any) -> VNode<H>>,
}

/// One declarative node in the desired output tree.
pub enum VNode<H: Host> {
    /// Host element.
    Element(Rc<VElement<H>>),
    /// Host text node.
    Text(Rc<str>),
    /// Transparent grouping node.
    Fragment(Rc<VFragment<H>>),
    /// Component invocation.
    Component(Rc<VComponent<H>>),
    /// Context provider.
    Provider(Rc<VProvider<H>>),
    /// Context consumer.
    Consumer(Rc<VConsumer<H>>),
    /// Compiled static template instantiation.
    Template(Rc<VTemplate<H>>),
    /// Nothing at this position.
    Empty,
}

impl<H: Host> VNode<H> {
    /// The reconciliation key of this descriptor.
    pub fn key(&self) -> VKey {
        match self {
            VNode::Element(element) => element.key.clone(),
            VNode::Fragment(fragment) => fragment.key.clone(),
            VNode::Component(component) => component.key.clone(),
            _ => VKey::None,
        }
    }

    /// Whether a fiber rendering `self` can be updated in place by `new`.
    /// Incompatible descriptors force a replace at the position.
    pub(crate) fn same_kind(&self, new: &Self) -> bool {
        match (self, new) {
            (VNode::Element(a), VNode::Element(b)) => a.tag == b.tag,
            (VNode::Text(_), VNode::Text(_)) => true,
            (VNode::Fragment(_), VNode::Fragment(_)) => true,
            (VNode::Component(a), VNode::Component(b)) => a.component.ptr_eq(&b.component),
            (VNode::Provider(a), VNode::Provider(b)) => a.context_id == b.context_id,
            (VNode::Consumer(a), VNode::Consumer(b)) => a.context_id == b.context_id,
            (VNode::Template(a), VNode::Template(b)) => Rc::ptr_eq(&a.shape, &b.shape),
            (VNode::Empty, VNode::Empty) => true,
            _ => false,
        }
    }

    /// Descriptor identity: payload pointer equality. Used for the shallow
    /// child comparison in [`Props::shallow_eq`].
    pub(crate) fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VNode::Element(a), VNode::Element(b)) => Rc::ptr_eq(a, b),
            (VNode::Text(a), VNode::Text(b)) => a == b,
            (VNode::Fragment(a), VNode::Fragment(b)) => Rc::ptr_eq(a, b),
            (VNode::Component(a), VNode::Component(b)) => Rc::ptr_eq(a, b),
            (VNode::Provider(a), VNode::Provider(b)) => Rc::ptr_eq(a, b),
            (VNode::Consumer(a), VNode::Consumer(b)) => Rc::ptr_eq(a, b),
            (VNode::Template(a), VNode::Template(b)) => Rc::ptr_eq(a, b),
            (VNode::Empty, VNode::Empty) => true,
            _ => false,
        }
    }

    /// A short kind name for trace logging.
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            VNode::Element(_) => "element",
            VNode::Text(_) => "text",
            VNode::Fragment(_) => "fragment",
            VNode::Component(_) => "component",
            VNode::Provider(_) => "provider",
            VNode::Consumer(_) => "consumer",
            VNode::Template(_) => "template",
            VNode::Empty => "empty",
        }
    }
}

impl<H: Host> Clone for VNode<H> {
    fn clone(&self) -> Self {
        match self {
            VNode::Element(element) => VNode::Element(element.clone()),
            VNode::Text(text) => VNode::Text(text.clone()),
            VNode::Fragment(fragment) => VNode::Fragment(fragment.clone()),
            VNode::Component(component) => VNode::Component(component.clone()),
            VNode::Provider(provider) => VNode::Provider(provider.clone()),
            VNode::Consumer(consumer) => VNode::Consumer(consumer.clone()),
            VNode::Template(template) => VNode::Template(template.clone()),
            VNode::Empty => VNode::Empty,
        }
    }
}

/// Build an element descriptor.
pub fn el<H: Host>(tag: impl Into<Rc<str>>) -> ElementBuilder<H> {
    ElementBuilder {
        tag: tag.into(),
        key: VKey::None,
        node_ref: None,
        attrs: Vec::new(),
        children: Vec::new(),
    }
}

/// Build a text descriptor.
pub fn text<H: Host>(content: impl Into<Rc<str>>) -> VNode<H> {
    VNode::Text(content.into())
}

/// Build a transparent grouping descriptor.
pub fn fragment<H: Host>(children: impl IntoIterator<Item = VNode<H>>) -> VNode<H> {
    VNode::Fragment(Rc::new(VFragment {
        key: VKey::None,
        children: children.into_iter().collect(),
    }))
}

/// Build a keyed fragment descriptor.
pub fn keyed_fragment<H: Host>(
    key: impl Into<VKey>,
    children: impl IntoIterator<Item = VNode<H>>,
) -> VNode<H> {
    VNode::Fragment(Rc::new(VFragment {
        key: key.into(),
        children: children.into_iter().collect(),
    }))
}

/// Fluent builder returned by [`el`].
pub struct ElementBuilder<H: Host> {
    tag: Rc<str>,
    key: VKey,
    node_ref: Option<Ref<H>>,
    attrs: Vec<(Rc<str>, AttrValue<H>)>,
    children: Vec<VNode<H>>,
}

impl<H: Host> ElementBuilder<H> {
    /// Set the reconciliation key.
    pub fn key(mut self, key: impl Into<VKey>) -> Self {
        self.key = key.into();
        self
    }

    /// Attach a ref-object notified on mount/unmount.
    pub fn node_ref(mut self, node_ref: &NodeRef<H>) -> Self {
        self.node_ref = Some(Ref::Object(node_ref.clone()));
        self
    }

    /// Attach a callback ref notified on mount/unmount.
    pub fn ref_callback(mut self, f: impl Fn(Option<&H::Node>) + 'static) -> Self {
        self.node_ref = Some(Ref::Callback(Rc::new(f)));
        self
    }

    /// Attach a pre-built ref.
    pub fn with_ref(mut self, node_ref: Ref<H>) -> Self {
        self.node_ref = Some(node_ref);
        self
    }

    /// Set an attribute.
    pub fn attr(mut self, name: impl Into<Rc<str>>, value: impl Into<AttrValue<H>>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Register an event handler.
    pub fn on(mut self, name: impl Into<Rc<str>>, f: impl Fn(&H::Event) + 'static) -> Self {
        self.attrs
            .push((name.into(), AttrValue::Handler(EventHandler::new(f))));
        self
    }

    /// Register a pre-built event handler (stable identity across renders).
    pub fn on_handler(mut self, name: impl Into<Rc<str>>, handler: EventHandler<H>) -> Self {
        self.attrs.push((name.into(), AttrValue::Handler(handler)));
        self
    }

    /// Append a child descriptor.
    pub fn child(mut self, child: VNode<H>) -> Self {
        self.children.push(child);
        self
    }

    /// Append several child descriptors.
    pub fn children(mut self, children: impl IntoIterator<Item = VNode<H>>) -> Self {
        self.children.extend(children);
        self
    }

    /// Finish the descriptor.
    pub fn build(self) -> VNode<H> {
        VNode::Element(Rc::new(VElement {
            tag: self.tag,
            key: self.key,
            node_ref: self.node_ref,
            attrs: self.attrs,
            children: self.children,
        }))
    }
}
