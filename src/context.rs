//! Typed context channels: provider/consumer value propagation that crosses
//! memoization barriers.
//!
//! A [`Context`] is created once and cloned wherever it is used; providers
//! and consumers are matched by the context's process-unique id. Provider
//! fibers keep a list of subscribed consumer fibers, so a value change can
//! enqueue exactly the affected components even when intermediate components
//! skip re-rendering.

use crate::element::{VConsumer, VNode, VProvider};
use crate::fiber::FiberId;
use crate::host::Host;
use std::any::Any;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one context channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

/// A typed context channel with a default value.
pub struct Context<T> {
    id: ContextId,
    default: Rc<T>,
}

impl<T: 'static> Context<T> {
    /// Create a new channel. The default is handed to consumers with no
    /// provider in scope.
    pub fn new(default: T) -> Self {
        Self {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
            default: Rc::new(default),
        }
    }

    /// This channel's identity.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The default value.
    pub fn default_value(&self) -> Rc<T> {
        self.default.clone()
    }

    /// Build a provider descriptor supplying `value` to every consumer in
    /// `children`. The value is compared by reference across renders;
    /// supplying the same `Rc` again re-renders no consumers.
    pub fn provider<H: Host>(&self, value: Rc<T>, children: Vec<VNode<H>>) -> VNode<H> {
        VNode::Provider(Rc::new(VProvider {
            context_id: self.id,
            value: value as Rc<dyn Any>,
            children,
        }))
    }

    /// Build a consumer descriptor whose render prop receives the nearest
    /// provided value (or the default).
    pub fn consumer<H: Host>(&self, render: impl Fn(&T) -> VNode<H> + 'static) -> VNode<H> {
        VNode::Consumer(Rc::new(VConsumer {
            context_id: self.id,
            default: self.default.clone() as Rc<dyn Any>,
            render: Rc::new(move |value: &dyn Any| {
                let value = value
                    .downcast_ref::<T>()
                    .expect("context value type mismatch");
                render(value)
            }),
        }))
    }
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: self.default.clone(),
        }
    }
}

/// Per-provider-fiber state: the live value plus the consumer list.
pub(crate) struct ProviderSlot {
    pub(crate) context_id: ContextId,
    pub(crate) value: Rc<dyn Any>,
    /// Fibers to enqueue when the value identity changes. Maintained by
    /// consumer registration and pruned on consumer unmount.
    pub(crate) consumers: Vec<FiberId>,
}

impl ProviderSlot {
    pub(crate) fn new(context_id: ContextId, value: Rc<dyn Any>) -> Self {
        Self {
            context_id,
            value,
            consumers: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&mut self, consumer: FiberId) {
        if !self.consumers.contains(&consumer) {
            self.consumers.push(consumer);
        }
    }

    pub(crate) fn unsubscribe(&mut self, consumer: FiberId) {
        self.consumers.retain(|id| *id != consumer);
    }
}
