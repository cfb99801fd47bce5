//! An incremental fiber-tree renderer over an abstract host document.
//!
//! The engine keeps a persistent shadow tree of fibers, one per rendered
//! output unit, and reconciles declarative descriptors against it: keyed
//! children are matched and moved instead of rebuilt, component state lives
//! in ordered hook slots that survive re-renders, context values propagate
//! through provider/consumer channels that cross memoization barriers, and
//! effects run on a scheduler with layout and deferred flushes.
//!
//! The host document is abstract (the [`host::Host`] trait); anything with
//! ordered child insertion and removal can be driven. The crate is
//! single-threaded by design: descriptors and hook state are `Rc`-based and
//! stay on the thread that created the [`Renderer`].
//!
//! ```ignore
//! use weft::{el, text, Component, Props, Renderer, TestHost, VNode};
//!
//! let counter: Component<TestHost> = Component::new(|_props, cx| {
//!     let (count, set_count) = cx.use_state(|| 0);
//!     el("button")
//!         .on("click", move |_| set_count.update(|count| count + 1))
//!         .child(text(count.to_string()))
//!         .build()
//! });
//!
//! let mut renderer = Renderer::new(TestHost::new());
//! let container = renderer.host_mut().create_container();
//! renderer.render(counter.with(Props::new()), &container);
//! ```

pub mod context;
mod effects;
pub mod element;
pub mod fiber;
pub mod hooks;
pub mod host;
pub mod identity;
mod reconcile;
mod runtime;
pub mod template;

mod scheduler;

pub use context::Context;
pub use effects::Cleanup;
pub use element::{
    el, forward_ref, fragment, keyed_fragment, memo, text, AttrValue, Component, ElementBuilder,
    EventHandler, ForwardRefComponent, MemoComponent, NodeRef, Props, Ref, VNode,
};
pub use fiber::{Fiber, FiberId, FiberTree};
pub use hooks::{Cx, Dispatch, UseState};
pub use host::Host;
pub use identity::VKey;
pub use runtime::{ReconcileStats, Renderer};
pub use scheduler::DEFAULT_RETRY_LIMIT;
pub use template::{Dynamic, ShapeAttr, ShapeNode, SlotKind, TemplateShape, VTemplate};

#[cfg(any(test, feature = "test-support"))]
pub use host::{TestEvent, TestHost, TestNode};

/// Errors surfaced by descriptor construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// [`Props::only_child`] was called with zero or several children.
    #[error("expected exactly one child, found {found}")]
    NotExactlyOneChild {
        /// Number of children actually present.
        found: usize,
    },
    /// A template was instantiated with the wrong number of dynamics.
    #[error("template expects {expected} dynamics, got {got}")]
    TemplateArity {
        /// Slots declared by the shape.
        expected: usize,
        /// Dynamics supplied.
        got: usize,
    },
    /// A template slot was bound with a value of the wrong kind.
    #[error("template slot {slot} expects a {expected} binding, got {got}")]
    TemplateSlot {
        /// Slot index.
        slot: usize,
        /// Kind declared by the shape.
        expected: &'static str,
        /// Kind supplied.
        got: &'static str,
    },
}
