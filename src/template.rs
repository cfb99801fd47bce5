//! Compiled static templates.
//!
//! A [`TemplateShape`] is the static skeleton of a repeated piece of output,
//! built once and shared by reference; each instantiation supplies only the
//! dynamic values for the shape's numbered slots. Reconciliation matches
//! template fibers by shape identity, so a same-shape update compares the
//! dynamics and leaves the static structure untouched when none changed.

use crate::element::{AttrValue, VElement, VNode};
use crate::host::Host;
use crate::identity::VKey;
use crate::Error;
use std::rc::Rc;

/// What a numbered slot accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    /// A single attribute value.
    Attr,
    /// A set of attributes spread onto one element.
    Spread,
    /// A child descriptor.
    Child,
}

impl SlotKind {
    fn name(self) -> &'static str {
        match self {
            SlotKind::Attr => "attr",
            SlotKind::Spread => "spread",
            SlotKind::Child => "child",
        }
    }
}

/// One static node in a template skeleton.
pub enum ShapeNode {
    /// A host element with static and slotted attributes.
    Element {
        /// Host tag name.
        tag: Rc<str>,
        /// Attribute sites, in declaration order.
        attrs: Vec<ShapeAttr>,
        /// Static children and holes.
        children: Vec<ShapeNode>,
    },
    /// Fixed text.
    Text(Rc<str>),
    /// A numbered child slot.
    Hole(usize),
}

/// One attribute site on a template element.
pub enum ShapeAttr {
    /// Fixed value baked into the shape.
    Static {
        /// Attribute name.
        name: Rc<str>,
        /// Fixed value.
        value: Rc<str>,
    },
    /// A numbered single-attribute slot.
    Dynamic {
        /// Attribute name.
        name: Rc<str>,
        /// Slot index.
        slot: usize,
    },
    /// A numbered attribute-set slot.
    Spread {
        /// Slot index.
        slot: usize,
    },
}

/// The shared static skeleton; identity (`Rc` pointer) is the reconciliation
/// kind for template fibers.
pub struct TemplateShape {
    roots: Vec<ShapeNode>,
    slot_kinds: Vec<SlotKind>,
}

impl TemplateShape {
    /// Build a shape from its static roots. Slot indices must be dense
    /// (every index below the highest is referenced) and each slot must be
    /// referenced with a single kind; shapes are built once at startup, so
    /// a malformed shape panics rather than returning an error.
    pub fn new(roots: Vec<ShapeNode>) -> Rc<Self> {
        let mut kinds: Vec<Option<SlotKind>> = Vec::new();
        for root in &roots {
            collect_slot_kinds(root, &mut kinds);
        }
        let slot_kinds = kinds
            .into_iter()
            .enumerate()
            .map(|(slot, kind)| kind.unwrap_or_else(|| panic!("template slot {slot} is unused")))
            .collect();
        Rc::new(Self { roots, slot_kinds })
    }

    /// Number of dynamic slots.
    pub fn slots(&self) -> usize {
        self.slot_kinds.len()
    }

    /// Instantiate the shape with one dynamic value per slot. Arity and
    /// per-slot kind are validated here so expansion can trust them.
    pub fn instantiate<H: Host>(
        self: &Rc<Self>,
        dynamics: Vec<Dynamic<H>>,
    ) -> Result<VNode<H>, Error> {
        if dynamics.len() != self.slot_kinds.len() {
            return Err(Error::TemplateArity {
                expected: self.slot_kinds.len(),
                got: dynamics.len(),
            });
        }
        for (slot, (dynamic, expected)) in dynamics.iter().zip(&self.slot_kinds).enumerate() {
            if dynamic.kind() != *expected {
                return Err(Error::TemplateSlot {
                    slot,
                    expected: expected.name(),
                    got: dynamic.kind().name(),
                });
            }
        }
        Ok(VNode::Template(Rc::new(VTemplate {
            shape: self.clone(),
            dynamics,
        })))
    }
}

fn record_slot(kinds: &mut Vec<Option<SlotKind>>, slot: usize, kind: SlotKind) {
    if kinds.len() <= slot {
        kinds.resize(slot + 1, None);
    }
    match kinds[slot] {
        None => kinds[slot] = Some(kind),
        Some(existing) => assert_eq!(
            existing, kind,
            "template slot {slot} referenced as both {} and {}",
            existing.name(),
            kind.name()
        ),
    }
}

fn collect_slot_kinds(node: &ShapeNode, kinds: &mut Vec<Option<SlotKind>>) {
    match node {
        ShapeNode::Text(_) => {}
        ShapeNode::Hole(slot) => record_slot(kinds, *slot, SlotKind::Child),
        ShapeNode::Element { attrs, children, .. } => {
            for attr in attrs {
                match attr {
                    ShapeAttr::Static { .. } => {}
                    ShapeAttr::Dynamic { slot, .. } => record_slot(kinds, *slot, SlotKind::Attr),
                    ShapeAttr::Spread { slot } => record_slot(kinds, *slot, SlotKind::Spread),
                }
            }
            for child in children {
                collect_slot_kinds(child, kinds);
            }
        }
    }
}

/// A value bound to one template slot for one instantiation.
pub enum Dynamic<H: Host> {
    /// Single attribute value.
    Attr(AttrValue<H>),
    /// Attribute set spread onto the slot's element.
    Spread(Vec<(Rc<str>, AttrValue<H>)>),
    /// Child descriptor.
    Child(VNode<H>),
}

impl<H: Host> Dynamic<H> {
    fn kind(&self) -> SlotKind {
        match self {
            Dynamic::Attr(_) => SlotKind::Attr,
            Dynamic::Spread(_) => SlotKind::Spread,
            Dynamic::Child(_) => SlotKind::Child,
        }
    }

    /// Shallow comparison used to skip same-shape updates.
    pub(crate) fn shallow_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Dynamic::Attr(a), Dynamic::Attr(b)) => a.shallow_eq(b),
            (Dynamic::Spread(a), Dynamic::Spread(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((a_name, a), (b_name, b))| a_name == b_name && a.shallow_eq(b))
            }
            (Dynamic::Child(a), Dynamic::Child(b)) => a.loose_eq(b),
            _ => false,
        }
    }
}

impl<H: Host> Clone for Dynamic<H> {
    fn clone(&self) -> Self {
        match self {
            Dynamic::Attr(value) => Dynamic::Attr(value.clone()),
            Dynamic::Spread(attrs) => Dynamic::Spread(attrs.clone()),
            Dynamic::Child(child) => Dynamic::Child(child.clone()),
        }
    }
}

/// A template instantiation descriptor: shape identity plus slot values.
pub struct VTemplate<H: Host> {
    /// The shared skeleton; compared by pointer during reconciliation.
    pub shape: Rc<TemplateShape>,
    /// One value per slot, validated against the shape.
    pub dynamics: Vec<Dynamic<H>>,
}

impl<H: Host> VTemplate<H> {
    /// Whether `other` can update a fiber holding `self` without touching
    /// any static structure.
    pub(crate) fn same_dynamics(&self, other: &Self) -> bool {
        debug_assert!(Rc::ptr_eq(&self.shape, &other.shape));
        self.dynamics.len() == other.dynamics.len()
            && self
                .dynamics
                .iter()
                .zip(&other.dynamics)
                .all(|(a, b)| a.shallow_eq(b))
    }

    /// Expand the instantiation into plain descriptors for the child
    /// reconciler. The expansion preserves shape structure exactly, so
    /// same-shape updates always pair fibers positionally.
    pub(crate) fn expand(&self) -> Vec<VNode<H>> {
        self.roots()
    }

    fn roots(&self) -> Vec<VNode<H>> {
        self.shape
            .roots
            .iter()
            .map(|root| expand_node(root, &self.dynamics))
            .collect()
    }
}

fn expand_node<H: Host>(node: &ShapeNode, dynamics: &[Dynamic<H>]) -> VNode<H> {
    match node {
        ShapeNode::Text(text) => VNode::Text(text.clone()),
        ShapeNode::Hole(slot) => match &dynamics[*slot] {
            Dynamic::Child(child) => child.clone(),
            // Kind validated at instantiation.
            _ => VNode::Empty,
        },
        ShapeNode::Element {
            tag,
            attrs,
            children,
        } => {
            let mut out_attrs = Vec::with_capacity(attrs.len());
            for attr in attrs {
                match attr {
                    ShapeAttr::Static { name, value } => {
                        out_attrs.push((name.clone(), AttrValue::Text(value.clone())));
                    }
                    ShapeAttr::Dynamic { name, slot } => {
                        if let Dynamic::Attr(value) = &dynamics[*slot] {
                            out_attrs.push((name.clone(), value.clone()));
                        }
                    }
                    ShapeAttr::Spread { slot } => {
                        if let Dynamic::Spread(pairs) = &dynamics[*slot] {
                            out_attrs.extend(pairs.iter().cloned());
                        }
                    }
                }
            }
            VNode::Element(Rc::new(VElement {
                tag: tag.clone(),
                key: VKey::None,
                node_ref: None,
                attrs: out_attrs,
                children: children
                    .iter()
                    .map(|child| expand_node(child, dynamics))
                    .collect(),
            }))
        }
    }
}
