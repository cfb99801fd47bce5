//! Identity types for descriptor reconciliation.
//!
//! These are deliberately separate from the fiber implementation to avoid
//! coupling descriptor definitions to fiber internals.

use std::rc::Rc;

/// Key for matching descriptors against live fibers across render passes.
///
/// During reconciliation the fiber tree uses keys to pair descriptors from
/// the new tree with fibers produced by the previous one. Matching fibers
/// keep their host node, component state and hook slots; unmatched fibers
/// are created or torn down.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VKey {
    /// Explicit user-provided key. Descriptors with the same key inside one
    /// sibling run are considered the same logical node and are relocated
    /// rather than destroyed when their position changes.
    Key(Rc<str>),
    /// No key (anonymous). The descriptor still participates in
    /// reconciliation but is matched positionally against other unkeyed
    /// siblings.
    None,
}

impl VKey {
    /// Whether this is an explicit key.
    pub fn is_keyed(&self) -> bool {
        matches!(self, VKey::Key(_))
    }
}

impl From<&str> for VKey {
    fn from(value: &str) -> Self {
        VKey::Key(Rc::from(value))
    }
}

impl From<String> for VKey {
    fn from(value: String) -> Self {
        VKey::Key(Rc::from(value.as_str()))
    }
}
