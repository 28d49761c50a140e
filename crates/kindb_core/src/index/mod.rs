//! Derived indices: secondary fields and the reference map.

pub(crate) mod reference;
pub(crate) mod secondary;

pub use reference::ReferenceEdge;
