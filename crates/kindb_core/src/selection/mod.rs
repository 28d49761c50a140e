//! The selection layer.
//!
//! Predicates are built explicitly with [`Predicate`] combinators and run
//! through a lazy [`QuerySet`] over one record kind. Evaluation happens in
//! the store, after decoding, so it behaves the same on every backend.

mod predicate;
mod queryset;

pub use predicate::{Matcher, Operator, Predicate};
pub use queryset::QuerySet;
