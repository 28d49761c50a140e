//! # kindb testkit
//!
//! Test utilities for kindb.
//!
//! This crate provides:
//! - Test stores over every engine with automatic cleanup
//! - Canned family layouts
//! - Property-based generators for persons and person edits
//! - Whole-store images for before/after comparisons
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kindb_testkit::prelude::*;
//!
//! #[test]
//! fn removal_cleans_backlinks() {
//!     with_each_engine(|store| {
//!         let h = household(store, "Berg");
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
