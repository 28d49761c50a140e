//! # kindb Codec
//!
//! Payload serialization for kindb records.
//!
//! Records are serialized exactly once, by the store, into the bytes that
//! every storage backend keeps opaquely. Two formats are supported:
//!
//! - [`Serializer::Blob`] - CBOR via `ciborium`
//! - [`Serializer::Json`] - UTF-8 JSON via `serde_json`
//!
//! The crate also provides [`Value`], a dynamic tree used to address
//! record fields by dotted path and to compare them in predicates.
//!
//! ## Usage
//!
//! ```
//! use kindb_codec::{Serializer, Value};
//!
//! let bytes = Serializer::Json.encode(&vec!["a", "b"]).unwrap();
//! let back: Vec<String> = Serializer::Json.decode(&bytes).unwrap();
//! assert_eq!(back, vec!["a", "b"]);
//!
//! let value = Value::from_serialize(&back).unwrap();
//! assert_eq!(value.path("1"), Some(&Value::Text("b".into())));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod serializer;
mod value;

pub use error::{CodecError, CodecResult};
pub use serializer::Serializer;
pub use value::Value;
