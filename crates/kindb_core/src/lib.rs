//! # kindb core
//!
//! Transactional object store for genealogical records.
//!
//! This crate provides:
//! - The record model: ten primary kinds addressed by handle and external ID
//! - A backend-independent [`Store`] over the engines in `kindb_storage`
//! - The reference map with reverse lookups for "who points at me"
//! - Transactions with undo and redo, and unlogged batch loads
//! - Secondary fields for ID lookups and collated listings
//! - A selection layer with predicates, ordering and paging
//! - Change signals, derived statistics and schema migration

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collation;
mod config;
mod contract;
mod cursor;
mod dir;
mod dispatch;
mod error;
mod ids;
mod index;
mod metadata;
pub mod migration;
mod model;
mod progress;
pub mod selection;
mod signals;
mod store;
mod stats;
mod surnames;
pub mod transaction;
mod types;
mod vocab;

pub use collation::Collator;
pub use config::{BackendKind, Config};
pub use contract::{ReadableStore, Records, WritableStore};
pub use cursor::Cursor;
pub use error::{CoreError, CoreResult};
pub use ids::{default_prefix, IdPattern};
pub use index::ReferenceEdge;
pub use migration::SCHEMA_VERSION;
pub use model::{
    Address, Attribute, ChildRef, Citation, Date, Event, EventRef, Family, Gender, Handle,
    HandleRef, Media, MediaRef, Name, Note, Person, PersonRef, Place, PlaceName, PlaceRef,
    PrimaryRecord, Record, RecordKind, RepoRef, Repository, Researcher, Source, Surname, Tag,
    TypeLabel, Url,
};
pub use selection::{Matcher, Operator, Predicate, QuerySet};
pub use signals::{EventBus, Signal};
pub use stats::{GenderStats, NameCounts};
pub use store::{IntegrityReport, Store, StoreSummary};
pub use transaction::Transaction;
pub use types::{SubscriptionId, TransactionId};
pub use vocab::Vocabulary;

pub use kindb_codec::{Serializer, Value};

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        Config, CoreError, CoreResult, Handle, ReadableStore, RecordKind, Store, Transaction,
        WritableStore,
    };
    pub use crate::{Citation, Event, Family, Gender, Media, Note, Person, Place, Repository, Source, Tag};
}
