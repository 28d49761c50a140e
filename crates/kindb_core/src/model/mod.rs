//! The record model: handles, kinds, the ten primary records and their
//! embedded sub-objects.
//!
//! Every record can enumerate the handles it references, recursively
//! through its sub-objects. The store derives the reference map from
//! that enumeration on each commit.

mod handle;
mod kind;
#[allow(missing_docs)]
mod objects;
mod record;
#[allow(missing_docs)]
mod records;
mod walk;

pub use handle::Handle;
pub use kind::RecordKind;
pub use objects::{
    Address, Attribute, ChildRef, Date, EventRef, Gender, MediaRef, Name, PersonRef, PlaceName,
    PlaceRef, RepoRef, Researcher, Surname, TypeLabel, Url,
};
pub use record::{PrimaryRecord, Record};
pub use records::{Citation, Event, Family, Media, Note, Person, Place, Repository, Source, Tag};
pub use walk::HandleRef;
