//! Per-kind descriptor table.
//!
//! Everything the store needs to treat the ten kinds uniformly: table
//! name, which secondary fields exist and how to extract them. Built once
//! as a static array indexed by [`RecordKind::index`].

use kindb_storage::{PayloadKind, TableSpec};

use crate::model::{Record, RecordKind};

/// Physical table of the reference map.
pub const REFERENCE_TABLE: &str = "reference";
/// Secondary field on the reference table holding the target handle.
pub const REF_HANDLE: &str = "ref_handle";
/// Physical table of the name-group mapping.
pub const NAME_GROUP_TABLE: &str = "name_group";

/// Static facts about one record kind.
#[derive(Debug)]
pub struct KindDescriptor {
    /// The kind described.
    pub kind: RecordKind,
    /// Physical table.
    pub table: &'static str,
    /// Fields kept current on every write, batch or not.
    pub lookup_fields: &'static [&'static str],
    /// Fields used for sorted listings; rebuilt after batch transactions.
    pub sort_fields: &'static [&'static str],
    extract: fn(&Record) -> Vec<(&'static str, String)>,
}

impl KindDescriptor {
    /// Lookup and sort fields together.
    pub fn all_fields(&self) -> impl Iterator<Item = &'static str> {
        self.lookup_fields.iter().chain(self.sort_fields).copied()
    }

    /// Extracts the secondary values of `record`.
    ///
    /// Every lookup and sort field appears once; missing values are empty.
    #[must_use]
    pub fn values(&self, record: &Record) -> Vec<(&'static str, String)> {
        (self.extract)(record)
    }

    /// Table definition for the storage layer.
    #[must_use]
    pub fn table_spec(&self, payload: PayloadKind) -> TableSpec {
        TableSpec::new(self.table, payload).with_indexed(self.all_fields())
    }
}

fn handle_text(h: Option<&crate::model::Handle>) -> String {
    h.map(ToString::to_string).unwrap_or_default()
}

fn extract(record: &Record) -> Vec<(&'static str, String)> {
    let id = ("external_id", record.external_id().to_string());
    match record {
        Record::Person(p) => vec![
            id,
            ("surname", p.primary_name.surname().to_string()),
            ("given_name", p.primary_name.first_name.clone()),
        ],
        Record::Family(f) => vec![
            id,
            ("father_handle", handle_text(f.father_handle.as_ref())),
            ("mother_handle", handle_text(f.mother_handle.as_ref())),
        ],
        Record::Place(p) => vec![
            id,
            ("enclosed_by", handle_text(p.enclosed_by())),
            ("title", p.title.clone()),
        ],
        Record::Source(s) => vec![id, ("title", s.title.clone())],
        Record::Citation(c) => vec![
            id,
            ("source_handle", handle_text(c.source_handle.as_ref())),
            ("page", c.page.clone()),
        ],
        Record::Media(m) => vec![id, ("desc", m.desc.clone()), ("path", m.path.clone())],
        Record::Tag(t) => vec![("name", t.name.clone())],
        Record::Event(_) | Record::Repository(_) | Record::Note(_) => vec![id],
    }
}

const fn descriptor_for(
    kind: RecordKind,
    lookup_fields: &'static [&'static str],
    sort_fields: &'static [&'static str],
) -> KindDescriptor {
    KindDescriptor {
        kind,
        table: kind.table(),
        lookup_fields,
        sort_fields,
        extract,
    }
}

const ID: &[&str] = &["external_id"];

static DESCRIPTORS: [KindDescriptor; 10] = [
    descriptor_for(RecordKind::Person, ID, &["surname", "given_name"]),
    descriptor_for(RecordKind::Family, ID, &["father_handle", "mother_handle"]),
    descriptor_for(RecordKind::Event, ID, &[]),
    descriptor_for(RecordKind::Place, &["external_id", "enclosed_by"], &["title"]),
    descriptor_for(RecordKind::Source, ID, &["title"]),
    descriptor_for(RecordKind::Citation, ID, &["source_handle", "page"]),
    descriptor_for(RecordKind::Repository, ID, &[]),
    descriptor_for(RecordKind::Media, ID, &["desc", "path"]),
    descriptor_for(RecordKind::Note, ID, &[]),
    descriptor_for(RecordKind::Tag, &["name"], &[]),
];

/// Descriptor of one kind.
#[must_use]
pub fn descriptor(kind: RecordKind) -> &'static KindDescriptor {
    &DESCRIPTORS[kind.index()]
}

/// Every table the store creates.
#[must_use]
pub fn table_specs(payload: PayloadKind) -> Vec<TableSpec> {
    let mut specs: Vec<TableSpec> = DESCRIPTORS.iter().map(|d| d.table_spec(payload)).collect();
    specs.push(TableSpec::new(REFERENCE_TABLE, payload).with_indexed([REF_HANDLE]));
    specs.push(TableSpec::new(NAME_GROUP_TABLE, payload));
    specs.push(TableSpec::new(crate::metadata::TABLE, payload));
    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Gender, Person, PrimaryRecord, Tag};

    #[test]
    fn descriptors_line_up_with_kinds() {
        for kind in RecordKind::ALL {
            assert_eq!(descriptor(kind).kind, kind);
            assert_eq!(descriptor(kind).table, kind.table());
        }
    }

    #[test]
    fn extracted_fields_match_declared_fields() {
        let mut person = Person::new("Ida", "Holm", Gender::Female);
        person.external_id = "I0007".into();
        let values = descriptor(RecordKind::Person).values(&person.into_record());
        assert_eq!(
            values,
            vec![
                ("external_id", "I0007".to_string()),
                ("surname", "Holm".to_string()),
                ("given_name", "Ida".to_string()),
            ]
        );

        for kind in RecordKind::ALL {
            let d = descriptor(kind);
            let declared: Vec<_> = d.all_fields().collect();
            let record = match kind {
                RecordKind::Tag => Tag::new("x").into_record(),
                RecordKind::Person => Person::default().into_record(),
                _ => continue,
            };
            let extracted: Vec<_> = d.values(&record).into_iter().map(|(f, _)| f).collect();
            assert_eq!(declared, extracted);
        }
    }

    #[test]
    fn table_specs_cover_support_tables() {
        let names: Vec<_> = table_specs(PayloadKind::Blob).into_iter().map(|s| s.name).collect();
        assert!(names.contains(&"reference".to_string()));
        assert!(names.contains(&"metadata".to_string()));
        assert_eq!(names.len(), 13);
    }
}
