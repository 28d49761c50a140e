//! Recursive traversal of embedded references and type labels.

use super::{Handle, RecordKind, TypeLabel};
use crate::vocab::Vocabulary;

/// A (target kind, target handle) pair found inside a record.
pub type HandleRef = (RecordKind, Handle);

/// Traversal implemented by every record and embedded sub-object.
pub(crate) trait Walk {
    /// Appends every handle this value references, recursively.
    fn refs(&self, out: &mut Vec<HandleRef>);

    /// Drops references to `handles` of `kind`, recursively.
    fn prune(&mut self, kind: RecordKind, handles: &[Handle]);

    /// Appends custom type labels, tagged with their vocabulary.
    fn labels(&self, _out: &mut Vec<(Vocabulary, String)>) {}

    /// The primary record this sub-object points at, if it is a reference.
    fn target(&self) -> Option<(RecordKind, &Handle)> {
        None
    }
}

impl<T: Walk> Walk for Vec<T> {
    fn refs(&self, out: &mut Vec<HandleRef>) {
        for item in self {
            item.refs(out);
        }
    }

    fn prune(&mut self, kind: RecordKind, handles: &[Handle]) {
        self.retain(|item| match item.target() {
            Some((k, h)) => !(k == kind && handles.contains(h)),
            None => true,
        });
        for item in self.iter_mut() {
            item.prune(kind, handles);
        }
    }

    fn labels(&self, out: &mut Vec<(Vocabulary, String)>) {
        for item in self {
            item.labels(out);
        }
    }
}

pub(crate) fn push_list(out: &mut Vec<HandleRef>, kind: RecordKind, list: &[Handle]) {
    out.extend(list.iter().filter(|h| !h.is_empty()).map(|h| (kind, h.clone())));
}

pub(crate) fn push_opt(out: &mut Vec<HandleRef>, kind: RecordKind, handle: Option<&Handle>) {
    if let Some(h) = handle.filter(|h| !h.is_empty()) {
        out.push((kind, h.clone()));
    }
}

/// Removes `handles` from `list` when `kind` matches `list_kind`.
pub(crate) fn prune_list(
    list: &mut Vec<Handle>,
    list_kind: RecordKind,
    kind: RecordKind,
    handles: &[Handle],
) {
    if kind == list_kind {
        list.retain(|h| !handles.contains(h));
    }
}

pub(crate) fn prune_opt(
    slot: &mut Option<Handle>,
    slot_kind: RecordKind,
    kind: RecordKind,
    handles: &[Handle],
) {
    if kind == slot_kind && slot.as_ref().is_some_and(|h| handles.contains(h)) {
        *slot = None;
    }
}

pub(crate) fn push_label(out: &mut Vec<(Vocabulary, String)>, vocab: Vocabulary, label: &TypeLabel) {
    if let Some(custom) = label.custom_label() {
        out.push((vocab, custom.to_string()));
    }
}
