//! Synchronous change notifications.
//!
//! The store emits a [`Signal`] strictly after a successful commit, undo
//! or redo. Listeners run in-process, in subscription order, on the
//! emitting thread.
//!
//! A listener that causes the same signal to be emitted again (for
//! example by emitting on a cloned bus) is not re-entered: the nested
//! emission is dropped with a warning.
//!
//! # Usage
//!
//! ```rust
//! use kindb_core::{EventBus, Signal, RecordKind};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! let bus = EventBus::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! let id = bus.connect(move |signal| {
//!     if matches!(signal, Signal::Added(RecordKind::Person, _)) {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     }
//! });
//! bus.emit(&Signal::Added(RecordKind::Person, vec![]));
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! assert!(bus.disconnect(id));
//! ```

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::model::{Handle, RecordKind};
use crate::types::SubscriptionId;

/// A change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Records were added.
    Added(RecordKind, Vec<Handle>),
    /// Records were updated.
    Updated(RecordKind, Vec<Handle>),
    /// Records were deleted.
    Deleted(RecordKind, Vec<Handle>),
    /// A kind changed wholesale (after a batch transaction or rebuild).
    Rebuilt(RecordKind),
    /// The store was opened.
    DatabaseOpened,
    /// The store was closed.
    DatabaseClosed,
    /// A transaction committed.
    TransactionCommitted {
        /// Its description.
        description: String,
        /// True for batch transactions.
        batch: bool,
    },
    /// A transaction was undone.
    UndoApplied {
        /// Description of the undone transaction.
        description: String,
    },
    /// A transaction was redone.
    RedoApplied {
        /// Description of the redone transaction.
        description: String,
    },
    /// A surname's grouping changed.
    PersonGroupnameRebuild {
        /// The surname.
        name: String,
        /// The new group, empty if the mapping was removed.
        group: String,
    },
    /// The bookmarks of a kind changed.
    BookmarksChanged(RecordKind),
}

impl Signal {
    /// Stable signal name, e.g. `person-add` or `database-opened`.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Added(kind, _) => format!("{}-add", kind.table()),
            Self::Updated(kind, _) => format!("{}-update", kind.table()),
            Self::Deleted(kind, _) => format!("{}-delete", kind.table()),
            Self::Rebuilt(kind) => format!("{}-rebuild", kind.table()),
            Self::DatabaseOpened => "database-opened".into(),
            Self::DatabaseClosed => "database-closed".into(),
            Self::TransactionCommitted { .. } => "transaction-committed".into(),
            Self::UndoApplied { .. } => "undo-applied".into(),
            Self::RedoApplied { .. } => "redo-applied".into(),
            Self::PersonGroupnameRebuild { .. } => "person-groupname-rebuild".into(),
            Self::BookmarksChanged(kind) => format!("{}-bookmarks-changed", kind.table()),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

type Listener = Arc<dyn Fn(&Signal) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    only: Option<String>,
    listener: Listener,
}

#[derive(Default)]
struct BusState {
    subscriptions: Vec<Subscription>,
    emitting: HashSet<String>,
    next_id: u64,
}

/// A registry of listeners.
///
/// Cloning a bus yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to every signal.
    pub fn connect<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe(None, Arc::new(listener))
    }

    /// Subscribes to signals with one name, such as `family-update`.
    pub fn connect_named<F>(&self, name: impl Into<String>, listener: F) -> SubscriptionId
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.subscribe(Some(name.into()), Arc::new(listener))
    }

    fn subscribe(&self, only: Option<String>, listener: Listener) -> SubscriptionId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        state.subscriptions.push(Subscription { id, only, listener });
        id
    }

    /// Removes a listener. Returns false if it was not subscribed.
    pub fn disconnect(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.lock();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.id != id);
        state.subscriptions.len() != before
    }

    /// Number of listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Delivers `signal` to every matching listener.
    ///
    /// Returns false if the signal was suppressed because it is already
    /// being emitted.
    pub fn emit(&self, signal: &Signal) -> bool {
        let name = signal.name();
        let listeners: Vec<Listener> = {
            let mut state = self.state.lock();
            if !state.emitting.insert(name.clone()) {
                drop(state);
                warn!(signal = %name, "suppressed re-entrant signal");
                return false;
            }
            state
                .subscriptions
                .iter()
                .filter(|s| s.only.as_deref().map_or(true, |only| only == name))
                .map(|s| Arc::clone(&s.listener))
                .collect()
        };
        for listener in listeners {
            listener(signal);
        }
        self.state.lock().emitting.remove(&name);
        true
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn names_follow_kind_and_operation() {
        assert_eq!(Signal::Added(RecordKind::Person, vec![]).name(), "person-add");
        assert_eq!(Signal::Deleted(RecordKind::Repository, vec![]).name(), "repository-delete");
        assert_eq!(Signal::Rebuilt(RecordKind::Note).name(), "note-rebuild");
        assert_eq!(Signal::DatabaseOpened.to_string(), "database-opened");
    }

    #[test]
    fn named_listeners_only_see_their_signal() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        bus.connect_named("family-update", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(&Signal::Updated(RecordKind::Person, vec![]));
        bus.emit(&Signal::Updated(RecordKind::Family, vec![]));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reentrant_emission_is_suppressed() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let inner_bus = bus.clone();
        let c = Arc::clone(&calls);
        bus.connect(move |signal| {
            c.fetch_add(1, Ordering::SeqCst);
            assert!(!inner_bus.emit(signal));
        });
        assert!(bus.emit(&Signal::DatabaseOpened));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // The guard is released afterwards.
        assert!(bus.emit(&Signal::DatabaseOpened));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn other_signals_may_nest() {
        let bus = EventBus::new();
        let inner_bus = bus.clone();
        let nested = Arc::new(AtomicUsize::new(0));
        let n = Arc::clone(&nested);
        bus.connect(move |signal| {
            if *signal == Signal::DatabaseOpened {
                inner_bus.emit(&Signal::DatabaseClosed);
            } else {
                n.fetch_add(1, Ordering::SeqCst);
            }
        });
        bus.emit(&Signal::DatabaseOpened);
        assert_eq!(nested.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disconnect_stops_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let id = bus.connect(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(bus.disconnect(id));
        assert!(!bus.disconnect(id));
        bus.emit(&Signal::DatabaseClosed);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
