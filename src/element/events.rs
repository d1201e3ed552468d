//! Events Module - notification kinds, payloads, and the listener registry.
//!
//! Notification kinds are a fixed enum rather than arbitrary strings, with
//! [`NotificationKind::Host`] as a pass-through bucket for host-native event
//! kinds. The registry owns the duplicate-suppression guarantee: registering
//! the same listener reference with the same capture flag twice is a no-op,
//! so every emitted notification is delivered at most once per listener.

use std::collections::HashMap;
use std::rc::Rc;

use crate::store::Store;

// =============================================================================
// Notification Kinds
// =============================================================================

/// Registration key for listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// First attachment completed. Emitted once per node.
    Initialised,
    /// Node entered a connected tree.
    Connected,
    /// Node left a connected tree.
    Disconnected,
    /// A monitored attribute changed.
    AttributeChanged,
    /// The effective context changed (own or inherited).
    ContextUpdated,
    /// A store subscription was established.
    StoreConnected,
    /// The store subscription was released.
    StoreDisconnected,
    /// The node should re-derive its visible output.
    Render,
    /// Pass-through bucket for host-native event kinds.
    Host(&'static str),
}

/// Notification payload delivered to listeners.
pub enum Notification<C, St: Store> {
    Initialised,
    Connected,
    Disconnected,
    AttributeChanged {
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
    ContextUpdated {
        context: Option<Rc<C>>,
    },
    StoreConnected {
        store: Rc<St>,
    },
    StoreDisconnected,
    Render {
        state: Option<St::State>,
        context: Option<Rc<C>>,
        attributes: HashMap<String, Option<String>>,
    },
    Host {
        kind: &'static str,
    },
}

impl<C, St: Store> Notification<C, St> {
    /// The registration key this notification is delivered under.
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::Initialised => NotificationKind::Initialised,
            Notification::Connected => NotificationKind::Connected,
            Notification::Disconnected => NotificationKind::Disconnected,
            Notification::AttributeChanged { .. } => NotificationKind::AttributeChanged,
            Notification::ContextUpdated { .. } => NotificationKind::ContextUpdated,
            Notification::StoreConnected { .. } => NotificationKind::StoreConnected,
            Notification::StoreDisconnected => NotificationKind::StoreDisconnected,
            Notification::Render { .. } => NotificationKind::Render,
            Notification::Host { kind } => NotificationKind::Host(kind),
        }
    }
}

/// Externally attached observer callback.
pub type Listener<C, St> = Rc<dyn Fn(&Notification<C, St>)>;

// =============================================================================
// Listener Registry
// =============================================================================

struct Entry<C, St: Store> {
    listener: Listener<C, St>,
    use_capture: bool,
}

/// Deduplicated registry of typed listeners for one node.
///
/// Identity is `(kind, listener reference, capture flag)`; the listener
/// reference is compared by `Rc` pointer equality, matching the host
/// convention that the same callback reference registers only once.
pub(crate) struct ListenerRegistry<C, St: Store> {
    entries: HashMap<NotificationKind, Vec<Entry<C, St>>>,
}

impl<C, St: Store> ListenerRegistry<C, St> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Append an entry unless an identical one exists.
    pub(crate) fn register(
        &mut self,
        kind: NotificationKind,
        listener: Listener<C, St>,
        use_capture: bool,
    ) {
        let entries = self.entries.entry(kind).or_default();
        let duplicate = entries
            .iter()
            .any(|e| Rc::ptr_eq(&e.listener, &listener) && e.use_capture == use_capture);
        if !duplicate {
            entries.push(Entry {
                listener,
                use_capture,
            });
        }
    }

    /// Remove the matching entry, if any.
    pub(crate) fn unregister(
        &mut self,
        kind: NotificationKind,
        listener: &Listener<C, St>,
        use_capture: bool,
    ) {
        if let Some(entries) = self.entries.get_mut(&kind) {
            entries
                .retain(|e| !(Rc::ptr_eq(&e.listener, listener) && e.use_capture == use_capture));
            if entries.is_empty() {
                self.entries.remove(&kind);
            }
        }
    }

    /// Drop every entry of `kind`, or every entry of every kind.
    pub(crate) fn clear(&mut self, kind: Option<NotificationKind>) {
        match kind {
            Some(kind) => {
                self.entries.remove(&kind);
            }
            None => self.entries.clear(),
        }
    }

    /// Snapshot the listeners for `kind`: capture-phase entries first, then
    /// bubble entries, insertion order within each phase.
    ///
    /// Delivery happens outside the registry borrow so listeners can
    /// re-enter it (register, unregister, clear).
    pub(crate) fn snapshot(&self, kind: NotificationKind) -> Vec<Listener<C, St>> {
        let Some(entries) = self.entries.get(&kind) else {
            return Vec::new();
        };
        let mut listeners: Vec<Listener<C, St>> = entries
            .iter()
            .filter(|e| e.use_capture)
            .map(|e| e.listener.clone())
            .collect();
        listeners.extend(
            entries
                .iter()
                .filter(|e| !e.use_capture)
                .map(|e| e.listener.clone()),
        );
        listeners
    }

    #[cfg(test)]
    fn len(&self, kind: NotificationKind) -> usize {
        self.entries.get(&kind).map_or(0, |e| e.len())
    }
}

// =============================================================================
// Tests
// =============================================================================
