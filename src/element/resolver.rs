//! Inherited Value Resolver - slot and subscriber feed primitives.
//!
//! The same pattern is instantiated twice, once for context and once for
//! store handles: an [`InheritedSlot`] holds the explicitly assigned value,
//! the cached ancestor resolution and the release closure for the ancestor
//! subscription; a [`Subscribers`] feed carries the provider-side update
//! notifications that invalidate downstream caches.
//!
//! The upward walk that fills these slots lives in `tree::walk`; the
//! orchestration (propagation, render triggering) lives in `element`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

// =============================================================================
// Inherited Slot
// =============================================================================

/// One inheritable value slot: `effective = own ?? resolved`.
///
/// `release` holds the cleanup for the ancestor subscription backing
/// `resolved`. Its presence is the cache indicator: while a subscription is
/// live the slot never re-walks, even when the provider's effective value is
/// `None`.
pub(crate) struct InheritedSlot<T> {
    pub(crate) own: Option<T>,
    pub(crate) resolved: Option<T>,
    release: Option<Box<dyn FnOnce()>>,
}

impl<T: Clone> InheritedSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            own: None,
            resolved: None,
            release: None,
        }
    }

    /// Cached effective value: own value first, inherited second. Never
    /// triggers resolution.
    pub(crate) fn effective(&self) -> Option<T> {
        self.own.clone().or_else(|| self.resolved.clone())
    }

    /// Whether an ancestor subscription is live.
    pub(crate) fn is_resolved(&self) -> bool {
        self.release.is_some()
    }

    /// Store the result of a successful walk.
    pub(crate) fn adopt(&mut self, value: Option<T>, release: Box<dyn FnOnce()>) {
        self.resolved = value;
        self.release = Some(release);
    }

    /// Release the ancestor subscription and clear the cache. Idempotent.
    pub(crate) fn invalidate(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
        self.resolved = None;
    }

    /// Assign the explicit value. A defined value releases any ancestor
    /// subscription first; clearing only removes the short-circuit and
    /// leaves re-resolution to the next read.
    pub(crate) fn set_own(&mut self, value: Option<T>) {
        if value.is_some() {
            self.invalidate();
        }
        self.own = value;
    }
}

// =============================================================================
// Subscriber Feed
// =============================================================================

/// Update feed a provider exposes to the descendants resolved against it.
///
/// Entries are tagged with numeric ids so release closures can unsubscribe
/// without holding the callback itself. Notification snapshots the entry
/// list first: callbacks may subscribe or unsubscribe re-entrantly.
pub(crate) struct Subscribers<T> {
    entries: RefCell<Vec<(usize, Rc<dyn Fn(&T)>)>>,
    next_id: Cell<usize>,
}

impl<T> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub(crate) fn subscribe(&self, callback: Rc<dyn Fn(&T)>) -> usize {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push((id, callback));
        id
    }

    /// Remove the entry with `id`. No-op when already gone.
    pub(crate) fn unsubscribe(&self, id: usize) {
        self.entries.borrow_mut().retain(|(entry_id, _)| *entry_id != id);
    }

    pub(crate) fn notify(&self, value: &T) {
        let callbacks: Vec<Rc<dyn Fn(&T)>> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

// =============================================================================
// Tests
// =============================================================================
