//! Store Module - External state store contract and a reducer implementation.
//!
//! Nodes never own store internals: they only subscribe. The [`Store`] trait
//! is the whole surface the propagation engine consumes - synchronous
//! delivery of new states, an optional allow-list of action kinds, and a
//! cleanup closure to unsubscribe.
//!
//! [`ReducerStore`] is a concrete collaborator (reducer + dispatch) used by
//! the integration tests and available to applications that do not bring
//! their own store.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

// =============================================================================
// Store Contract
// =============================================================================

/// External, subscribable source of state updates.
///
/// `subscribe` must invoke `on_state` synchronously for every relevant state
/// change. When `actions` is `Some`, only changes caused by one of the listed
/// action kinds are relevant; when `None`, every change is delivered.
///
/// The returned closure unsubscribes. It must be safe to call exactly once;
/// callers store it as `Option<Box<dyn FnOnce()>>` and `take()` it.
pub trait Store {
    /// State snapshot delivered to subscribers.
    type State: Clone + 'static;
    /// Discriminant used for delivery filtering.
    type ActionKind: Clone + PartialEq + 'static;

    fn subscribe(
        &self,
        on_state: Rc<dyn Fn(Self::State)>,
        actions: Option<&[Self::ActionKind]>,
    ) -> Box<dyn FnOnce()>;
}

/// An action dispatched into a [`ReducerStore`].
///
/// The kind is what subscription filters match against; the payload rides
/// along inside the action value itself.
pub trait StoreAction: 'static {
    type Kind: Clone + PartialEq + 'static;

    fn kind(&self) -> Self::Kind;
}

// =============================================================================
// Reducer Store
// =============================================================================

struct Subscriber<S, K> {
    id: usize,
    on_state: Rc<dyn Fn(S)>,
    filter: Option<Vec<K>>,
}

/// Reducer-driven store: `dispatch` runs the reducer against the current
/// state and synchronously notifies every subscriber whose filter matches
/// the action's kind.
///
/// State starts as `None`; the reducer receives the previous state (if any)
/// and the action, and returns the next state.
pub struct ReducerStore<S, A: StoreAction> {
    reducer: Box<dyn Fn(Option<S>, &A) -> S>,
    state: RefCell<Option<S>>,
    subscribers: Rc<RefCell<Vec<Subscriber<S, A::Kind>>>>,
    next_id: Cell<usize>,
}

impl<S: Clone + 'static, A: StoreAction> ReducerStore<S, A> {
    pub fn new(reducer: impl Fn(Option<S>, &A) -> S + 'static) -> Self {
        Self {
            reducer: Box::new(reducer),
            state: RefCell::new(None),
            subscribers: Rc::new(RefCell::new(Vec::new())),
            next_id: Cell::new(0),
        }
    }

    /// Current state, if any action has been dispatched yet.
    pub fn state(&self) -> Option<S> {
        self.state.borrow().clone()
    }

    /// Run the reducer and notify matching subscribers.
    ///
    /// The subscriber list is snapshotted before delivery so callbacks may
    /// subscribe or unsubscribe without poisoning the iteration.
    pub fn dispatch(&self, action: A) {
        let previous = self.state.borrow_mut().take();
        let next = (self.reducer)(previous, &action);
        *self.state.borrow_mut() = Some(next.clone());

        let kind = action.kind();
        let matching: Vec<Rc<dyn Fn(S)>> = self
            .subscribers
            .borrow()
            .iter()
            .filter(|s| match &s.filter {
                Some(kinds) => kinds.contains(&kind),
                None => true,
            })
            .map(|s| s.on_state.clone())
            .collect();

        for on_state in matching {
            on_state(next.clone());
        }
    }

    /// Number of live subscriptions (used by tests to assert teardown).
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl<S: Clone + 'static, A: StoreAction> Store for ReducerStore<S, A> {
    type State = S;
    type ActionKind = A::Kind;

    fn subscribe(
        &self,
        on_state: Rc<dyn Fn(S)>,
        actions: Option<&[A::Kind]>,
    ) -> Box<dyn FnOnce()> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        self.subscribers.borrow_mut().push(Subscriber {
            id,
            on_state,
            filter: actions.map(|kinds| kinds.to_vec()),
        });

        let subscribers: Weak<RefCell<Vec<Subscriber<S, A::Kind>>>> =
            Rc::downgrade(&self.subscribers);
        Box::new(move || {
            if let Some(subscribers) = subscribers.upgrade() {
                subscribers.borrow_mut().retain(|s| s.id != id);
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
