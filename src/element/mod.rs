//! Element Module - the protocol core carried by component nodes.
//!
//! [`ElementCore`] ties the pieces together: the lifecycle state machine,
//! the attribute monitor, the listener registry, and the two inherited-value
//! slots (context and store) with their descendant update feeds. The tree
//! module drives it through `attached` / `detached` / `attribute_changed`;
//! everything else is propagation logic.
//!
//! All state is interior-mutable behind short-lived borrows: every
//! notification dispatch snapshots its callback list first, so user
//! callbacks may freely re-enter the node they were notified by.

pub mod attributes;
pub mod events;
pub mod lifecycle;
pub mod resolver;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::store::Store;
use crate::tree::{walk, NodeId, NodeInner};

use attributes::AttributeMonitor;
use events::{Listener, ListenerRegistry, Notification, NotificationKind};
use lifecycle::{AttachOutcome, Lifecycle};
use resolver::{InheritedSlot, Subscribers};

// =============================================================================
// Configuration
// =============================================================================

/// When the render trigger fires for a store (re)connection.
///
/// The historical behaviour differs between revisions of this logic, so it
/// is a per-component policy rather than a fixed contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPolicy {
    /// Render immediately after StoreConnected, before any state arrives.
    #[default]
    OnStoreConnect,
    /// Render only once the first state is delivered by the subscription.
    AfterFirstState,
}

/// Per-component-type configuration, fixed at construction.
pub struct ComponentConfig<St: Store> {
    /// Attribute names the component snapshots and re-renders on.
    pub observed_attributes: Vec<String>,
    /// Allow-list of action kinds passed to the store subscription.
    /// `None` means every state change is delivered.
    pub observed_actions: Option<Vec<St::ActionKind>>,
    /// Store-(re)connection render behaviour.
    pub render_policy: RenderPolicy,
}

impl<St: Store> Default for ComponentConfig<St> {
    fn default() -> Self {
        Self {
            observed_attributes: Vec::new(),
            observed_actions: None,
            render_policy: RenderPolicy::default(),
        }
    }
}

impl<St: Store> Clone for ComponentConfig<St> {
    fn clone(&self) -> Self {
        Self {
            observed_attributes: self.observed_attributes.clone(),
            observed_actions: self.observed_actions.clone(),
            render_policy: self.render_policy,
        }
    }
}

// =============================================================================
// Element Core
// =============================================================================

/// Protocol state for one component node.
pub(crate) struct ElementCore<C: 'static, St: Store + 'static> {
    id: NodeId,
    node: Weak<NodeInner<C, St>>,
    lifecycle: RefCell<Lifecycle>,
    context: RefCell<InheritedSlot<Rc<C>>>,
    store: RefCell<InheritedSlot<Rc<St>>>,
    state: RefCell<Option<St::State>>,
    monitor: RefCell<AttributeMonitor>,
    listeners: RefCell<ListenerRegistry<C, St>>,
    /// Update feed for descendants resolved against this node's context.
    pub(crate) context_feed: Subscribers<Option<Rc<C>>>,
    /// Update feed for descendants resolved against this node's store.
    pub(crate) store_feed: Subscribers<Option<Rc<St>>>,
    store_release: RefCell<Option<Box<dyn FnOnce()>>>,
    observed_actions: Option<Vec<St::ActionKind>>,
    render_policy: RenderPolicy,
}

impl<C: 'static, St: Store + 'static> ElementCore<C, St> {
    pub(crate) fn new(id: NodeId, config: ComponentConfig<St>, node: Weak<NodeInner<C, St>>) -> Self {
        Self {
            id,
            node,
            lifecycle: RefCell::new(Lifecycle::new()),
            context: RefCell::new(InheritedSlot::new()),
            store: RefCell::new(InheritedSlot::new()),
            state: RefCell::new(None),
            monitor: RefCell::new(AttributeMonitor::new(&config.observed_attributes)),
            listeners: RefCell::new(ListenerRegistry::new()),
            context_feed: Subscribers::new(),
            store_feed: Subscribers::new(),
            store_release: RefCell::new(None),
            observed_actions: config.observed_actions,
            render_policy: config.render_policy,
        }
    }

    // =========================================================================
    // Lifecycle entry points (driven by the tree)
    // =========================================================================

    pub(crate) fn attached(&self) {
        let outcome = self.lifecycle.borrow_mut().attach();
        debug!(node = %self.id, ?outcome, "node attached");

        if outcome == AttachOutcome::FirstAttach {
            self.emit(Notification::Initialised);
        }
        self.emit(Notification::Connected);

        if let Some(node) = self.node.upgrade() {
            self.monitor
                .borrow_mut()
                .refresh(|name| node.attributes.borrow().get(name).cloned());
        }

        self.resolve_store();
        self.connect_to_store();
    }

    pub(crate) fn detached(&self) {
        self.lifecycle.borrow_mut().detach();
        debug!(node = %self.id, "node detached");

        self.emit(Notification::Disconnected);

        // Tear down the store subscription first, then both ancestor
        // subscriptions. Each release is idempotent.
        self.disconnect_store(false);
        self.context.borrow_mut().invalidate();
        self.store.borrow_mut().invalidate();
    }

    pub(crate) fn attribute_changed(
        &self,
        name: &str,
        old: Option<String>,
        new: Option<String>,
    ) {
        if !self.monitor.borrow().watches(name) {
            return;
        }

        let old = old.filter(|v| !v.is_empty());
        let new = new.filter(|v| !v.is_empty());
        self.emit(Notification::AttributeChanged {
            name: name.to_string(),
            old,
            new: new.clone(),
        });

        self.monitor.borrow_mut().record(name, new);
        self.render();
    }

    // =========================================================================
    // Context
    // =========================================================================

    /// Effective context: own value first, otherwise the lazily resolved
    /// inherited value. A first-time resolution with a defined result
    /// propagates immediately, as if an update had just arrived.
    pub(crate) fn context(&self) -> Option<Rc<C>> {
        let newly = self.resolve_context();
        let value = self.context.borrow().effective();
        if newly && value.is_some() {
            self.context_changed();
        }
        value
    }

    pub(crate) fn set_context(&self, value: Option<Rc<C>>) {
        self.context.borrow_mut().set_own(value);
        self.context_changed();
    }

    /// Walk upward and attach to the nearest provider. Quiet: performs no
    /// notification of its own. Returns whether a new resolution was made.
    fn resolve_context(&self) -> bool {
        {
            let slot = self.context.borrow();
            if slot.own.is_some() || slot.is_resolved() {
                return false;
            }
        }
        let Some(node) = self.node.upgrade() else {
            return false;
        };
        let Some(provider) = walk::find_provider(&node) else {
            trace!(node = %self.id, "context resolution found no provider");
            return false;
        };
        let Some(provider_core) = provider.core.as_ref() else {
            return false;
        };
        trace!(node = %self.id, provider = %provider_core.id, "context resolved");

        let value = provider_core.effective_context_quiet();

        let weak = self.node.clone();
        let id = provider_core.context_feed.subscribe(Rc::new(move |context| {
            if let Some(node) = weak.upgrade() {
                if let Some(core) = node.core.as_ref() {
                    core.ancestor_context_changed(context.clone());
                }
            }
        }));

        let weak_provider = Rc::downgrade(&provider);
        let release = Box::new(move || {
            if let Some(provider) = weak_provider.upgrade() {
                if let Some(core) = provider.core.as_ref() {
                    core.context_feed.unsubscribe(id);
                }
            }
        });
        self.context.borrow_mut().adopt(value, release);
        true
    }

    /// Resolve and read without propagating. Used when the read is internal
    /// (a descendant resolving through this node, or a render payload).
    fn effective_context_quiet(&self) -> Option<Rc<C>> {
        self.resolve_context();
        self.context.borrow().effective()
    }

    /// The provider this node resolved against changed its effective value.
    fn ancestor_context_changed(&self, context: Option<Rc<C>>) {
        {
            let mut slot = self.context.borrow_mut();
            if slot.own.is_some() {
                return;
            }
            slot.resolved = context;
        }
        self.context_changed();
    }

    /// Propagate an effective-context change: notification, descendant
    /// feed, render.
    fn context_changed(&self) {
        let effective = self.context.borrow().effective();
        self.emit(Notification::ContextUpdated {
            context: effective.clone(),
        });
        self.context_feed.notify(&effective);
        self.render();
    }

    // =========================================================================
    // Store
    // =========================================================================

    /// Effective store handle, resolved lazily like the context. A
    /// first-time resolution with a defined result connects the
    /// subscription and propagates.
    pub(crate) fn store(&self) -> Option<Rc<St>> {
        let newly = self.resolve_store();
        let value = self.store.borrow().effective();
        if newly && value.is_some() {
            self.store_changed();
        }
        value
    }

    pub(crate) fn set_store(&self, value: Option<Rc<St>>) {
        self.store.borrow_mut().set_own(value);
        self.store_changed();
    }

    pub(crate) fn state(&self) -> Option<St::State> {
        self.state.borrow().clone()
    }

    fn resolve_store(&self) -> bool {
        {
            let slot = self.store.borrow();
            if slot.own.is_some() || slot.is_resolved() {
                return false;
            }
        }
        let Some(node) = self.node.upgrade() else {
            return false;
        };
        let Some(provider) = walk::find_provider(&node) else {
            trace!(node = %self.id, "store resolution found no provider");
            return false;
        };
        let Some(provider_core) = provider.core.as_ref() else {
            return false;
        };
        trace!(node = %self.id, provider = %provider_core.id, "store resolved");

        let value = provider_core.effective_store_quiet();

        let weak = self.node.clone();
        let id = provider_core.store_feed.subscribe(Rc::new(move |store| {
            if let Some(node) = weak.upgrade() {
                if let Some(core) = node.core.as_ref() {
                    core.ancestor_store_changed(store.clone());
                }
            }
        }));

        let weak_provider = Rc::downgrade(&provider);
        let release = Box::new(move || {
            if let Some(provider) = weak_provider.upgrade() {
                if let Some(core) = provider.core.as_ref() {
                    core.store_feed.unsubscribe(id);
                }
            }
        });
        self.store.borrow_mut().adopt(value, release);
        true
    }

    fn effective_store_quiet(&self) -> Option<Rc<St>> {
        self.resolve_store();
        self.store.borrow().effective()
    }

    fn ancestor_store_changed(&self, store: Option<Rc<St>>) {
        {
            let mut slot = self.store.borrow_mut();
            if slot.own.is_some() {
                return;
            }
            slot.resolved = store;
        }
        self.store_changed();
    }

    /// Propagate an effective-store change: reconnect the subscription from
    /// the cached effective handle, then notify descendants.
    fn store_changed(&self) {
        self.connect_to_store();
        let effective = self.store.borrow().effective();
        self.store_feed.notify(&effective);
    }

    /// (Re)connect the store subscription from the cached effective handle.
    ///
    /// Never walks: attach and the public getter drive resolution; an
    /// explicit `set_store(None)` therefore disconnects and leaves
    /// re-resolution to the next read, honouring the lazy contract.
    fn connect_to_store(&self) {
        let store = self.store.borrow().effective();
        let Some(store) = store else {
            // Effective store went away on a live node: disconnect renders.
            self.disconnect_store(true);
            return;
        };

        self.disconnect_store(false);
        debug!(node = %self.id, "store connected");

        let weak = self.node.clone();
        let on_state: Rc<dyn Fn(St::State)> = Rc::new(move |state| {
            if let Some(node) = weak.upgrade() {
                if let Some(core) = node.core.as_ref() {
                    core.state_delivered(state);
                }
            }
        });
        let release = store.subscribe(on_state, self.observed_actions.as_deref());
        *self.store_release.borrow_mut() = Some(release);

        self.emit(Notification::StoreConnected {
            store: store.clone(),
        });
        if self.render_policy == RenderPolicy::OnStoreConnect {
            self.render();
        }
    }

    /// Release the store subscription, clear the state and signal the
    /// disconnection. Idempotent. `emit_render` is false when the
    /// disconnect is part of detach or of an immediate reconnection.
    fn disconnect_store(&self, emit_render: bool) {
        let release = self.store_release.borrow_mut().take();
        if let Some(release) = release {
            release();
            *self.state.borrow_mut() = None;
            debug!(node = %self.id, "store disconnected");
            self.emit(Notification::StoreDisconnected);
            if emit_render {
                self.render();
            }
        }
    }

    fn state_delivered(&self, state: St::State) {
        *self.state.borrow_mut() = Some(state);
        self.render();
    }

    // =========================================================================
    // Render Trigger
    // =========================================================================

    /// Emit a Render notification unless the node has never been attached.
    ///
    /// The context in the payload is resolved quietly: payload construction
    /// never cascades a second propagation.
    fn render(&self) {
        if !self.lifecycle.borrow().is_initialised() {
            return;
        }
        self.resolve_context();
        let state = self.state.borrow().clone();
        let context = self.context.borrow().effective();
        let attributes = self.monitor.borrow().snapshot();
        self.emit(Notification::Render {
            state,
            context,
            attributes,
        });
    }

    // =========================================================================
    // Observer surface
    // =========================================================================

    pub(crate) fn is_initialised(&self) -> bool {
        self.lifecycle.borrow().is_initialised()
    }

    pub(crate) fn monitored_attributes(&self) -> HashMap<String, Option<String>> {
        self.monitor.borrow().snapshot()
    }

    pub(crate) fn observed_actions(&self) -> Option<Vec<St::ActionKind>> {
        self.observed_actions.clone()
    }

    pub(crate) fn add_listener(
        &self,
        kind: NotificationKind,
        listener: Listener<C, St>,
        use_capture: bool,
    ) {
        self.listeners.borrow_mut().register(kind, listener, use_capture);
    }

    pub(crate) fn remove_listener(
        &self,
        kind: NotificationKind,
        listener: &Listener<C, St>,
        use_capture: bool,
    ) {
        self.listeners.borrow_mut().unregister(kind, listener, use_capture);
    }

    pub(crate) fn clear_listeners(&self, kind: Option<NotificationKind>) {
        self.listeners.borrow_mut().clear(kind);
    }

    pub(crate) fn dispatch_host_event(&self, kind: &'static str) {
        self.emit(Notification::Host { kind });
    }

    fn emit(&self, notification: Notification<C, St>) {
        let listeners = self.listeners.borrow().snapshot(notification.kind());
        for listener in listeners {
            listener(&notification);
        }
    }
}
