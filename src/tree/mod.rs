//! Tree Module - the retained node tree the propagation engine runs on.
//!
//! Nodes come in four kinds: `Document` (root boundary), `Container` (plain
//! member), `Component` (protocol-capable, carries an element core) and
//! `ShadowRoot` (boundary node owned by a host). [`NodeRef`] is a cheap
//! handle; parents and shadow hosts are weak uplinks so subtrees are owned
//! top-down.
//!
//! Linking a subtree under a connected parent fires attach on every
//! protocol node of the subtree in ancestor-first order; unlinking fires
//! detach likewise. Re-parenting a node that already has a parent is
//! modeled as detach + attach.

pub(crate) mod walk;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use thiserror::Error;
use tracing::debug;

use crate::element::events::{Listener, NotificationKind};
use crate::element::{ComponentConfig, ElementCore};
use crate::store::Store;

// =============================================================================
// Identity
// =============================================================================

/// Per-node identity used for tracing and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

thread_local! {
    static NODE_ID_COUNTER: Cell<u64> = const { Cell::new(0) };
}

fn next_node_id() -> NodeId {
    NODE_ID_COUNTER.with(|counter| {
        let id = counter.get();
        counter.set(id + 1);
        NodeId(id)
    })
}

// =============================================================================
// Errors
// =============================================================================

/// Rejected tree mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("a document cannot be inserted below another node")]
    DocumentChild,
    #[error("a shadow root can only be created on a host, not inserted")]
    ShadowRootChild,
    #[error("node cannot be inserted into itself or its own subtree")]
    Cycle,
    #[error("node is not a child of this parent")]
    NotAChild,
    #[error("a shadow root is already attached to this node")]
    ShadowExists,
    #[error("this node kind cannot host a shadow root")]
    ShadowUnsupported,
}

// =============================================================================
// Nodes
// =============================================================================

/// Node kind, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Root boundary. Always connected.
    Document,
    /// Plain tree member without the protocol.
    Container,
    /// Protocol-capable node.
    Component,
    /// Shadow boundary node owned by its host.
    ShadowRoot,
}

pub(crate) struct NodeInner<C: 'static, St: Store + 'static> {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) parent: RefCell<Weak<NodeInner<C, St>>>,
    pub(crate) children: RefCell<Vec<Rc<NodeInner<C, St>>>>,
    pub(crate) shadow_root: RefCell<Option<Rc<NodeInner<C, St>>>>,
    pub(crate) host: RefCell<Weak<NodeInner<C, St>>>,
    pub(crate) attributes: RefCell<HashMap<String, String>>,
    pub(crate) core: Option<ElementCore<C, St>>,
}

/// Handle to a tree node. Clones share the node.
pub struct NodeRef<C: 'static, St: Store + 'static> {
    pub(crate) inner: Rc<NodeInner<C, St>>,
}

impl<C: 'static, St: Store + 'static> Clone for NodeRef<C, St> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: 'static, St: Store + 'static> fmt::Debug for NodeRef<C, St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

impl<C: 'static, St: Store + 'static> NodeRef<C, St> {
    fn plain(kind: NodeKind) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                id: next_node_id(),
                kind,
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                shadow_root: RefCell::new(None),
                host: RefCell::new(Weak::new()),
                attributes: RefCell::new(HashMap::new()),
                core: None,
            }),
        }
    }

    /// Create a document node: the root boundary of a connected tree.
    pub fn document() -> Self {
        Self::plain(NodeKind::Document)
    }

    /// Create a plain container node without the protocol.
    pub fn container() -> Self {
        Self::plain(NodeKind::Container)
    }

    /// Create a protocol-capable component node.
    pub fn component(config: ComponentConfig<St>) -> Self {
        let id = next_node_id();
        let inner = Rc::new_cyclic(|weak: &Weak<NodeInner<C, St>>| NodeInner {
            id,
            kind: NodeKind::Component,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            shadow_root: RefCell::new(None),
            host: RefCell::new(Weak::new()),
            attributes: RefCell::new(HashMap::new()),
            core: Some(ElementCore::new(id, config, weak.clone())),
        });
        Self { inner }
    }

    // =========================================================================
    // Structure
    // =========================================================================

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn kind(&self) -> NodeKind {
        self.inner.kind
    }

    pub fn parent(&self) -> Option<Self> {
        self.inner
            .parent
            .borrow()
            .upgrade()
            .map(|inner| Self { inner })
    }

    /// Host of a shadow root, `None` for other kinds.
    pub fn host(&self) -> Option<Self> {
        self.inner
            .host
            .borrow()
            .upgrade()
            .map(|inner| Self { inner })
    }

    pub fn children(&self) -> Vec<Self> {
        self.inner
            .children
            .borrow()
            .iter()
            .map(|inner| Self {
                inner: inner.clone(),
            })
            .collect()
    }

    pub fn shadow_root(&self) -> Option<Self> {
        self.inner
            .shadow_root
            .borrow()
            .as_ref()
            .map(|inner| Self {
                inner: inner.clone(),
            })
    }

    pub fn is_connected(&self) -> bool {
        walk::is_connected(&self.inner)
    }

    /// Append `child` under this node. A child that already has a parent is
    /// detached from it first. When this node is connected the whole new
    /// subtree attaches, ancestor-first.
    pub fn append_child(&self, child: &Self) -> Result<(), TreeError> {
        match child.inner.kind {
            NodeKind::Document => return Err(TreeError::DocumentChild),
            NodeKind::ShadowRoot => return Err(TreeError::ShadowRootChild),
            _ => {}
        }
        if walk::is_inclusive_ancestor(&child.inner, &self.inner) {
            return Err(TreeError::Cycle);
        }

        let old_parent = child.inner.parent.borrow().upgrade();
        if let Some(old_parent) = old_parent {
            let old_parent = Self { inner: old_parent };
            old_parent.remove_child(child)?;
        }

        *child.inner.parent.borrow_mut() = Rc::downgrade(&self.inner);
        self.inner.children.borrow_mut().push(child.inner.clone());
        debug!(parent = %self.inner.id, child = %child.inner.id, "child appended");

        if self.is_connected() {
            attach_subtree(&child.inner);
        }
        Ok(())
    }

    /// Remove `child` from this node. When the child was connected the
    /// whole subtree detaches.
    pub fn remove_child(&self, child: &Self) -> Result<(), TreeError> {
        let is_child = self
            .inner
            .children
            .borrow()
            .iter()
            .any(|c| Rc::ptr_eq(c, &child.inner));
        if !is_child {
            return Err(TreeError::NotAChild);
        }

        let was_connected = child.is_connected();
        self.inner
            .children
            .borrow_mut()
            .retain(|c| !Rc::ptr_eq(c, &child.inner));
        *child.inner.parent.borrow_mut() = Weak::new();
        debug!(parent = %self.inner.id, child = %child.inner.id, "child removed");

        if was_connected {
            detach_subtree(&child.inner);
        }
        Ok(())
    }

    /// Create a shadow root on this node. The shadow tree attaches and
    /// detaches with its host.
    pub fn attach_shadow(&self) -> Result<Self, TreeError> {
        match self.inner.kind {
            NodeKind::Document | NodeKind::ShadowRoot => {
                return Err(TreeError::ShadowUnsupported);
            }
            _ => {}
        }
        if self.inner.shadow_root.borrow().is_some() {
            return Err(TreeError::ShadowExists);
        }

        let root = Self::plain(NodeKind::ShadowRoot);
        *root.inner.host.borrow_mut() = Rc::downgrade(&self.inner);
        *self.inner.shadow_root.borrow_mut() = Some(root.inner.clone());
        Ok(root)
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.attributes.borrow().get(name).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        let old = self
            .inner
            .attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        if let Some(core) = self.inner.core.as_ref() {
            core.attribute_changed(name, old, Some(value.to_string()));
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        let old = self.inner.attributes.borrow_mut().remove(name);
        if old.is_some() {
            if let Some(core) = self.inner.core.as_ref() {
                core.attribute_changed(name, old, None);
            }
        }
    }

    // =========================================================================
    // Protocol surface (no-op / None on non-component nodes)
    // =========================================================================

    /// Effective context: own value first, otherwise the lazily resolved
    /// inherited value.
    pub fn context(&self) -> Option<Rc<C>> {
        self.inner.core.as_ref().and_then(|core| core.context())
    }

    pub fn set_context(&self, value: Option<Rc<C>>) {
        if let Some(core) = self.inner.core.as_ref() {
            core.set_context(value);
        }
    }

    /// Effective store handle: own handle first, otherwise inherited.
    pub fn store(&self) -> Option<Rc<St>> {
        self.inner.core.as_ref().and_then(|core| core.store())
    }

    pub fn set_store(&self, value: Option<Rc<St>>) {
        if let Some(core) = self.inner.core.as_ref() {
            core.set_store(value);
        }
    }

    /// Latest state pushed by the connected store, if any.
    pub fn state(&self) -> Option<St::State> {
        self.inner.core.as_ref().and_then(|core| core.state())
    }

    pub fn is_initialised(&self) -> bool {
        self.inner
            .core
            .as_ref()
            .is_some_and(|core| core.is_initialised())
    }

    pub fn monitored_attributes(&self) -> HashMap<String, Option<String>> {
        self.inner
            .core
            .as_ref()
            .map(|core| core.monitored_attributes())
            .unwrap_or_default()
    }

    pub fn observed_actions(&self) -> Option<Vec<St::ActionKind>> {
        self.inner
            .core
            .as_ref()
            .and_then(|core| core.observed_actions())
    }

    pub fn add_listener(
        &self,
        kind: NotificationKind,
        listener: Listener<C, St>,
        use_capture: bool,
    ) {
        if let Some(core) = self.inner.core.as_ref() {
            core.add_listener(kind, listener, use_capture);
        }
    }

    pub fn remove_listener(
        &self,
        kind: NotificationKind,
        listener: &Listener<C, St>,
        use_capture: bool,
    ) {
        if let Some(core) = self.inner.core.as_ref() {
            core.remove_listener(kind, listener, use_capture);
        }
    }

    /// Remove every listener of `kind`, or every listener of every kind.
    pub fn clear_listeners(&self, kind: Option<NotificationKind>) {
        if let Some(core) = self.inner.core.as_ref() {
            core.clear_listeners(kind);
        }
    }

    /// Deliver a host-native event kind to pass-through listeners.
    pub fn dispatch_host_event(&self, kind: &'static str) {
        if let Some(core) = self.inner.core.as_ref() {
            core.dispatch_host_event(kind);
        }
    }
}

// =============================================================================
// Attachment propagation
// =============================================================================

fn collect_subtree<C: 'static, St: Store + 'static>(
    node: &Rc<NodeInner<C, St>>,
    out: &mut Vec<Rc<NodeInner<C, St>>>,
) {
    out.push(node.clone());
    let shadow = node.shadow_root.borrow().clone();
    if let Some(shadow) = shadow {
        collect_subtree(&shadow, out);
    }
    let children: Vec<_> = node.children.borrow().clone();
    for child in &children {
        collect_subtree(child, out);
    }
}

/// Fire attach on every protocol node of the subtree, ancestor-first. The
/// node list is snapshotted up front: attach callbacks may mutate the tree.
fn attach_subtree<C: 'static, St: Store + 'static>(root: &Rc<NodeInner<C, St>>) {
    let mut nodes = Vec::new();
    collect_subtree(root, &mut nodes);
    for node in &nodes {
        if let Some(core) = node.core.as_ref() {
            core.attached();
        }
    }
}

/// Fire detach on every protocol node of the subtree, ancestor-first.
fn detach_subtree<C: 'static, St: Store + 'static>(root: &Rc<NodeInner<C, St>>) {
    let mut nodes = Vec::new();
    collect_subtree(root, &mut nodes);
    for node in &nodes {
        if let Some(core) = node.core.as_ref() {
            core.detached();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
