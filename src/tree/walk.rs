//! Upward tree walks: connectedness, ancestry, and provider lookup.
//!
//! One step up from a shadow root is its host node; from anything else it is
//! the parent. The document node is the root boundary: a provider lookup
//! that reaches it without finding a protocol-capable node fails.

use std::rc::Rc;

use tracing::trace;

use crate::store::Store;

use super::{NodeInner, NodeKind};

/// One step of the upward walk. `None` when the walk leaves the tree.
pub(crate) fn step_up<C: 'static, St: Store + 'static>(
    node: &Rc<NodeInner<C, St>>,
) -> Option<Rc<NodeInner<C, St>>> {
    match node.kind {
        NodeKind::ShadowRoot => node.host.borrow().upgrade(),
        _ => node.parent.borrow().upgrade(),
    }
}

/// Whether the node is part of a tree rooted in a document.
pub(crate) fn is_connected<C: 'static, St: Store + 'static>(
    node: &Rc<NodeInner<C, St>>,
) -> bool {
    let mut current = node.clone();
    loop {
        if current.kind == NodeKind::Document {
            return true;
        }
        match step_up(&current) {
            Some(next) => current = next,
            None => return false,
        }
    }
}

/// Whether `candidate` is `node` itself or one of its ancestors (crossing
/// shadow boundaries). Used to reject cycle-creating insertions.
pub(crate) fn is_inclusive_ancestor<C: 'static, St: Store + 'static>(
    candidate: &Rc<NodeInner<C, St>>,
    node: &Rc<NodeInner<C, St>>,
) -> bool {
    let mut current = node.clone();
    loop {
        if Rc::ptr_eq(&current, candidate) {
            return true;
        }
        match step_up(&current) {
            Some(next) => current = next,
            None => return false,
        }
    }
}

/// Find the nearest protocol-capable ancestor of `start`.
///
/// The check is structural - any node carrying a protocol core qualifies,
/// regardless of its kind. Fails with `None` when the walk leaves the tree
/// or reaches the document root boundary.
pub(crate) fn find_provider<C: 'static, St: Store + 'static>(
    start: &Rc<NodeInner<C, St>>,
) -> Option<Rc<NodeInner<C, St>>> {
    let mut current = step_up(start)?;
    loop {
        if current.core.is_some() {
            trace!(start = %start.id, provider = %current.id, "provider found");
            return Some(current);
        }
        if current.kind == NodeKind::Document {
            return None;
        }
        current = step_up(&current)?;
    }
}
