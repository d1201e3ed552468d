//! # cascade-tree
//!
//! Hierarchical context and store propagation for retained UI node trees.
//!
//! Component nodes inherit two kinds of shared state from their ancestors
//! without any intermediate node threading it through explicitly:
//!
//! - a **context**: a reference-shared data object, and
//! - a **store**: an external, subscribable source of state updates,
//!   optionally filtered by action kind.
//!
//! Resolution is lazy: the first read walks upward (jumping from shadow
//! roots to their hosts) to the nearest protocol-capable ancestor, caches
//! the result and subscribes to that ancestor's updates. Detachment tears
//! every subscription down; reattachment re-resolves from the node's new
//! position. A render trigger folds the node's state, context and
//! attribute snapshot into one notification, emitted only once the node
//! has completed its first attachment.
//!
//! ## Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use cascade_tree::{ComponentConfig, NodeRef, NotificationKind};
//!
//! let document = NodeRef::document();
//! let provider = NodeRef::component(ComponentConfig::default());
//! let consumer = NodeRef::component(ComponentConfig::default());
//!
//! document.append_child(&provider)?;
//! provider.append_child(&consumer)?;
//!
//! provider.set_context(Some(Rc::new(AppTheme::dark())));
//! assert!(consumer.context().is_some()); // resolved from the ancestor
//! ```
//!
//! ## Modules
//!
//! - [`tree`] - the retained node tree (documents, containers, components,
//!   shadow roots) and its mutation surface
//! - [`element`] - the protocol core: lifecycle, listener registry,
//!   attribute monitor, inherited-value resolver, render trigger
//! - [`store`] - the store contract and a reducer-driven implementation
//! - [`registry`] - explicit, instance-scoped component definitions

pub mod element;
pub mod registry;
pub mod store;
pub mod tree;

pub use element::events::{Listener, Notification, NotificationKind};
pub use element::{ComponentConfig, RenderPolicy};
pub use registry::{ComponentRegistry, DEFAULT_COMPONENT};
pub use store::{ReducerStore, Store, StoreAction};
pub use tree::{NodeId, NodeKind, NodeRef, TreeError};
