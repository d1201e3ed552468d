//! Component Registry - explicit, instance-scoped component definitions.
//!
//! Hosting applications register component configurations by name and
//! instantiate nodes from them. Registration is register-if-absent: defining
//! an already-defined name is an idempotent no-op, so repeated
//! initialization calls are safe. There is no process-wide registry and no
//! import-time side effect.

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;

use crate::element::ComponentConfig;
use crate::store::Store;
use crate::tree::NodeRef;

/// Name the default component definition registers under.
pub const DEFAULT_COMPONENT: &str = "context-node";

/// Named component definitions for one application.
pub struct ComponentRegistry<C: 'static, St: Store + 'static> {
    definitions: RefCell<HashMap<String, ComponentConfig<St>>>,
    _context: PhantomData<fn() -> C>,
}

impl<C: 'static, St: Store + 'static> ComponentRegistry<C, St> {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            definitions: RefCell::new(HashMap::new()),
            _context: PhantomData,
        }
    }

    /// Registry with the default component pre-registered.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.define(DEFAULT_COMPONENT, ComponentConfig::default());
        registry
    }

    /// Register `config` under `name` unless the name is taken. Returns
    /// whether the definition was inserted.
    pub fn define(&self, name: &str, config: ComponentConfig<St>) -> bool {
        let mut definitions = self.definitions.borrow_mut();
        if definitions.contains_key(name) {
            return false;
        }
        definitions.insert(name.to_string(), config);
        true
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.borrow().contains_key(name)
    }

    /// Instantiate a component node from the definition under `name`.
    pub fn create(&self, name: &str) -> Option<NodeRef<C, St>> {
        let config = self.definitions.borrow().get(name).cloned()?;
        Some(NodeRef::component(config))
    }
}

impl<C: 'static, St: Store + 'static> Default for ComponentRegistry<C, St> {
    fn default() -> Self {
        Self::new()
    }
}
