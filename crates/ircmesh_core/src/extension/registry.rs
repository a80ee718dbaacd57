//! Name-to-descriptor registry.
//!
//! # Responsibility
//! - Resolve descriptor names received from peers or from storage.
//! - Remove all descriptors of an unloading component in one pass.
//!
//! # Invariants
//! - A name maps to at most one descriptor; the first registration wins.
//! - A descriptor is resolvable only while it is valid to use.
//! - A descriptor removed by `begin_unregister` is revoked for good.

use super::item::ExtensionItem;
use crate::component::Component;
use log::info;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Process-scoped table of registered descriptors.
#[derive(Default)]
pub struct ExtensionManager {
    items: BTreeMap<String, Rc<dyn ExtensionItem>>,
}

impl ExtensionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `item` under its name. Returns `false` on a name collision,
    /// leaving the existing registration in place.
    pub fn register(&mut self, item: Rc<dyn ExtensionItem>) -> bool {
        let name = item.meta().name().to_string();
        if self.items.contains_key(name.as_str()) {
            return false;
        }
        self.items.insert(name, item);
        true
    }

    /// Removes and revokes every descriptor created by `component`, appending
    /// each one to `removed` so the caller can purge it from live entities.
    ///
    /// Returns the number of descriptors removed.
    pub fn begin_unregister(
        &mut self,
        component: &Component,
        removed: &mut Vec<Rc<dyn ExtensionItem>>,
    ) -> usize {
        let before = removed.len();
        let owner = component.id();
        self.items.retain(|_, item| {
            if item.meta().creator().id() == owner {
                item.meta().revoke();
                removed.push(Rc::clone(item));
                false
            } else {
                true
            }
        });

        let count = removed.len() - before;
        info!(
            "event=ext_unregister module=registry status=ok component={} removed={}",
            component.name(),
            count
        );
        count
    }

    pub fn get_item(&self, name: &str) -> Option<Rc<dyn ExtensionItem>> {
        self.items.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}

impl fmt::Debug for ExtensionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionManager")
            .field("items", &self.items.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ExtensionManager;
    use crate::component::Component;
    use crate::extension::{ExtensionItem, ExtensionKind, SimpleExtItem};
    use std::rc::Rc;

    #[test]
    fn register_keeps_first_on_collision() {
        let component = Component::new("m_test");
        let first = SimpleExtItem::<u8>::new(&component, "dup", ExtensionKind::Connection)
            .expect("first descriptor");
        let second = SimpleExtItem::<u8>::new(&component, "dup", ExtensionKind::Channel)
            .expect("second descriptor");

        let mut manager = ExtensionManager::new();
        assert!(manager.register(first.clone()));
        assert!(!manager.register(second));
        assert_eq!(manager.len(), 1);

        let resolved = manager.get_item("dup").expect("first stays registered");
        assert_eq!(resolved.meta().id(), first.meta().id());
        assert_eq!(resolved.meta().kind(), ExtensionKind::Connection);
    }

    #[test]
    fn begin_unregister_removes_only_owned_descriptors() {
        let leaving = Component::new("m_leaving");
        let staying = Component::new("m_staying");
        let mut manager = ExtensionManager::new();
        for name in ["a", "b"] {
            let item = SimpleExtItem::<u8>::new(&leaving, name, ExtensionKind::Connection)
                .expect("descriptor");
            item.register(&mut manager).expect("register");
        }
        let kept = SimpleExtItem::<u8>::new(&staying, "c", ExtensionKind::Channel)
            .expect("descriptor");
        kept.register(&mut manager).expect("register");

        let mut removed: Vec<Rc<dyn ExtensionItem>> = Vec::new();
        assert_eq!(manager.begin_unregister(&leaving, &mut removed), 2);

        let mut removed_names: Vec<&str> = removed.iter().map(|item| item.meta().name()).collect();
        removed_names.sort();
        assert_eq!(removed_names, vec!["a", "b"]);
        assert!(manager.get_item("a").is_none());
        assert!(manager.get_item("b").is_none());
        assert_eq!(manager.names(), vec!["c".to_string()]);
        assert!(removed.iter().all(|item| item.meta().is_revoked()));
        assert!(!kept.meta().is_revoked());
    }

    #[test]
    fn unknown_name_is_absent() {
        let manager = ExtensionManager::new();
        assert!(manager.get_item("missing").is_none());
        assert!(manager.is_empty());
    }
}
