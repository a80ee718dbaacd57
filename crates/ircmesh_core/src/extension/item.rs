//! Extension descriptor contract.
//!
//! # Responsibility
//! - Describe one kind of attached data: its name, owner and entity kind.
//! - Own the raw slot operations and the text conversion hooks.
//!
//! # Invariants
//! - Every descriptor is allocated behind an `Rc` and knows a weak handle to
//!   itself, so entities can keep it alive while they still hold its values.
//! - Descriptor identity (`ItemId`) is unique per construction, never per name.
//! - Once unregistered, a descriptor never stores a value or registers again.
//!
//! # Text forms
//! - network: replicated verbatim to other servers, empty means "local only".
//! - internal: persisted locally, defaults to the network form.
//! - human: shown to operators, defaults to network then internal.

use super::extensible::Extensible;
use super::kind::ExtensionKind;
use super::registry::ExtensionManager;
use super::ExtensionError;
use crate::component::{Component, ComponentRef};
use crate::lifecycle::UseGuard;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};
use uuid::Uuid;

static ITEM_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_.-]*$").expect("valid item name regex"));

/// Identity of one descriptor instance.
pub type ItemId = Uuid;

/// Service category marker carried by every descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Metadata,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
        }
    }
}

/// Checks a descriptor name before construction.
pub fn validate_item_name(name: &str) -> Result<(), ExtensionError> {
    if ITEM_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ExtensionError::InvalidName(name.to_string()))
    }
}

/// Fields shared by every descriptor implementation.
pub struct ItemMeta {
    id: ItemId,
    name: String,
    kind: ExtensionKind,
    handle: Weak<dyn ExtensionItem>,
    revoked: Cell<bool>,
    // Dropped before `creator` so the component never sees itself freed in use.
    _in_use: UseGuard,
    creator: ComponentRef,
}

impl ItemMeta {
    /// Builds descriptor metadata from inside `Rc::new_cyclic`.
    ///
    /// `name` must already have passed [`validate_item_name`].
    pub fn new(
        creator: &ComponentRef,
        name: &str,
        kind: ExtensionKind,
        handle: Weak<dyn ExtensionItem>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind,
            handle,
            revoked: Cell::new(false),
            _in_use: creator.enter_use(),
            creator: Rc::clone(creator),
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ExtensionKind {
        self.kind
    }

    pub fn creator(&self) -> &Component {
        &self.creator
    }

    pub fn service(&self) -> ServiceKind {
        ServiceKind::Metadata
    }

    /// Whether the owning component has unregistered this descriptor.
    pub fn is_revoked(&self) -> bool {
        self.revoked.get()
    }

    pub(crate) fn revoke(&self) {
        self.revoked.set(true);
    }

    /// Strong handle to the descriptor owning this metadata.
    pub fn handle(&self) -> Option<Rc<dyn ExtensionItem>> {
        self.handle.upgrade()
    }
}

impl fmt::Debug for ItemMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemMeta")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("creator", &self.creator.name())
            .field("revoked", &self.revoked.get())
            .finish()
    }
}

/// One kind of data that components attach to extensible entities.
///
/// Implementors provide [`ExtensionItem::meta`] and override the release and
/// conversion hooks they need. The raw slot operations are provided and are
/// meant for typed wrappers, not for general callers.
pub trait ExtensionItem: 'static {
    fn meta(&self) -> &ItemMeta;

    /// Releases one value previously attached through this descriptor.
    fn delete(&self, container: &mut Extensible, value: Box<dyn Any>) {
        let _ = container;
        drop(value);
    }

    fn to_human(&self, container: &Extensible, value: &dyn Any) -> String {
        let network = self.to_network(container, value);
        if network.is_empty() {
            self.to_internal(container, value)
        } else {
            network
        }
    }

    fn to_internal(&self, container: &Extensible, value: &dyn Any) -> String {
        self.to_network(container, value)
    }

    fn to_network(&self, _container: &Extensible, _value: &dyn Any) -> String {
        String::new()
    }

    fn from_internal(&self, container: &mut Extensible, value: &str) {
        self.from_network(container, value);
    }

    /// Default accepts and ignores any text.
    fn from_network(&self, _container: &mut Extensible, _value: &str) {}

    fn get_raw<'a>(&self, container: &'a Extensible) -> Option<&'a dyn Any> {
        container.slot(self.meta().id())
    }

    fn get_raw_mut<'a>(&self, container: &'a mut Extensible) -> Option<&'a mut dyn Any> {
        container.slot_mut(self.meta().id())
    }

    /// Stores `value`, returning the previous value without releasing it.
    fn set_raw(
        &self,
        container: &mut Extensible,
        value: Box<dyn Any>,
    ) -> Result<Option<Box<dyn Any>>, ExtensionError> {
        let meta = self.meta();
        if meta.is_revoked() {
            return Err(ExtensionError::Unregistered(meta.name().to_string()));
        }
        let handle = meta
            .handle()
            .ok_or_else(|| ExtensionError::DetachedItem(meta.name().to_string()))?;
        container.insert_slot(handle, value)
    }

    /// Removes the value, returning it without releasing it.
    fn unset_raw(&self, container: &mut Extensible) -> Option<Box<dyn Any>> {
        container.remove_slot(self.meta().id())
    }

    /// Makes the descriptor resolvable by name.
    fn register(&self, manager: &mut ExtensionManager) -> Result<(), ExtensionError> {
        let meta = self.meta();
        if meta.is_revoked() {
            return Err(ExtensionError::Unregistered(meta.name().to_string()));
        }
        let handle = meta
            .handle()
            .ok_or_else(|| ExtensionError::DetachedItem(meta.name().to_string()))?;
        if !manager.register(handle) {
            return Err(ExtensionError::DuplicateName(meta.name().to_string()));
        }
        info!(
            "event=ext_register module=extension status=ok item={} kind={} service={} component={}",
            meta.name(),
            meta.kind().as_str(),
            meta.service().as_str(),
            meta.creator().name()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_item_name, ExtensionItem, ItemMeta, ServiceKind};
    use crate::component::Component;
    use crate::extension::{ExtensionError, ExtensionKind, ExtensionManager, Extensible};
    use std::any::Any;
    use std::rc::{Rc, Weak};

    struct PlainItem {
        meta: ItemMeta,
    }

    impl ExtensionItem for PlainItem {
        fn meta(&self) -> &ItemMeta {
            &self.meta
        }
    }

    fn plain_item(name: &str) -> Rc<PlainItem> {
        let component = Component::new("m_plain");
        Rc::new_cyclic(|weak: &Weak<PlainItem>| {
            let handle: Weak<dyn ExtensionItem> = weak.clone();
            PlainItem {
                meta: ItemMeta::new(&component, name, ExtensionKind::Connection, handle),
            }
        })
    }

    #[test]
    fn accepts_lowercase_names_with_separators() {
        for name in ["ssl_cert", "no-ssl-cert", "invite.list", "x1"] {
            validate_item_name(name).expect("valid item name");
        }
    }

    #[test]
    fn rejects_malformed_names() {
        for name in ["", "SSL", "has space", "-leading"] {
            let err = validate_item_name(name).expect_err("invalid name must fail");
            assert_eq!(err, ExtensionError::InvalidName(name.to_string()));
        }
    }

    #[test]
    fn default_conversions_are_all_empty() {
        let item = plain_item("plain");
        let container = Extensible::new(ExtensionKind::Connection);
        let value: Box<dyn Any> = Box::new(17_u8);

        assert_eq!(item.to_network(&container, value.as_ref()), "");
        assert_eq!(item.to_internal(&container, value.as_ref()), "");
        assert_eq!(item.to_human(&container, value.as_ref()), "");
    }

    #[test]
    fn default_from_network_ignores_input() {
        let item = plain_item("plain");
        let mut container = Extensible::new(ExtensionKind::Connection);
        item.from_network(&mut container, "anything at all");
        item.from_internal(&mut container, "anything at all");
        assert!(container.is_empty());
        container.cull();
    }

    #[test]
    fn raw_set_returns_previous_value_once() {
        let item = plain_item("plain");
        let mut container = Extensible::new(ExtensionKind::Connection);

        let first = item
            .set_raw(&mut container, Box::new(1_u32))
            .expect("first set");
        assert!(first.is_none());

        let previous = item
            .set_raw(&mut container, Box::new(2_u32))
            .expect("second set")
            .expect("previous value");
        assert_eq!(previous.downcast_ref::<u32>(), Some(&1));

        let current = item.get_raw(&container).expect("current value");
        assert_eq!(current.downcast_ref::<u32>(), Some(&2));

        let removed = item.unset_raw(&mut container).expect("removed value");
        assert_eq!(removed.downcast_ref::<u32>(), Some(&2));
        assert!(item.get_raw(&container).is_none());
        container.cull();
    }

    #[test]
    fn register_rejects_second_descriptor_with_same_name() {
        let mut manager = ExtensionManager::new();
        let first = plain_item("plain");
        let second = plain_item("plain");

        first.register(&mut manager).expect("first registration");
        let err = second
            .register(&mut manager)
            .expect_err("duplicate registration must fail");
        assert_eq!(err, ExtensionError::DuplicateName("plain".to_string()));

        let resolved = manager.get_item("plain").expect("registered item");
        assert_eq!(resolved.meta().id(), first.meta().id());
    }

    #[test]
    fn descriptors_are_metadata_services() {
        let item = plain_item("plain");
        assert_eq!(item.meta().service(), ServiceKind::Metadata);
        assert_eq!(item.meta().service().as_str(), "metadata");
        assert!(!item.meta().is_revoked());
    }

    #[test]
    fn revoked_descriptor_refuses_values_and_registration() {
        let item = plain_item("plain");
        let mut container = Extensible::new(ExtensionKind::Connection);
        item.meta().revoke();

        let err = item
            .set_raw(&mut container, Box::new(3_u32))
            .expect_err("revoked descriptor must not store");
        assert_eq!(err, ExtensionError::Unregistered("plain".to_string()));
        assert!(container.is_empty());

        let mut manager = ExtensionManager::new();
        let err = item
            .register(&mut manager)
            .expect_err("revoked descriptor must not register");
        assert_eq!(err.to_string(), "extension was unregistered: plain");
        assert!(manager.is_empty());
        container.cull();
    }
}
