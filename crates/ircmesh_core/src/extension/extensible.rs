//! Per-entity attachment storage.
//!
//! # Responsibility
//! - Map descriptor identity to one type-erased value.
//! - Release every attached value through its descriptor when culled.
//!
//! # Invariants
//! - At most one value per descriptor.
//! - The map is empty and `culled` is set before the entity is freed;
//!   anything else is reported as a missed cull.

use super::item::{ExtensionItem, ItemId};
use super::kind::ExtensionKind;
use super::ExtensionError;
use crate::lifecycle::{CullResult, Cullable};
use log::{debug, warn};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

struct Slot {
    item: Rc<dyn ExtensionItem>,
    value: Box<dyn Any>,
}

/// Attachment storage embedded in every extensible entity.
pub struct Extensible {
    kind: ExtensionKind,
    slots: BTreeMap<ItemId, Slot>,
    culled: bool,
}

impl Extensible {
    pub fn new(kind: ExtensionKind) -> Self {
        Self {
            kind,
            slots: BTreeMap::new(),
            culled: false,
        }
    }

    pub fn kind(&self) -> ExtensionKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_culled(&self) -> bool {
        self.culled
    }

    pub fn contains(&self, item: &dyn ExtensionItem) -> bool {
        self.slots.contains_key(&item.meta().id())
    }

    /// Names of the descriptors holding a value here, sorted.
    pub fn item_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .values()
            .map(|slot| slot.item.meta().name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Occupied slots as `(descriptor, value)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&Rc<dyn ExtensionItem>, &dyn Any)> {
        self.slots
            .values()
            .map(|slot| (&slot.item, slot.value.as_ref()))
    }

    pub(crate) fn slot(&self, id: ItemId) -> Option<&dyn Any> {
        self.slots.get(&id).map(|slot| slot.value.as_ref())
    }

    pub(crate) fn slot_mut(&mut self, id: ItemId) -> Option<&mut dyn Any> {
        self.slots.get_mut(&id).map(|slot| slot.value.as_mut())
    }

    pub(crate) fn insert_slot(
        &mut self,
        item: Rc<dyn ExtensionItem>,
        value: Box<dyn Any>,
    ) -> Result<Option<Box<dyn Any>>, ExtensionError> {
        let meta = item.meta();
        if meta.kind() != self.kind {
            return Err(ExtensionError::KindMismatch {
                item: meta.name().to_string(),
                expected: meta.kind(),
                actual: self.kind,
            });
        }
        if self.culled {
            warn!(
                "event=ext_set_after_cull module=extension status=warn item={} ptr={:p}",
                meta.name(),
                self as *const Self
            );
        }

        let id = meta.id();
        match self.slots.get_mut(&id) {
            Some(slot) => Ok(Some(std::mem::replace(&mut slot.value, value))),
            None => {
                self.slots.insert(id, Slot { item, value });
                Ok(None)
            }
        }
    }

    pub(crate) fn remove_slot(&mut self, id: ItemId) -> Option<Box<dyn Any>> {
        self.slots.remove(&id).map(|slot| slot.value)
    }

    /// Releases the values of the given descriptors, typically every
    /// descriptor of a component that is being unloaded.
    ///
    /// Returns the number of values released.
    pub fn unhook_extensions(&mut self, items: &[Rc<dyn ExtensionItem>]) -> usize {
        let mut released = 0;
        for item in items {
            if let Some(slot) = self.slots.remove(&item.meta().id()) {
                item.delete(self, slot.value);
                released += 1;
            }
        }
        released
    }

    /// Releases every attached value through its descriptor.
    ///
    /// Runs one pass. Values a delete hook attaches during that pass are
    /// dropped without their hook and reported as `ext_attach_during_cull`.
    /// Returns the number of values released through a hook.
    pub fn free_all_ext_items(&mut self) -> usize {
        let mut released = 0;
        let slots = std::mem::take(&mut self.slots);
        for (_, slot) in slots {
            slot.item.delete(self, slot.value);
            released += 1;
        }

        if !self.slots.is_empty() {
            let leftover = std::mem::take(&mut self.slots);
            warn!(
                "event=ext_attach_during_cull module=extension status=warn kind={} leftover={} items={}",
                self.kind.as_str(),
                leftover.len(),
                leftover
                    .values()
                    .map(|slot| slot.item.meta().name())
                    .collect::<Vec<_>>()
                    .join(",")
            );
        }
        released
    }

    /// Releases all attachments and marks this entity as culled.
    pub fn cull(&mut self) -> CullResult {
        if self.culled {
            warn!(
                "event=extensible_double_cull module=extension status=warn kind={} ptr={:p}",
                self.kind.as_str(),
                self as *const Self
            );
        }
        let released = self.free_all_ext_items();
        self.culled = true;
        debug!(
            "event=extensible_cull module=extension status=ok kind={} released={}",
            self.kind.as_str(),
            released
        );
        CullResult::Done
    }
}

impl Cullable for Extensible {
    fn cull(&mut self) -> CullResult {
        Extensible::cull(self)
    }
}

impl Drop for Extensible {
    fn drop(&mut self) {
        if !self.slots.is_empty() || !self.culled {
            warn!(
                "event=extensible_drop_without_cull module=extension status=warn kind={} ptr={:p} attached={}",
                self.kind.as_str(),
                self as *const Self,
                self.slots.len()
            );
        }
    }
}

impl fmt::Debug for Extensible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensible")
            .field("kind", &self.kind)
            .field("items", &self.item_names())
            .field("culled", &self.culled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Extensible;
    use crate::component::Component;
    use crate::extension::{ExtensionError, ExtensionItem, ExtensionKind, ItemMeta};
    use crate::lifecycle::CullResult;
    use std::any::Any;
    use std::cell::{Cell, RefCell};
    use std::rc::{Rc, Weak};

    /// Descriptor that records every value handed to `delete`.
    struct RecordingItem {
        meta: ItemMeta,
        deleted: RefCell<Vec<u32>>,
    }

    impl ExtensionItem for RecordingItem {
        fn meta(&self) -> &ItemMeta {
            &self.meta
        }

        fn delete(&self, _container: &mut Extensible, value: Box<dyn Any>) {
            let value = value.downcast::<u32>().expect("recording item stores u32");
            self.deleted.borrow_mut().push(*value);
        }
    }

    fn recording_item(name: &str, kind: ExtensionKind) -> Rc<RecordingItem> {
        let component = Component::new("m_record");
        Rc::new_cyclic(|weak: &Weak<RecordingItem>| {
            let handle: Weak<dyn ExtensionItem> = weak.clone();
            RecordingItem {
                meta: ItemMeta::new(&component, name, kind, handle),
                deleted: RefCell::new(Vec::new()),
            }
        })
    }

    #[test]
    fn cull_deletes_each_value_exactly_once() {
        let items: Vec<Rc<RecordingItem>> = (0..3)
            .map(|index| recording_item(&format!("slot{index}"), ExtensionKind::Channel))
            .collect();
        let mut channel = Extensible::new(ExtensionKind::Channel);
        for (index, item) in items.iter().enumerate() {
            item.set_raw(&mut channel, Box::new(index as u32 * 10))
                .expect("set on matching kind");
        }
        assert_eq!(channel.len(), 3);

        assert_eq!(channel.cull(), CullResult::Done);
        assert!(channel.is_empty());
        assert!(channel.is_culled());
        for (index, item) in items.iter().enumerate() {
            assert_eq!(*item.deleted.borrow(), vec![index as u32 * 10]);
        }
    }

    /// Descriptor whose delete hook always stores a fresh value again.
    struct ReattachingItem {
        meta: ItemMeta,
        deletes: Cell<u32>,
    }

    impl ExtensionItem for ReattachingItem {
        fn meta(&self) -> &ItemMeta {
            &self.meta
        }

        fn delete(&self, container: &mut Extensible, _value: Box<dyn Any>) {
            let next = self.deletes.get() + 1;
            self.deletes.set(next);
            self.set_raw(container, Box::new(next))
                .expect("same kind accepts the value");
        }
    }

    #[test]
    fn cull_stops_when_delete_hook_reattaches() {
        let component = Component::new("m_sticky");
        let item = Rc::new_cyclic(|weak: &Weak<ReattachingItem>| {
            let handle: Weak<dyn ExtensionItem> = weak.clone();
            ReattachingItem {
                meta: ItemMeta::new(&component, "sticky", ExtensionKind::Connection, handle),
                deletes: Cell::new(0),
            }
        });
        let mut connection = Extensible::new(ExtensionKind::Connection);
        item.set_raw(&mut connection, Box::new(0_u32)).expect("set");

        assert_eq!(connection.cull(), CullResult::Done);
        assert_eq!(item.deletes.get(), 1);
        assert!(connection.is_empty());
        assert!(connection.is_culled());
    }

    #[test]
    fn set_rejects_entity_of_other_kind() {
        let item = recording_item("chan_only", ExtensionKind::Channel);
        let mut connection = Extensible::new(ExtensionKind::Connection);

        let err = item
            .set_raw(&mut connection, Box::new(1_u32))
            .expect_err("kind mismatch must fail");
        assert!(matches!(err, ExtensionError::KindMismatch { .. }));
        assert!(connection.is_empty());
        connection.cull();
    }

    #[test]
    fn unhook_only_touches_listed_descriptors() {
        let kept = recording_item("kept", ExtensionKind::Connection);
        let dropped = recording_item("dropped", ExtensionKind::Connection);
        let mut connection = Extensible::new(ExtensionKind::Connection);
        kept.set_raw(&mut connection, Box::new(1_u32)).expect("set kept");
        dropped
            .set_raw(&mut connection, Box::new(2_u32))
            .expect("set dropped");

        let handle: Rc<dyn ExtensionItem> = dropped.clone();
        assert_eq!(connection.unhook_extensions(&[handle]), 1);

        assert_eq!(*dropped.deleted.borrow(), vec![2]);
        assert!(kept.deleted.borrow().is_empty());
        assert_eq!(connection.item_names(), vec!["kept".to_string()]);
        connection.cull();
        assert_eq!(*kept.deleted.borrow(), vec![1]);
    }

    #[test]
    fn unset_raw_does_not_invoke_delete() {
        let item = recording_item("raw", ExtensionKind::Connection);
        let mut connection = Extensible::new(ExtensionKind::Connection);
        item.set_raw(&mut connection, Box::new(9_u32)).expect("set");

        let value = item.unset_raw(&mut connection).expect("value present");
        assert_eq!(value.downcast_ref::<u32>(), Some(&9));
        assert!(item.deleted.borrow().is_empty());
        connection.cull();
    }

    #[test]
    fn second_cull_is_diagnosed_not_fatal() {
        let mut channel = Extensible::new(ExtensionKind::Channel);
        assert_eq!(channel.cull(), CullResult::Done);
        assert_eq!(channel.cull(), CullResult::Done);
        assert!(channel.is_culled());
    }
}
