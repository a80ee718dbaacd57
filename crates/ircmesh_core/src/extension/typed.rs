//! Typed descriptors built on the raw slot contract.
//!
//! # Responsibility
//! - Give components typed get/set/unset over one value type.
//! - Keep release logic inside the descriptor that knows the type.
//! - Map value types to text forms through small `ValueCodec` types.
//!
//! # Invariants
//! - `set`/`unset` release replaced values through `delete`.
//! - `replace`/`take` hand values back to the caller instead.
//! - Decoding that fails leaves the slot untouched.

use super::extensible::Extensible;
use super::item::{validate_item_name, ExtensionItem, ItemMeta};
use super::kind::ExtensionKind;
use super::ExtensionError;
use crate::component::ComponentRef;
use log::{debug, error, warn};
use std::any::Any;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

/// Text conversions for one attached value type.
///
/// Only the network pair needs implementing for a replicated value; the
/// internal and human forms fall back to it.
pub trait ValueCodec<T>: 'static {
    fn encode_network(_value: &T) -> String {
        String::new()
    }

    /// `None` means "same as the network form".
    fn encode_internal(_value: &T) -> Option<String> {
        None
    }

    /// `None` means "network form, or internal form when that is empty".
    fn encode_human(_value: &T) -> Option<String> {
        None
    }

    fn decode_network(_text: &str) -> Option<T> {
        None
    }

    fn decode_internal(text: &str) -> Option<T> {
        Self::decode_network(text)
    }
}

/// Values that never leave the process and are never persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOnly;

impl<T> ValueCodec<T> for LocalOnly {}

/// Plain string values, replicated verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl ValueCodec<String> for StringCodec {
    fn encode_network(value: &String) -> String {
        value.clone()
    }

    fn decode_network(text: &str) -> Option<String> {
        Some(text.to_string())
    }
}

/// Signed integer values in decimal.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntCodec;

impl ValueCodec<i64> for IntCodec {
    fn encode_network(value: &i64) -> String {
        value.to_string()
    }

    fn decode_network(text: &str) -> Option<i64> {
        text.trim().parse().ok()
    }
}

/// Descriptor holding one value of type `T` per entity.
pub struct SimpleExtItem<T, C = LocalOnly> {
    meta: ItemMeta,
    _marker: PhantomData<fn() -> (T, C)>,
}

impl<T: 'static, C: ValueCodec<T>> SimpleExtItem<T, C> {
    pub fn new(
        creator: &ComponentRef,
        name: &str,
        kind: ExtensionKind,
    ) -> Result<Rc<Self>, ExtensionError> {
        validate_item_name(name)?;
        Ok(Rc::new_cyclic(|weak: &Weak<Self>| {
            let handle: Weak<dyn ExtensionItem> = weak.clone();
            Self {
                meta: ItemMeta::new(creator, name, kind, handle),
                _marker: PhantomData,
            }
        }))
    }

    pub fn get<'a>(&self, container: &'a Extensible) -> Option<&'a T> {
        self.get_raw(container)?.downcast_ref::<T>()
    }

    pub fn get_mut<'a>(&self, container: &'a mut Extensible) -> Option<&'a mut T> {
        self.get_raw_mut(container)?.downcast_mut::<T>()
    }

    /// Stores `value`, releasing any previous value through `delete`.
    ///
    /// Returns whether a previous value was replaced.
    pub fn set(&self, container: &mut Extensible, value: T) -> Result<bool, ExtensionError> {
        match self.set_raw(container, Box::new(value))? {
            Some(previous) => {
                self.delete(container, previous);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stores `value` and hands the previous value back to the caller.
    pub fn replace(
        &self,
        container: &mut Extensible,
        value: T,
    ) -> Result<Option<T>, ExtensionError> {
        let previous = self.set_raw(container, Box::new(value))?;
        Ok(previous.and_then(|previous| self.downcast_owned(previous)))
    }

    /// Removes and releases the value. Returns whether one was present.
    pub fn unset(&self, container: &mut Extensible) -> bool {
        match self.unset_raw(container) {
            Some(value) => {
                self.delete(container, value);
                true
            }
            None => false,
        }
    }

    /// Removes the value and hands it back without releasing it.
    pub fn take(&self, container: &mut Extensible) -> Option<T> {
        let value = self.unset_raw(container)?;
        self.downcast_owned(value)
    }

    fn downcast_owned(&self, value: Box<dyn Any>) -> Option<T> {
        match value.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(_) => {
                error!(
                    "event=ext_type_mismatch module=extension status=error item={}",
                    self.meta.name()
                );
                None
            }
        }
    }

    fn decode_into(&self, container: &mut Extensible, text: &str, decode: fn(&str) -> Option<T>) {
        if container.kind() != self.meta.kind() {
            return;
        }
        match decode(text) {
            Some(value) => {
                if let Err(err) = self.set(container, value) {
                    warn!(
                        "event=ext_decode_store module=extension status=error item={} error={}",
                        self.meta.name(),
                        err
                    );
                }
            }
            None => debug!(
                "event=ext_decode_rejected module=extension status=ignored item={} bytes={}",
                self.meta.name(),
                text.len()
            ),
        }
    }
}

impl<T: 'static, C: ValueCodec<T>> ExtensionItem for SimpleExtItem<T, C> {
    fn meta(&self) -> &ItemMeta {
        &self.meta
    }

    fn to_human(&self, container: &Extensible, value: &dyn Any) -> String {
        if let Some(human) = value.downcast_ref::<T>().and_then(C::encode_human) {
            return human;
        }
        let network = self.to_network(container, value);
        if network.is_empty() {
            self.to_internal(container, value)
        } else {
            network
        }
    }

    fn to_internal(&self, container: &Extensible, value: &dyn Any) -> String {
        value
            .downcast_ref::<T>()
            .and_then(C::encode_internal)
            .unwrap_or_else(|| self.to_network(container, value))
    }

    fn to_network(&self, _container: &Extensible, value: &dyn Any) -> String {
        value
            .downcast_ref::<T>()
            .map(C::encode_network)
            .unwrap_or_default()
    }

    fn from_internal(&self, container: &mut Extensible, value: &str) {
        self.decode_into(container, value, C::decode_internal);
    }

    fn from_network(&self, container: &mut Extensible, value: &str) {
        self.decode_into(container, value, C::decode_network);
    }
}

/// Presence flag: set means `true`, absent means `false`.
pub struct BoolExtItem {
    meta: ItemMeta,
}

impl BoolExtItem {
    pub fn new(
        creator: &ComponentRef,
        name: &str,
        kind: ExtensionKind,
    ) -> Result<Rc<Self>, ExtensionError> {
        validate_item_name(name)?;
        Ok(Rc::new_cyclic(|weak: &Weak<Self>| {
            let handle: Weak<dyn ExtensionItem> = weak.clone();
            Self {
                meta: ItemMeta::new(creator, name, kind, handle),
            }
        }))
    }

    pub fn get(&self, container: &Extensible) -> bool {
        self.get_raw(container).is_some()
    }

    pub fn set(&self, container: &mut Extensible) -> Result<(), ExtensionError> {
        if let Some(previous) = self.set_raw(container, Box::new(true))? {
            self.delete(container, previous);
        }
        Ok(())
    }

    pub fn unset(&self, container: &mut Extensible) -> bool {
        match self.unset_raw(container) {
            Some(value) => {
                self.delete(container, value);
                true
            }
            None => false,
        }
    }
}

impl ExtensionItem for BoolExtItem {
    fn meta(&self) -> &ItemMeta {
        &self.meta
    }

    fn to_human(&self, _container: &Extensible, _value: &dyn Any) -> String {
        "true".to_string()
    }

    fn to_network(&self, _container: &Extensible, _value: &dyn Any) -> String {
        "1".to_string()
    }

    fn from_network(&self, container: &mut Extensible, value: &str) {
        if container.kind() != self.meta.kind() {
            return;
        }
        if value == "1" {
            if let Err(err) = self.set(container) {
                warn!(
                    "event=ext_decode_store module=extension status=error item={} error={}",
                    self.meta.name(),
                    err
                );
            }
        } else {
            self.unset(container);
        }
    }
}

type ReleaseHook<T> = Box<dyn Fn(&mut Extensible, T)>;

/// Composite descriptor holding a list of `T` per entity.
///
/// Releasing the list walks every element through the release hook before
/// the list itself is freed.
pub struct ListExtItem<T, C = LocalOnly> {
    meta: ItemMeta,
    release: Option<ReleaseHook<T>>,
    _marker: PhantomData<fn() -> C>,
}

impl<T: 'static, C: ValueCodec<T>> ListExtItem<T, C> {
    pub fn new(
        creator: &ComponentRef,
        name: &str,
        kind: ExtensionKind,
    ) -> Result<Rc<Self>, ExtensionError> {
        Self::build(creator, name, kind, None)
    }

    /// Like [`ListExtItem::new`], with a hook run for every released element.
    pub fn with_release(
        creator: &ComponentRef,
        name: &str,
        kind: ExtensionKind,
        release: impl Fn(&mut Extensible, T) + 'static,
    ) -> Result<Rc<Self>, ExtensionError> {
        Self::build(creator, name, kind, Some(Box::new(release)))
    }

    fn build(
        creator: &ComponentRef,
        name: &str,
        kind: ExtensionKind,
        release: Option<ReleaseHook<T>>,
    ) -> Result<Rc<Self>, ExtensionError> {
        validate_item_name(name)?;
        Ok(Rc::new_cyclic(|weak: &Weak<Self>| {
            let handle: Weak<dyn ExtensionItem> = weak.clone();
            Self {
                meta: ItemMeta::new(creator, name, kind, handle),
                release,
                _marker: PhantomData,
            }
        }))
    }

    pub fn get<'a>(&self, container: &'a Extensible) -> Option<&'a [T]> {
        self.get_raw(container)?
            .downcast_ref::<Vec<T>>()
            .map(Vec::as_slice)
    }

    pub fn len(&self, container: &Extensible) -> usize {
        self.get(container).map_or(0, <[T]>::len)
    }

    pub fn get_mut<'a>(&self, container: &'a mut Extensible) -> Option<&'a mut [T]> {
        self.get_raw_mut(container)?
            .downcast_mut::<Vec<T>>()
            .map(Vec::as_mut_slice)
    }

    /// Appends one element, creating the list on first use.
    pub fn push(&self, container: &mut Extensible, value: T) -> Result<(), ExtensionError> {
        if let Some(list) = self
            .get_raw_mut(container)
            .and_then(|raw| raw.downcast_mut::<Vec<T>>())
        {
            list.push(value);
            return Ok(());
        }
        self.set_raw(container, Box::new(vec![value]))?;
        Ok(())
    }

    /// Removes and releases every element matching `predicate`.
    ///
    /// An emptied list is removed from the entity. Returns the number of
    /// released elements.
    pub fn remove_where(
        &self,
        container: &mut Extensible,
        mut predicate: impl FnMut(&T) -> bool,
    ) -> usize {
        let Some(list) = self
            .get_raw_mut(container)
            .and_then(|raw| raw.downcast_mut::<Vec<T>>())
        else {
            return 0;
        };

        let (removed, kept): (Vec<T>, Vec<T>) =
            std::mem::take(list).into_iter().partition(|value| predicate(value));
        *list = kept;
        let emptied = list.is_empty();

        let released = removed.len();
        for value in removed {
            self.release_one(container, value);
        }
        if emptied {
            self.unset(container);
        }
        released
    }

    /// Removes and releases the whole list. Returns whether one was present.
    pub fn unset(&self, container: &mut Extensible) -> bool {
        match self.unset_raw(container) {
            Some(value) => {
                self.delete(container, value);
                true
            }
            None => false,
        }
    }

    fn release_one(&self, container: &mut Extensible, value: T) {
        match &self.release {
            Some(release) => release(container, value),
            None => drop(value),
        }
    }
}

impl<T: 'static, C: ValueCodec<T>> ExtensionItem for ListExtItem<T, C> {
    fn meta(&self) -> &ItemMeta {
        &self.meta
    }

    fn delete(&self, container: &mut Extensible, value: Box<dyn Any>) {
        let list = match value.downcast::<Vec<T>>() {
            Ok(list) => list,
            Err(_) => {
                error!(
                    "event=ext_type_mismatch module=extension status=error item={}",
                    self.meta.name()
                );
                return;
            }
        };
        let count = list.len();
        for element in *list {
            self.release_one(container, element);
        }
        debug!(
            "event=ext_list_release module=extension status=ok item={} released={}",
            self.meta.name(),
            count
        );
    }

    fn to_human(&self, _container: &Extensible, value: &dyn Any) -> String {
        Self::encode_list(value, |element| {
            C::encode_human(element).unwrap_or_else(|| {
                let network = C::encode_network(element);
                if network.is_empty() {
                    C::encode_internal(element).unwrap_or_default()
                } else {
                    network
                }
            })
        })
    }

    fn to_internal(&self, _container: &Extensible, value: &dyn Any) -> String {
        Self::encode_list(value, |element| {
            C::encode_internal(element).unwrap_or_else(|| C::encode_network(element))
        })
    }

    fn to_network(&self, _container: &Extensible, value: &dyn Any) -> String {
        Self::encode_list(value, C::encode_network)
    }

    fn from_internal(&self, container: &mut Extensible, value: &str) {
        self.decode_into(container, value, C::decode_internal);
    }

    fn from_network(&self, container: &mut Extensible, value: &str) {
        self.decode_into(container, value, C::decode_network);
    }
}

impl<T: 'static, C: ValueCodec<T>> ListExtItem<T, C> {
    /// Space-joined element forms; elements with an empty form are skipped.
    fn encode_list(value: &dyn Any, encode: impl Fn(&T) -> String) -> String {
        let Some(list) = value.downcast_ref::<Vec<T>>() else {
            return String::new();
        };
        list.iter()
            .map(encode)
            .filter(|encoded| !encoded.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn decode_into(&self, container: &mut Extensible, text: &str, decode: fn(&str) -> Option<T>) {
        if container.kind() != self.meta.kind() {
            return;
        }
        let decoded: Vec<T> = text.split_whitespace().filter_map(decode).collect();
        if decoded.is_empty() {
            debug!(
                "event=ext_decode_rejected module=extension status=ignored item={} bytes={}",
                self.meta.name(),
                text.len()
            );
            return;
        }
        match self.set_raw(container, Box::new(decoded)) {
            Ok(Some(previous)) => self.delete(container, previous),
            Ok(None) => {}
            Err(err) => warn!(
                "event=ext_decode_store module=extension status=error item={} error={}",
                self.meta.name(),
                err
            ),
        }
    }
}
