//! Keyed Mappings
//!
//! An [`Object`] owns an insertion-ordered table of properties. Each property
//! holds one of three slots:
//!
//! - plain data, written and read directly;
//! - a user accessor pair (getter and/or setter);
//! - a reactive accessor installed by the observation core.
//!
//! Reads and writes go through [`Object::get`] and [`Object::set`], so an
//! installed reactive accessor intercepts them without the caller changing
//! how it talks to the object.
//!
//! The property table lock is never held while a getter, setter, or
//! notification runs. Subscribers are free to read the same object again
//! from inside a notification.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::Value;
use crate::reactive::{ObserverHandle, ReactiveProperty};

/// A user-supplied property getter.
pub type Getter = Arc<dyn Fn() -> Value + Send + Sync>;

/// A user-supplied property setter.
pub type Setter = Arc<dyn Fn(Value) + Send + Sync>;

/// Attribute flags of an own property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyFlags {
    /// Listed by [`Object::keys`] and therefore walked by `observe`.
    pub enumerable: bool,
    /// Can be redefined (made reactive) or removed.
    pub configurable: bool,
    /// Data slots only: accepts assignment.
    pub writable: bool,
}

impl PropertyFlags {
    pub const fn hidden() -> Self {
        Self {
            enumerable: false,
            configurable: true,
            writable: true,
        }
    }

    pub const fn locked() -> Self {
        Self {
            enumerable: true,
            configurable: false,
            writable: false,
        }
    }
}

impl Default for PropertyFlags {
    fn default() -> Self {
        Self {
            enumerable: true,
            configurable: true,
            writable: true,
        }
    }
}

#[derive(Clone)]
pub(crate) enum Slot {
    Data(Value),
    Accessor {
        get: Option<Getter>,
        set: Option<Setter>,
    },
    Reactive(Arc<ReactiveProperty>),
}

#[derive(Clone)]
pub(crate) struct Property {
    pub(crate) slot: Slot,
    pub(crate) flags: PropertyFlags,
}

impl Property {
    pub(crate) fn data(value: Value) -> Self {
        Self {
            slot: Slot::Data(value),
            flags: PropertyFlags::default(),
        }
    }

    /// Read the property through whatever slot it holds.
    pub(crate) fn read(&self) -> Value {
        match &self.slot {
            Slot::Data(value) => value.clone(),
            Slot::Accessor { get, .. } => get.as_ref().map(|get| get()).unwrap_or_default(),
            Slot::Reactive(property) => property.get(),
        }
    }
}

struct ObjectInner {
    props: RwLock<IndexMap<String, Property>>,
    extensible: AtomicBool,
    /// Framework-internal instances are never observed.
    internal: bool,
    /// Hidden back-reference to this object's observer.
    observer: OnceLock<ObserverHandle>,
}

/// A shared, keyed mapping.
#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

impl Object {
    pub fn new() -> Self {
        Self::with_internal(false)
    }

    /// Create a framework-internal instance (e.g. a component's own state
    /// holder). Internal objects are never wrapped, and the escape-hatch
    /// operations refuse to add or delete keys on them.
    pub fn new_internal() -> Self {
        Self::with_internal(true)
    }

    fn with_internal(internal: bool) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                props: RwLock::new(IndexMap::new()),
                extensible: AtomicBool::new(true),
                internal,
                observer: OnceLock::new(),
            }),
        }
    }

    /// Builder-style insert of a plain data property.
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Read a property. Missing keys read as [`Value::Undefined`].
    pub fn get(&self, key: &str) -> Value {
        self.property(key).map(|p| p.read()).unwrap_or_default()
    }

    /// Assign a property.
    ///
    /// Existing properties route through their slot: reactive accessors
    /// notify, accessors without a setter and read-only data drop the write.
    /// New keys are added as plain (non-reactive) data when the object is
    /// extensible and dropped otherwise.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.property(key) {
            Some(Property {
                slot: Slot::Reactive(property),
                ..
            }) => property.set(value),
            Some(Property {
                slot: Slot::Accessor { set, .. },
                ..
            }) => {
                if let Some(set) = set {
                    set(value);
                }
            }
            Some(Property {
                slot: Slot::Data(_),
                flags,
            }) => {
                if !flags.writable {
                    return;
                }
                if let Some(Property {
                    slot: Slot::Data(current),
                    ..
                }) = self.inner.props.write().get_mut(key)
                {
                    *current = value;
                }
            }
            None => {
                if self.is_extensible() {
                    self.inner
                        .props
                        .write()
                        .entry(key.to_string())
                        .or_insert_with(|| Property::data(value));
                }
            }
        }
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.inner.props.read().contains_key(key)
    }

    /// Own enumerable keys, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .props
            .read()
            .iter()
            .filter(|(_, p)| p.flags.enumerable)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.props.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plain delete. Returns `false` if the key was missing or the property
    /// is not configurable. Does not notify anyone.
    pub fn remove(&self, key: &str) -> bool {
        let mut props = self.inner.props.write();
        match props.get(key) {
            Some(p) if p.flags.configurable => {
                props.shift_remove(key);
                true
            }
            _ => false,
        }
    }

    /// Define (or redefine) a data property with explicit flags.
    ///
    /// Returns `false` if an existing property is not configurable or a new
    /// key cannot be added.
    pub fn define_data(&self, key: &str, value: impl Into<Value>, flags: PropertyFlags) -> bool {
        self.define(
            key,
            Property {
                slot: Slot::Data(value.into()),
                flags,
            },
        )
    }

    /// Define (or redefine) an accessor property.
    pub fn define_accessor(
        &self,
        key: &str,
        get: Option<Getter>,
        set: Option<Setter>,
        flags: PropertyFlags,
    ) -> bool {
        self.define(
            key,
            Property {
                slot: Slot::Accessor { get, set },
                flags,
            },
        )
    }

    fn define(&self, key: &str, property: Property) -> bool {
        let mut props = self.inner.props.write();
        match props.get_mut(key) {
            Some(existing) if !existing.flags.configurable => false,
            Some(existing) => {
                *existing = property;
                true
            }
            None if self.is_extensible() => {
                props.insert(key.to_string(), property);
                true
            }
            None => false,
        }
    }

    pub fn prevent_extensions(&self) {
        self.inner.extensible.store(false, Ordering::SeqCst);
    }

    /// Make the object non-extensible and every property non-configurable.
    /// Data properties also become read-only.
    pub fn freeze(&self) {
        self.prevent_extensions();
        for property in self.inner.props.write().values_mut() {
            property.flags.configurable = false;
            if matches!(property.slot, Slot::Data(_)) {
                property.flags.writable = false;
            }
        }
    }

    pub fn is_extensible(&self) -> bool {
        self.inner.extensible.load(Ordering::SeqCst)
    }

    pub fn is_internal(&self) -> bool {
        self.inner.internal
    }

    /// The observer attached to this object, if it has been wrapped.
    pub fn observer(&self) -> Option<ObserverHandle> {
        self.inner.observer.get().cloned()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn property(&self, key: &str) -> Option<Property> {
        self.inner.props.read().get(key).cloned()
    }

    /// Install a property, replacing any existing slot for `key`.
    pub(crate) fn install(&self, key: &str, property: Property) {
        let mut props = self.inner.props.write();
        match props.get_mut(key) {
            Some(existing) => *existing = property,
            None => {
                props.insert(key.to_string(), property);
            }
        }
    }

    /// Return this object's observer, creating it with `make` if the object
    /// has none yet. The flag is `true` when `make` ran.
    pub(crate) fn attach_observer(
        &self,
        make: impl FnOnce() -> ObserverHandle,
    ) -> (ObserverHandle, bool) {
        let mut created = false;
        let observer = self
            .inner
            .observer
            .get_or_init(|| {
                created = true;
                make()
            })
            .clone();
        (observer, created)
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("keys", &self.keys())
            .field("observed", &self.inner.observer.get().is_some())
            .finish()
    }
}
